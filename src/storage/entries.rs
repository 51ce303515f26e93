use anyhow::{Context, Result};
use std::fs::{self, DirBuilder, File};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A ring position found on disk, with its recency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredEntry {
    pub position: usize,
    pub modified: SystemTime,
}

/// Trait for ring entry persistence
/// Entries are keyed by ring position; every read and write refreshes recency
pub trait EntryStorage {
    /// Read the text stored at a position, touching its recency
    fn read(&self, position: usize) -> Result<String>;

    /// Write (or overwrite) the text stored at a position
    fn write(&self, position: usize, text: &str) -> Result<()>;

    /// List every position present in storage
    fn scan(&self) -> Result<Vec<StoredEntry>>;

    /// Get the storage location
    fn path(&self) -> &Path;
}

/// Directory-backed entry storage
/// Each position is one file named by its decimal index, holding the raw text
/// The file modification time is the recency signal
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    /// Open a storage directory, creating the whole tree (mode 0700) if absent
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&dir)
            .with_context(|| format!("Failed to create storage directory {:?}", dir))?;

        log::debug!("Ring storage directory: {:?}", dir);
        Ok(DirectoryStorage { dir })
    }

    fn entry_path(&self, position: usize) -> PathBuf {
        self.dir.join(position.to_string())
    }
}

/// Parse an entry file name: plain decimal digits only
fn parse_position(name: &str) -> Option<usize> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Refresh a file's modification time to now
fn touch(path: &Path) -> std::io::Result<()> {
    let file = File::options().write(true).open(path)?;
    file.set_modified(SystemTime::now())
}

impl EntryStorage for DirectoryStorage {
    fn read(&self, position: usize) -> Result<String> {
        let path = self.entry_path(position);

        let bytes =
            fs::read(&path).with_context(|| format!("Failed to read ring entry {:?}", path))?;

        if let Err(e) = touch(&path) {
            log::warn!("Failed to touch ring entry {:?}: {}", path, e);
        }

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                log::debug!("Ring entry {:?} is not valid UTF-8, decoding lossily", path);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        Ok(text)
    }

    fn write(&self, position: usize, text: &str) -> Result<()> {
        let path = self.entry_path(position);

        fs::write(&path, text).with_context(|| format!("Failed to write ring entry {:?}", path))?;

        log::debug!("Wrote {} bytes to ring entry {}", text.len(), position);
        Ok(())
    }

    fn scan(&self) -> Result<Vec<StoredEntry>> {
        let listing = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list storage directory {:?}", self.dir))?;

        let mut entries = Vec::new();
        for dirent in listing {
            let dirent = dirent
                .with_context(|| format!("Failed to list storage directory {:?}", self.dir))?;

            let Some(position) = dirent.file_name().to_str().and_then(parse_position) else {
                continue;
            };

            let metadata = match dirent.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("Failed to stat ring entry {:?}: {}", dirent.path(), e);
                    continue;
                }
            };

            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(StoredEntry { position, modified });
        }

        Ok(entries)
    }

    fn path(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("cache").join("xclipring").join("CLIPBOARD");

        let storage = DirectoryStorage::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(storage.path(), dir.as_path());

        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_write_has_no_trailing_terminator() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirectoryStorage::open(temp_dir.path()).unwrap();

        storage.write(7, "hello").unwrap();
        assert_eq!(fs::read(temp_dir.path().join("7")).unwrap(), b"hello");
        assert_eq!(storage.read(7).unwrap(), "hello");
    }

    #[test]
    fn test_read_touches_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirectoryStorage::open(temp_dir.path()).unwrap();
        storage.write(0, "old").unwrap();

        let path = temp_dir.path().join("0");
        let long_ago = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(long_ago)
            .unwrap();

        storage.read(0).unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        assert!(modified > long_ago);
    }

    #[test]
    fn test_read_missing_entry_fails() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirectoryStorage::open(temp_dir.path()).unwrap();
        assert!(storage.read(3).is_err());
    }

    #[test]
    fn test_scan_only_lists_integer_named_files() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirectoryStorage::open(temp_dir.path()).unwrap();

        storage.write(0, "a").unwrap();
        storage.write(12, "b").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();
        fs::write(temp_dir.path().join("+3"), "x").unwrap();
        fs::write(temp_dir.path().join("4.tmp"), "x").unwrap();
        fs::create_dir(temp_dir.path().join("5")).unwrap();

        let mut positions: Vec<usize> = storage.scan().unwrap().iter().map(|e| e.position).collect();
        positions.sort();
        assert_eq!(positions, vec![0, 12]);
    }

    #[test]
    fn test_invalid_utf8_is_read_lossily() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirectoryStorage::open(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("1"), [b'o', b'k', 0xff]).unwrap();

        assert_eq!(storage.read(1).unwrap(), "ok\u{fffd}");
    }
}
