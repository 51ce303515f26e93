use anyhow::{Result, anyhow};
use std::path::PathBuf;

use crate::storage::{DirectoryStorage, EntryStorage};

/// Cached text of the entry at the ring pointer
#[derive(Debug, Clone, PartialEq)]
enum Head {
    /// Not read from storage yet (fresh start with existing history)
    Unloaded,
    /// Known text
    Loaded(String),
    /// Storage could not supply the entry; peeks as empty text
    Unavailable,
}

/// Result of storing a clipboard value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Same text as the head: nothing written
    Unchanged,
    /// Head was a prefix of the new text: entry rewritten in place
    Amended(usize),
    /// New entry written at the advanced pointer
    Inserted(usize),
}

/// Result of moving the ring pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(usize),
    /// The pointer ended where it started (e.g. capacity 1)
    NoEffect,
}

/// Bounded, file-backed clipboard history
///
/// Positions wrap at `capacity`. `min..=max` tracks the populated span so
/// rotation only cycles through entries that have been written.
pub struct RingStore<S: EntryStorage = DirectoryStorage> {
    storage: S,
    capacity: usize,
    pointer: usize,
    min: usize,
    max: usize,
    populated: bool,
    head: Head,
}

impl RingStore<DirectoryStorage> {
    /// Open the ring stored in `path`, creating the directory tree if needed
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let storage = DirectoryStorage::open(path)?;
        Self::with_storage(storage, capacity)
    }
}

impl<S: EntryStorage> RingStore<S> {
    /// Recover ring state from existing storage
    /// The pointer goes to the most recently touched entry; the head text is loaded lazily
    pub fn with_storage(storage: S, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(anyhow!("Ring capacity must be at least 1"));
        }

        let mut ring = RingStore {
            storage,
            capacity,
            pointer: 0,
            min: 0,
            max: 0,
            populated: false,
            head: Head::Unavailable,
        };
        ring.restore()?;
        Ok(ring)
    }

    fn restore(&mut self) -> Result<()> {
        let entries = self.storage.scan()?;

        let mut latest = None;
        for entry in entries {
            if entry.position >= self.capacity {
                log::debug!(
                    "Ignoring ring entry {} outside capacity {}",
                    entry.position,
                    self.capacity
                );
                continue;
            }

            self.include(entry.position);

            // Strictly newer only: the first entry seen wins a tie
            if latest.is_none_or(|(_, modified)| entry.modified > modified) {
                latest = Some((entry.position, entry.modified));
            }
        }

        match latest {
            Some((position, _)) => {
                self.pointer = position;
                self.head = Head::Unloaded;
            }
            None => {
                self.pointer = 0;
                self.min = 0;
                self.max = 0;
                self.head = Head::Unavailable;
            }
        }

        log::info!(
            "Ring restored from {:?}: min={} pointer={} max={} capacity={}",
            self.storage.path(),
            self.min,
            self.pointer,
            self.max,
            self.capacity
        );
        Ok(())
    }

    /// Read the entry at the pointer into the head cache
    fn load_head(&mut self) {
        self.head = match self.storage.read(self.pointer) {
            Ok(text) => Head::Loaded(text),
            Err(e) => {
                log::warn!("Ring entry {} unavailable: {:#}", self.pointer, e);
                Head::Unavailable
            }
        };
    }

    /// Get the text at the ring pointer ("" if the ring is empty)
    pub fn peek(&mut self) -> &str {
        if self.head == Head::Unloaded {
            self.load_head();
        }

        match &self.head {
            Head::Loaded(text) => text,
            _ => "",
        }
    }

    /// Store a clipboard value
    ///
    /// Identical text is a no-op, an extension of the head amends it in place,
    /// anything else is written at the next position.
    /// If the write fails the ring is left unchanged.
    pub fn store(&mut self, text: &str) -> Result<StoreOutcome> {
        if self.head == Head::Unloaded {
            self.load_head();
        }

        let target = match &self.head {
            Head::Loaded(head) if text.starts_with(head.as_str()) => {
                if head.len() == text.len() {
                    return Ok(StoreOutcome::Unchanged);
                }
                StoreOutcome::Amended(self.pointer)
            }
            _ if !self.populated => StoreOutcome::Inserted(self.pointer),
            _ => StoreOutcome::Inserted((self.pointer + 1) % self.capacity),
        };

        let position = match target {
            StoreOutcome::Amended(position) | StoreOutcome::Inserted(position) => position,
            StoreOutcome::Unchanged => self.pointer,
        };

        self.storage.write(position, text)?;

        self.pointer = position;
        self.include(position);
        self.head = Head::Loaded(text.to_string());

        log::debug!(
            "Ring store {:?}: min={} pointer={} max={}",
            target,
            self.min,
            self.pointer,
            self.max
        );
        Ok(target)
    }

    /// Widen the populated span to cover a position
    fn include(&mut self, position: usize) {
        if self.populated {
            self.min = self.min.min(position);
            self.max = self.max.max(position);
        } else {
            self.min = position;
            self.max = position;
            self.populated = true;
        }
    }

    /// Move the pointer by `delta`, wrapping within the populated span
    ///
    /// Moving past `max` wraps to `min` and moving past `min` wraps to `max`.
    pub fn move_by(&mut self, delta: i32) -> MoveOutcome {
        let before = self.pointer;

        // Truncating remainder keeps the sign, so a step below zero lands
        // under `min` and wraps to `max`
        let raw = (self.pointer as i64 + i64::from(delta)) % self.capacity as i64;
        self.pointer = if raw > self.max as i64 {
            self.min
        } else if raw < self.min as i64 {
            self.max
        } else {
            raw as usize
        };

        log::debug!(
            "Ring move {}: min={} pointer={} max={}",
            delta,
            self.min,
            self.pointer,
            self.max
        );

        if self.pointer == before {
            return MoveOutcome::NoEffect;
        }

        self.load_head();
        MoveOutcome::Moved(self.pointer)
    }

    /// Current pointer position
    pub fn position(&self) -> usize {
        self.pointer
    }

    /// Promote the head text to the slot after `position`, keeping the original entry
    pub fn reinsert_head(&mut self, position: usize) -> Result<usize> {
        let text = self.peek().to_string();
        let target = (position + 1) % self.capacity;

        self.storage.write(target, &text)?;

        self.pointer = target;
        self.include(target);
        self.head = Head::Loaded(text);

        log::debug!(
            "Ring reinsert head at {}: min={} max={}",
            target,
            self.min,
            self.max
        );
        Ok(target)
    }

    /// Check if nothing has ever been stored
    pub fn is_empty(&self) -> bool {
        !self.populated
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Populated span as (min, max)
    pub fn bounds(&self) -> (usize, usize) {
        (self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn set_mtime(path: &Path, secs: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_kill_ring_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 3).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.peek(), "");

        assert_eq!(ring.store("a").unwrap(), StoreOutcome::Inserted(0));
        assert_eq!(ring.position(), 0);
        assert_eq!(ring.peek(), "a");

        assert_eq!(ring.store("ab").unwrap(), StoreOutcome::Amended(0));
        assert_eq!(ring.position(), 0);
        assert_eq!(ring.peek(), "ab");

        assert_eq!(ring.store("x").unwrap(), StoreOutcome::Inserted(1));
        assert_eq!(ring.peek(), "x");
        assert_eq!(ring.store("y").unwrap(), StoreOutcome::Inserted(2));
        assert_eq!(ring.store("z").unwrap(), StoreOutcome::Inserted(0));
        assert_eq!(fs::read_to_string(temp_dir.path().join("0")).unwrap(), "z");

        assert_eq!(ring.move_by(-1), MoveOutcome::Moved(2));
        assert_eq!(ring.peek(), "y");
    }

    #[test]
    fn test_identical_store_does_not_touch_storage() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 10).unwrap();
        ring.store("same").unwrap();

        let path = temp_dir.path().join("0");
        set_mtime(&path, 1_000);

        assert_eq!(ring.store("same").unwrap(), StoreOutcome::Unchanged);
        assert_eq!(ring.position(), 0);
        assert_eq!(
            fs::metadata(&path).unwrap().modified().unwrap(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_000)
        );
    }

    #[test]
    fn test_amend_keeps_position() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 5).unwrap();
        ring.store("first").unwrap();
        ring.store("hello").unwrap();

        let before = ring.position();
        assert_eq!(ring.move_by(0), MoveOutcome::NoEffect);
        ring.store("hello world").unwrap();
        assert_eq!(ring.move_by(0), MoveOutcome::NoEffect);
        assert_eq!(ring.position(), before);
        assert_eq!(ring.peek(), "hello world");
    }

    #[test]
    fn test_shorter_text_is_a_new_entry() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 5).unwrap();
        ring.store("hello").unwrap();

        // "hel" does not extend "hello"
        assert_eq!(ring.store("hel").unwrap(), StoreOutcome::Inserted(1));
    }

    #[test]
    fn test_pointer_stays_below_capacity() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 4).unwrap();

        for i in 0..11 {
            ring.store(&format!("entry {}", i % 2)).unwrap();
            assert!(ring.position() < 4);
        }
        assert_eq!(ring.bounds(), (0, 3));
    }

    #[test]
    fn test_move_wraps_within_populated_span() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 10).unwrap();
        ring.store("a").unwrap();
        ring.store("b").unwrap();
        ring.store("c").unwrap();
        assert_eq!(ring.bounds(), (0, 2));

        // Past max wraps to min, not into empty slots
        assert_eq!(ring.move_by(1), MoveOutcome::Moved(0));
        assert_eq!(ring.peek(), "a");

        // Past min wraps to max
        assert_eq!(ring.move_by(-1), MoveOutcome::Moved(2));
        assert_eq!(ring.peek(), "c");

        for delta in [-25, -7, -3, -1, 1, 4, 9, 30] {
            ring.move_by(delta);
            let (min, max) = ring.bounds();
            assert!(ring.position() >= min && ring.position() <= max);
        }
    }

    #[test]
    fn test_move_with_capacity_one_has_no_effect() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 1).unwrap();
        ring.store("a").unwrap();
        ring.store("b").unwrap();

        assert_eq!(ring.position(), 0);
        assert_eq!(ring.move_by(1), MoveOutcome::NoEffect);
        assert_eq!(ring.move_by(-3), MoveOutcome::NoEffect);
        assert_eq!(ring.peek(), "b");
    }

    #[test]
    fn test_restore_uses_latest_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        for (position, text, secs) in [(2, "two", 100), (5, "five", 300), (3, "three", 200)] {
            let path = temp_dir.path().join(position.to_string());
            fs::write(&path, text).unwrap();
            set_mtime(&path, secs);
        }

        let mut ring = RingStore::open(temp_dir.path(), 10).unwrap();
        assert!(!ring.is_empty());
        assert_eq!(ring.position(), 5);
        assert_eq!(ring.bounds(), (2, 5));
        assert_eq!(ring.peek(), "five");
    }

    #[test]
    fn test_restore_ignores_entries_outside_capacity() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("1"), "kept").unwrap();
        set_mtime(&temp_dir.path().join("1"), 100);
        fs::write(temp_dir.path().join("9"), "stale").unwrap();
        set_mtime(&temp_dir.path().join("9"), 500);

        let mut ring = RingStore::open(temp_dir.path(), 4).unwrap();
        assert_eq!(ring.position(), 1);
        assert_eq!(ring.bounds(), (1, 1));
        assert_eq!(ring.peek(), "kept");
    }

    #[test]
    fn test_head_is_loaded_lazily() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut ring = RingStore::open(temp_dir.path(), 5).unwrap();
            ring.store("persisted").unwrap();
        }

        // Content changes behind the ring's back before the first peek
        fs::write(temp_dir.path().join("0"), "edited").unwrap();

        let mut ring = RingStore::open(temp_dir.path(), 5).unwrap();
        assert_eq!(ring.peek(), "edited");
    }

    #[test]
    fn test_store_after_restart_amends_restored_head() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut ring = RingStore::open(temp_dir.path(), 5).unwrap();
            ring.store("one").unwrap();
            ring.store("two").unwrap();
        }
        set_mtime(&temp_dir.path().join("0"), 100);
        set_mtime(&temp_dir.path().join("1"), 200);

        let mut ring = RingStore::open(temp_dir.path(), 5).unwrap();
        assert_eq!(ring.store("two more").unwrap(), StoreOutcome::Amended(1));
        assert_eq!(ring.store("three").unwrap(), StoreOutcome::Inserted(2));
    }

    #[test]
    fn test_unavailable_entry_peeks_empty_and_store_advances() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 5).unwrap();
        ring.store("a").unwrap();
        ring.store("b").unwrap();

        fs::remove_file(temp_dir.path().join("0")).unwrap();
        assert_eq!(ring.move_by(-1), MoveOutcome::Moved(0));
        assert_eq!(ring.peek(), "");

        // Nothing to amend, so the new text takes the next slot
        assert_eq!(ring.store("c").unwrap(), StoreOutcome::Inserted(1));
    }

    #[test]
    fn test_reinsert_head_promotes_without_losing_original() {
        let temp_dir = TempDir::new().unwrap();
        let mut ring = RingStore::open(temp_dir.path(), 10).unwrap();
        ring.store("hello").unwrap();
        ring.store("blah").unwrap();
        ring.store("foo").unwrap();

        let origin = ring.position();
        ring.move_by(-2);
        assert_eq!(ring.peek(), "hello");

        assert_eq!(ring.reinsert_head(origin).unwrap(), 3);
        assert_eq!(ring.position(), 3);
        assert_eq!(ring.bounds(), (0, 3));
        assert_eq!(ring.peek(), "hello");
        assert_eq!(fs::read_to_string(temp_dir.path().join("0")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(temp_dir.path().join("3")).unwrap(), "hello");
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        assert!(RingStore::open(temp_dir.path(), 0).is_err());
    }
}
