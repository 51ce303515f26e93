use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, ConnectionExt as _};

use super::SelectionError;

/// Logical atom roles used by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomRole {
    /// The tracked selection (CLIPBOARD unless configured otherwise)
    Selection,
    Utf8String,
    /// Property on our window that carries conversion replies
    XselData,
    Null,
    Atom,
    Targets,
    Incr,
    Integer,
    Cardinal,
    String,
    Text,
    /// Per-selection private selection/property used for rotate commands
    RotateChannel,
}

impl AtomRole {
    pub const COUNT: usize = 12;

    pub const ALL: [AtomRole; AtomRole::COUNT] = [
        AtomRole::Selection,
        AtomRole::Utf8String,
        AtomRole::XselData,
        AtomRole::Null,
        AtomRole::Atom,
        AtomRole::Targets,
        AtomRole::Incr,
        AtomRole::Integer,
        AtomRole::Cardinal,
        AtomRole::String,
        AtomRole::Text,
        AtomRole::RotateChannel,
    ];

    /// Name to intern for this role
    pub fn atom_name(self, selection: &str) -> String {
        match self {
            AtomRole::Selection => selection.to_string(),
            AtomRole::Utf8String => "UTF8_STRING".to_string(),
            AtomRole::XselData => "XSEL_DATA".to_string(),
            AtomRole::Null => "NULL".to_string(),
            AtomRole::Atom => "ATOM".to_string(),
            AtomRole::Targets => "TARGETS".to_string(),
            AtomRole::Incr => "INCR".to_string(),
            AtomRole::Integer => "INTEGER".to_string(),
            AtomRole::Cardinal => "CARDINAL".to_string(),
            AtomRole::String => "STRING".to_string(),
            AtomRole::Text => "TEXT".to_string(),
            AtomRole::RotateChannel => rotate_channel_name(selection),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Name of the private rotate channel for a selection
/// Distinct per selection so daemons for different selections never collide
pub fn rotate_channel_name(selection: &str) -> String {
    format!("XCLIPRING-{}", selection)
}

/// Server-assigned atom ids for every role, interned once per connection
#[derive(Debug, Clone)]
pub struct AtomTable {
    ids: [Atom; AtomRole::COUNT],
    names: [String; AtomRole::COUNT],
}

impl AtomTable {
    /// Intern every role in one batch: all requests first, then all replies
    pub fn intern(conn: &impl Connection, selection: &str) -> Result<Self, SelectionError> {
        let names = AtomRole::ALL.map(|role| role.atom_name(selection));

        let cookies = names
            .iter()
            .map(|name| conn.intern_atom(false, name.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids = [x11rb::NONE; AtomRole::COUNT];
        for ((id, cookie), name) in ids.iter_mut().zip(cookies).zip(&names) {
            let reply = cookie.reply().map_err(|e| SelectionError::AtomIntern {
                name: name.clone(),
                source: e,
            })?;
            *id = reply.atom;
        }

        log::debug!("Interned {} atoms for selection {}", ids.len(), selection);
        Ok(AtomTable { ids, names })
    }

    /// Build a table from known ids, indexed in `AtomRole::ALL` order
    pub fn from_ids(selection: &str, ids: [Atom; AtomRole::COUNT]) -> Self {
        AtomTable {
            ids,
            names: AtomRole::ALL.map(|role| role.atom_name(selection)),
        }
    }

    pub fn get(&self, role: AtomRole) -> Atom {
        self.ids[role.index()]
    }

    pub fn name(&self, role: AtomRole) -> &str {
        &self.names[role.index()]
    }

    /// Reverse lookup of an atom id
    pub fn role_of(&self, atom: Atom) -> Option<AtomRole> {
        AtomRole::ALL.into_iter().find(|&role| self.get(role) == atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_are_in_index_order() {
        for (i, role) in AtomRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }

    #[test]
    fn test_rotate_channel_is_scoped_to_selection() {
        assert_eq!(rotate_channel_name("CLIPBOARD"), "XCLIPRING-CLIPBOARD");
        assert_ne!(rotate_channel_name("PRIMARY"), rotate_channel_name("CLIPBOARD"));
        assert_eq!(AtomRole::Selection.atom_name("PRIMARY"), "PRIMARY");
        assert_eq!(AtomRole::RotateChannel.atom_name("PRIMARY"), "XCLIPRING-PRIMARY");
    }

    #[test]
    fn test_lookup_by_role_and_id() {
        let table = AtomTable::from_ids(
            "CLIPBOARD",
            [100, 101, 102, 103, 4, 105, 106, 19, 6, 31, 107, 108],
        );

        assert_eq!(table.get(AtomRole::Cardinal), 6);
        assert_eq!(table.name(AtomRole::Targets), "TARGETS");
        assert_eq!(table.name(AtomRole::RotateChannel), "XCLIPRING-CLIPBOARD");
        assert_eq!(table.role_of(101), Some(AtomRole::Utf8String));
        assert_eq!(table.role_of(999), None);
    }
}
