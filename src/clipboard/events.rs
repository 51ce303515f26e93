use x11rb::protocol::xproto::{Atom, Timestamp, Window};

/// A window property as returned by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValue {
    /// Property type atom
    pub type_: Atom,
    /// Item width in bits: 8, 16 or 32
    pub format: u8,
    /// Raw bytes, 32-bit items in native byte order
    pub data: Vec<u8>,
}

impl PropertyValue {
    /// Text property (format 8)
    pub fn text(type_: Atom, text: &str) -> Self {
        PropertyValue {
            type_,
            format: 8,
            data: text.as_bytes().to_vec(),
        }
    }

    /// List property of 32-bit items (atom lists, cardinals)
    pub fn items32(type_: Atom, items: &[u32]) -> Self {
        PropertyValue {
            type_,
            format: 32,
            data: items.iter().flat_map(|item| item.to_ne_bytes()).collect(),
        }
    }

    /// Decode 32-bit items; None unless format is 32
    pub fn as_items32(&self) -> Option<Vec<u32>> {
        if self.format != 32 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(4)
                .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    /// Number of items, as the length field of a ChangeProperty request
    pub fn item_count(&self) -> u32 {
        match self.format {
            16 => (self.data.len() / 2) as u32,
            32 => (self.data.len() / 4) as u32,
            _ => self.data.len() as u32,
        }
    }
}

/// Another client asks us to convert a selection we own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRequest {
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
    /// NONE from obsolete clients
    pub property: Atom,
    pub time: Timestamp,
}

/// Inbound X events the engine reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// XFixes: a selection got a new owner (NONE when the owner went away)
    OwnerChanged { selection: Atom, owner: Window },
    /// Answer to one of our conversion requests
    ConversionReply {
        selection: Atom,
        target: Atom,
        /// Window and property holding the value
        requestor: Window,
        property: Atom,
        /// None when the owner refused the conversion
        value: Option<PropertyValue>,
    },
    ContentRequest(ContentRequest),
    /// Another client took a selection we owned
    OwnershipLost { selection: Atom },
    /// The rotate channel property changed; None if the payload was malformed
    RotateCommand { delta: Option<i32> },
    ProtocolError {
        error_code: u8,
        major_opcode: u8,
        minor_opcode: u16,
    },
    Ignored,
}

/// Outgoing requests produced by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Ask the selection owner to convert into our XSEL_DATA property
    ConvertSelection { target: Atom },
    DeleteProperty { window: Window, property: Atom },
    /// Replace a property on another window
    ChangeProperty {
        window: Window,
        property: Atom,
        value: PropertyValue,
    },
    /// SelectionNotify to a requestor; property NONE signals refusal
    NotifySelection {
        requestor: Window,
        selection: Atom,
        target: Atom,
        property: Atom,
        time: Timestamp,
    },
    /// Take ownership of the tracked selection
    AssertOwnership,
    /// Resolve an atom name for a diagnostic log line
    DescribeType { atom: Atom },
}
