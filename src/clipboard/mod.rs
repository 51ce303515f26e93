pub mod atoms;
pub mod engine;
pub mod events;
pub mod rotate;
pub mod x11;

use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

pub use atoms::{AtomRole, AtomTable};
pub use engine::{EngineOptions, SelectionEngine, best_atom};
pub use events::{ContentRequest, InboundEvent, PropertyValue, Request};
pub use rotate::request_rotate;
pub use x11::ProtocolSession;

/// X11 selection protocol errors
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Could not connect to X server: {0}")]
    Connect(#[from] ConnectError),

    #[error("X connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("X request failed: {0}")]
    Reply(#[from] ReplyError),

    #[error("Could not allocate X resource: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),

    #[error("Could not intern atom {name}: {source}")]
    AtomIntern {
        name: String,
        #[source]
        source: ReplyError,
    },

    #[error("X server lacks the {0} extension")]
    MissingExtension(&'static str),

    #[error("{name} version {major} is too old (need 2 or later)")]
    ExtensionTooOld { name: &'static str, major: u32 },

    #[error("xclipring is already running for {selection}")]
    AlreadyRunning { selection: String },

    #[error("xclipring is not running for {selection}")]
    NotRunning { selection: String },
}
