//! Rotate commands between processes.
//!
//! The daemon owns a private per-selection atom as a selection. A client
//! looks up that owner and writes a single signed 32-bit delta
//! (type CARDINAL, format 32) onto the owner's window; the daemon sees the
//! PropertyNotify and rotates. Nothing else is exchanged and there is no
//! acknowledgment.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt as _, PropMode, Window};
use x11rb::wrapper::ConnectionExt as _;

use super::SelectionError;
use super::atoms::rotate_channel_name;
use super::events::PropertyValue;

/// Wire form of a rotate delta
pub fn encode_delta(delta: i32) -> u32 {
    delta as u32
}

/// Read a rotate delta from the channel property
pub fn decode_delta(value: &PropertyValue, cardinal: Atom) -> Option<i32> {
    if value.type_ != cardinal {
        return None;
    }
    value.as_items32()?.first().map(|&item| item as i32)
}

/// Send a rotate command to the daemon running for `selection`
pub fn request_rotate(selection: &str, delta: i32) -> Result<(), SelectionError> {
    if delta == 0 {
        log::info!("Rotate by 0 requested, nothing to send");
        return Ok(());
    }

    let (conn, _) = x11rb::connect(None)?;
    let owner = send_rotate(&conn, selection, delta)?;
    log::info!("Sent rotate {} to window {:#x}", delta, owner);
    Ok(())
}

/// Write the delta onto the rotate channel owner's window, returning that window
pub fn send_rotate(
    conn: &impl Connection,
    selection: &str,
    delta: i32,
) -> Result<Window, SelectionError> {
    let not_running = || SelectionError::NotRunning {
        selection: selection.to_string(),
    };

    // Only look the atom up: if nobody ever interned it, no daemon exists
    let channel = conn
        .intern_atom(true, rotate_channel_name(selection).as_bytes())?
        .reply()?
        .atom;
    if channel == x11rb::NONE {
        return Err(not_running());
    }

    let owner = conn.get_selection_owner(channel)?.reply()?.owner;
    if owner == x11rb::NONE {
        return Err(not_running());
    }

    conn.change_property32(
        PropMode::REPLACE,
        owner,
        channel,
        AtomEnum::CARDINAL,
        &[encode_delta(delta)],
    )?
    .check()?;

    Ok(owner)
}
