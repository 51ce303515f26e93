use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ReplyError;
use x11rb::protocol::Event;
use x11rb::protocol::xfixes::{self, ConnectionExt as _, SelectionEventMask};
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ConnectionExt as _, CreateWindowAux, EventMask, PropMode, Property,
    SELECTION_NOTIFY_EVENT, SelectionNotifyEvent, Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::{COPY_DEPTH_FROM_PARENT, CURRENT_TIME, NONE};

use super::SelectionError;
use super::atoms::{AtomRole, AtomTable};
use super::engine::{EngineOptions, SelectionEngine};
use super::events::{ContentRequest, InboundEvent, PropertyValue, Request};
use super::rotate;
use crate::models::RingStore;
use crate::storage::EntryStorage;

/// Fixed part of a ChangeProperty request
const CHANGE_PROPERTY_HEADER: usize = 24;

/// Minimum XFIXES major version with selection notifications
const XFIXES_MIN_MAJOR: u32 = 2;

/// Connection to the X server for one selection
/// Owns an invisible window used as the endpoint for ownership and properties
pub struct ProtocolSession {
    conn: RustConnection,
    window: Window,
    atoms: AtomTable,
    selection_name: String,
}

impl ProtocolSession {
    /// Connect, intern the atom table and create the daemon window
    pub fn connect(selection: &str) -> Result<Self, SelectionError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let atoms = AtomTable::intern(&conn, selection)?;

        let screen = &conn.setup().roots[screen_num];
        let window = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new()
                .background_pixel(screen.black_pixel)
                .override_redirect(1)
                .event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        conn.flush()?;

        log::debug!("Created window {:#x} on screen {}", window, screen_num);
        Ok(ProtocolSession {
            conn,
            window,
            atoms,
            selection_name: selection.to_string(),
        })
    }

    /// Subscribe to selection changes and claim the rotate channel
    pub fn listen(&self) -> Result<(), SelectionError> {
        self.init_xfixes()?;

        self.conn.xfixes_select_selection_input(
            self.window,
            self.atoms.get(AtomRole::Selection),
            SelectionEventMask::SET_SELECTION_OWNER
                | SelectionEventMask::SELECTION_WINDOW_DESTROY
                | SelectionEventMask::SELECTION_CLIENT_CLOSE,
        )?;

        self.claim_rotate_channel()?;
        self.conn.flush()?;
        Ok(())
    }

    fn init_xfixes(&self) -> Result<(), SelectionError> {
        if self
            .conn
            .extension_information(xfixes::X11_EXTENSION_NAME)?
            .is_none()
        {
            return Err(SelectionError::MissingExtension(xfixes::X11_EXTENSION_NAME));
        }

        let version = self.conn.xfixes_query_version(5, 0)?.reply()?;
        if version.major_version < XFIXES_MIN_MAJOR {
            return Err(SelectionError::ExtensionTooOld {
                name: xfixes::X11_EXTENSION_NAME,
                major: version.major_version,
            });
        }

        log::debug!(
            "XFIXES {}.{} available",
            version.major_version,
            version.minor_version
        );
        Ok(())
    }

    /// Own the rotate channel so clients can find this daemon's window
    fn claim_rotate_channel(&self) -> Result<(), SelectionError> {
        let channel = self.atoms.get(AtomRole::RotateChannel);
        let already_running = || SelectionError::AlreadyRunning {
            selection: self.selection_name.clone(),
        };

        let owner = self.conn.get_selection_owner(channel)?.reply()?.owner;
        if owner != NONE && owner != self.window {
            return Err(already_running());
        }

        self.conn
            .set_selection_owner(self.window, channel, CURRENT_TIME)?;

        let owner = self.conn.get_selection_owner(channel)?.reply()?.owner;
        if owner != self.window {
            return Err(already_running());
        }

        log::info!(
            "Claimed {} on window {:#x}",
            self.atoms.name(AtomRole::RotateChannel),
            self.window
        );
        Ok(())
    }

    /// Largest text that can be served without an incremental transfer
    pub fn max_property_bytes(&self) -> usize {
        self.conn
            .maximum_request_bytes()
            .saturating_sub(CHANGE_PROPERTY_HEADER)
    }

    /// Build the engine bound to this session's atoms and window
    pub fn engine(&self, promote_on_paste: bool) -> SelectionEngine {
        SelectionEngine::new(
            self.atoms.clone(),
            self.window,
            EngineOptions {
                promote_on_paste,
                max_property_bytes: self.max_property_bytes(),
            },
        )
    }

    /// Blocking event loop: wait, handle to completion, flush, repeat
    ///
    /// Only a broken connection ends the loop; per-event failures are logged.
    pub fn run<S: EntryStorage>(
        &self,
        engine: &mut SelectionEngine,
        ring: &mut RingStore<S>,
    ) -> Result<(), SelectionError> {
        log::info!(
            "Watching {} on window {:#x}",
            self.selection_name,
            self.window
        );

        loop {
            let event = self.conn.wait_for_event()?;

            let inbound = match self.translate(event) {
                Ok(inbound) => inbound,
                Err(e) => {
                    recover(e)?;
                    continue;
                }
            };

            for request in engine.handle(inbound, ring) {
                if let Err(e) = self.execute(request) {
                    recover(e)?;
                }
            }

            self.conn.flush()?;
        }
    }

    /// Turn a raw X event into an engine event, fetching any property it refers to
    fn translate(&self, event: Event) -> Result<InboundEvent, ReplyError> {
        let selection = self.atoms.get(AtomRole::Selection);
        let rotate_channel = self.atoms.get(AtomRole::RotateChannel);

        let inbound = match event {
            Event::XfixesSelectionNotify(ev) => InboundEvent::OwnerChanged {
                selection: ev.selection,
                owner: ev.owner,
            },
            Event::SelectionNotify(ev) if ev.selection == selection => {
                let value = if ev.property == NONE || ev.property == self.atoms.get(AtomRole::Null)
                {
                    None
                } else {
                    self.fetch_property(ev.requestor, ev.property, AtomEnum::ANY.into(), u32::MAX)?
                };
                InboundEvent::ConversionReply {
                    selection: ev.selection,
                    target: ev.target,
                    requestor: ev.requestor,
                    property: ev.property,
                    value,
                }
            }
            Event::SelectionRequest(ev) => InboundEvent::ContentRequest(ContentRequest {
                requestor: ev.requestor,
                selection: ev.selection,
                target: ev.target,
                property: ev.property,
                time: ev.time,
            }),
            Event::SelectionClear(ev) => InboundEvent::OwnershipLost {
                selection: ev.selection,
            },
            Event::PropertyNotify(ev)
                if ev.window == self.window
                    && ev.atom == rotate_channel
                    && ev.state == Property::NEW_VALUE =>
            {
                let cardinal = self.atoms.get(AtomRole::Cardinal);
                let delta = self
                    .fetch_property(self.window, rotate_channel, cardinal, 1)?
                    .and_then(|value| rotate::decode_delta(&value, cardinal));
                InboundEvent::RotateCommand { delta }
            }
            Event::Error(err) => InboundEvent::ProtocolError {
                error_code: err.error_code,
                major_opcode: err.major_opcode,
                minor_opcode: err.minor_opcode,
            },
            _ => InboundEvent::Ignored,
        };

        Ok(inbound)
    }

    /// Read a property without deleting it; None if it does not exist
    fn fetch_property(
        &self,
        window: Window,
        property: Atom,
        type_: Atom,
        long_length: u32,
    ) -> Result<Option<PropertyValue>, ReplyError> {
        let reply = self
            .conn
            .get_property(false, window, property, type_, 0, long_length)?
            .reply()?;

        if reply.type_ == NONE {
            return Ok(None);
        }

        Ok(Some(PropertyValue {
            type_: reply.type_,
            format: reply.format,
            data: reply.value,
        }))
    }

    fn execute(&self, request: Request) -> Result<(), ReplyError> {
        let selection = self.atoms.get(AtomRole::Selection);

        match request {
            Request::ConvertSelection { target } => {
                self.conn.convert_selection(
                    self.window,
                    selection,
                    target,
                    self.atoms.get(AtomRole::XselData),
                    CURRENT_TIME,
                )?;
            }
            Request::DeleteProperty { window, property } => {
                self.conn.delete_property(window, property)?;
            }
            Request::ChangeProperty {
                window,
                property,
                value,
            } => {
                self.conn.change_property(
                    PropMode::REPLACE,
                    window,
                    property,
                    value.type_,
                    value.format,
                    value.item_count(),
                    &value.data,
                )?;
            }
            Request::NotifySelection {
                requestor,
                selection,
                target,
                property,
                time,
            } => {
                let event = SelectionNotifyEvent {
                    response_type: SELECTION_NOTIFY_EVENT,
                    sequence: 0,
                    time,
                    requestor,
                    selection,
                    target,
                    property,
                };
                self.conn
                    .send_event(false, requestor, EventMask::NO_EVENT, event)?;
            }
            Request::AssertOwnership => {
                self.conn
                    .set_selection_owner(self.window, selection, CURRENT_TIME)?;
                log::debug!("Asserted ownership of {}", self.selection_name);
            }
            Request::DescribeType { atom } => {
                let reply = self.conn.get_atom_name(atom)?.reply()?;
                log::info!(
                    "Ignoring selection reply of type {}",
                    String::from_utf8_lossy(&reply.name)
                );
            }
        }

        Ok(())
    }
}

/// X errors only abandon the current step; a lost connection is fatal
fn recover(error: ReplyError) -> Result<(), SelectionError> {
    match error {
        ReplyError::X11Error(err) => {
            log::warn!(
                "X request failed: {:?} (request {}.{})",
                err.error_kind,
                err.major_opcode,
                err.minor_opcode
            );
            Ok(())
        }
        ReplyError::ConnectionError(e) => Err(e.into()),
    }
}
