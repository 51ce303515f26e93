use x11rb::protocol::xproto::{Atom, Window};

use super::atoms::{AtomRole, AtomTable};
use super::events::{ContentRequest, InboundEvent, PropertyValue, Request};
use crate::models::{MoveOutcome, RingStore, StoreOutcome};
use crate::storage::EntryStorage;

/// Pick the most preferred acceptable type that the owner offers
///
/// `preferred` is ordered best first; `offered` is in any order.
pub fn best_atom(preferred: &[Atom], offered: &[Atom]) -> Option<Atom> {
    preferred.iter().copied().find(|atom| offered.contains(atom))
}

/// Tunables for the selection engine
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Promote a rotated-to entry to the newest slot when it gets pasted
    pub promote_on_paste: bool,
    /// Largest property payload a single ChangeProperty can carry
    pub max_property_bytes: usize,
}

/// Selection ownership state machine
///
/// Each inbound event is handled to completion against the ring and turned
/// into the X requests to send. No X I/O happens here, so the whole protocol
/// can be driven from tests.
pub struct SelectionEngine {
    atoms: AtomTable,
    window: Window,
    options: EngineOptions,
    /// Ring position the current rotate sequence started from
    rotation_origin: Option<usize>,
}

impl SelectionEngine {
    pub fn new(atoms: AtomTable, window: Window, options: EngineOptions) -> Self {
        SelectionEngine {
            atoms,
            window,
            options,
            rotation_origin: None,
        }
    }

    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Handle one inbound event, returning the requests to send
    pub fn handle<S: EntryStorage>(
        &mut self,
        event: InboundEvent,
        ring: &mut RingStore<S>,
    ) -> Vec<Request> {
        match event {
            InboundEvent::OwnerChanged { selection, owner } => {
                self.on_owner_changed(selection, owner)
            }
            InboundEvent::ConversionReply {
                selection,
                target,
                requestor,
                property,
                value,
            } => self.on_conversion_reply(selection, target, requestor, property, value, ring),
            InboundEvent::ContentRequest(request) => self.on_content_request(request, ring),
            InboundEvent::OwnershipLost { selection } => {
                self.on_ownership_lost(selection);
                Vec::new()
            }
            InboundEvent::RotateCommand { delta } => self.on_rotate(delta, ring),
            InboundEvent::ProtocolError {
                error_code,
                major_opcode,
                minor_opcode,
            } => {
                log::warn!(
                    "Delayed X error: code {} (request {}.{})",
                    error_code,
                    major_opcode,
                    minor_opcode
                );
                Vec::new()
            }
            InboundEvent::Ignored => Vec::new(),
        }
    }

    fn selection(&self) -> Atom {
        self.atoms.get(AtomRole::Selection)
    }

    fn label(&self, atom: Atom) -> String {
        match self.atoms.role_of(atom) {
            Some(role) => self.atoms.name(role).to_string(),
            None => format!("atom {}", atom),
        }
    }

    /// Someone else now owns the selection: start a negotiation with TARGETS
    fn on_owner_changed(&self, selection: Atom, owner: Window) -> Vec<Request> {
        if selection != self.selection() {
            return Vec::new();
        }

        if owner == self.window {
            log::debug!("{} is owned by this daemon, skipping", self.label(selection));
            return Vec::new();
        }

        if owner == x11rb::NONE {
            log::debug!("{} has no owner", self.label(selection));
            return Vec::new();
        }

        log::debug!("{} owner changed to window {:#x}", self.label(selection), owner);
        vec![Request::ConvertSelection {
            target: self.atoms.get(AtomRole::Targets),
        }]
    }

    fn on_conversion_reply<S: EntryStorage>(
        &mut self,
        selection: Atom,
        target: Atom,
        requestor: Window,
        property: Atom,
        value: Option<PropertyValue>,
        ring: &mut RingStore<S>,
    ) -> Vec<Request> {
        if selection != self.selection() {
            return Vec::new();
        }

        let Some(value) = value else {
            if target == self.atoms.get(AtomRole::Targets) {
                log::debug!("Owner refused TARGETS, asking for UTF8_STRING directly");
                return vec![Request::ConvertSelection {
                    target: self.atoms.get(AtomRole::Utf8String),
                }];
            }
            log::warn!("Selection owner refused conversion to {}", self.label(target));
            return Vec::new();
        };

        // The reply property is consumed here whatever its type
        let mut requests = vec![Request::DeleteProperty {
            window: requestor,
            property,
        }];

        match self.atoms.role_of(value.type_) {
            Some(AtomRole::Atom | AtomRole::Targets) => {
                let offered = value.as_items32().unwrap_or_default();
                let preferred = [self.atoms.get(AtomRole::Utf8String)];

                match best_atom(&preferred, &offered) {
                    Some(best) => {
                        log::debug!("Requesting conversion to {}", self.label(best));
                        requests.push(Request::ConvertSelection { target: best });
                    }
                    None => log::info!(
                        "Selection owner offers none of our types ({} targets)",
                        offered.len()
                    ),
                }
            }
            Some(AtomRole::Utf8String) => self.store_text(&value.data, ring),
            Some(AtomRole::Incr) => {
                log::warn!("Selection owner started an INCR transfer; incremental transfers are not supported")
            }
            _ => requests.push(Request::DescribeType { atom: value.type_ }),
        }

        requests
    }

    fn store_text<S: EntryStorage>(&mut self, data: &[u8], ring: &mut RingStore<S>) {
        let text = String::from_utf8_lossy(data);
        if text.is_empty() {
            log::debug!("Empty clipboard content, skipping");
            return;
        }

        match ring.store(&text) {
            Ok(StoreOutcome::Unchanged) => log::debug!("Clipboard unchanged"),
            Ok(StoreOutcome::Amended(position)) => {
                log::info!("Amended clip {} ({} bytes)", position, text.len());
                self.rotation_origin = None;
            }
            Ok(StoreOutcome::Inserted(position)) => {
                log::info!("Stored clip {} ({} bytes)", position, text.len());
                self.rotation_origin = None;
            }
            Err(e) => log::error!("Failed to store clipboard text: {:#}", e),
        }
    }

    /// Answer a conversion request; always exactly one SelectionNotify
    fn on_content_request<S: EntryStorage>(
        &mut self,
        request: ContentRequest,
        ring: &mut RingStore<S>,
    ) -> Vec<Request> {
        // Obsolete clients pass no property and expect the target name to be used
        let property = if request.property == x11rb::NONE {
            request.target
        } else {
            request.property
        };

        let mut requests = Vec::with_capacity(2);
        let notify_property = match self.supply(&request, property, ring) {
            Some(value) => {
                requests.push(Request::ChangeProperty {
                    window: request.requestor,
                    property,
                    value,
                });
                property
            }
            None => x11rb::NONE,
        };

        requests.push(Request::NotifySelection {
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property: notify_property,
            time: request.time,
        });
        requests
    }

    /// Build the property value for a conversion request, None to refuse
    fn supply<S: EntryStorage>(
        &mut self,
        request: &ContentRequest,
        property: Atom,
        ring: &mut RingStore<S>,
    ) -> Option<PropertyValue> {
        if request.selection != self.selection() {
            log::debug!("Refusing conversion of {}", self.label(request.selection));
            return None;
        }

        match self.atoms.role_of(request.target) {
            Some(AtomRole::Targets) => Some(PropertyValue::items32(
                self.atoms.get(AtomRole::Atom),
                &[
                    self.atoms.get(AtomRole::Targets),
                    self.atoms.get(AtomRole::Utf8String),
                    self.atoms.get(AtomRole::String),
                    self.atoms.get(AtomRole::Text),
                ],
            )),
            Some(role @ (AtomRole::Utf8String | AtomRole::Text | AtomRole::String)) => {
                let len = ring.peek().len();
                if len > self.options.max_property_bytes {
                    log::warn!(
                        "Clip of {} bytes would need an INCR transfer, refusing window {:#x}",
                        len,
                        request.requestor
                    );
                    return None;
                }

                self.promote_rotated(ring);

                let type_ = match role {
                    AtomRole::String => self.atoms.get(AtomRole::String),
                    _ => self.atoms.get(AtomRole::Utf8String),
                };
                log::debug!(
                    "Serving {} bytes as {} into {} on window {:#x}",
                    len,
                    self.label(type_),
                    self.label(property),
                    request.requestor
                );
                Some(PropertyValue::text(type_, ring.peek()))
            }
            _ => {
                log::debug!("Refusing unsupported target {}", self.label(request.target));
                None
            }
        }
    }

    /// A rotated-to entry is being pasted: make it the newest history item
    fn promote_rotated<S: EntryStorage>(&mut self, ring: &mut RingStore<S>) {
        if !self.options.promote_on_paste {
            return;
        }
        let Some(origin) = self.rotation_origin.take() else {
            return;
        };
        if ring.position() == origin {
            return;
        }

        match ring.reinsert_head(origin) {
            Ok(position) => log::info!("Promoted pasted clip to position {}", position),
            Err(e) => log::warn!("Failed to promote pasted clip: {:#}", e),
        }
    }

    fn on_ownership_lost(&self, selection: Atom) {
        if selection == self.atoms.get(AtomRole::RotateChannel) {
            log::warn!(
                "Lost ownership of {}; rotate commands will no longer reach this daemon",
                self.label(selection)
            );
        } else if selection == self.selection() {
            log::debug!("Another client took {}", self.label(selection));
        }
    }

    /// Rotate the ring and re-own the selection so others see the new head
    fn on_rotate<S: EntryStorage>(
        &mut self,
        delta: Option<i32>,
        ring: &mut RingStore<S>,
    ) -> Vec<Request> {
        let Some(delta) = delta else {
            log::warn!("Ignoring malformed rotate command");
            return Vec::new();
        };

        if ring.is_empty() {
            log::info!("Rotate by {} requested but the ring is empty", delta);
            return Vec::new();
        }

        let origin = ring.position();
        match ring.move_by(delta) {
            MoveOutcome::Moved(position) => {
                self.rotation_origin.get_or_insert(origin);
                log::info!("Rotated ring by {} to position {}", delta, position);
            }
            MoveOutcome::NoEffect => log::debug!("Rotate by {} had no effect", delta),
        }

        vec![Request::AssertOwnership]
    }
}
