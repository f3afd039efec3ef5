//! Hover, selection and lookup arbitration
//!
//! One `SelectionArbiter` lives in the front-end loop and is only touched from
//! that loop's turns. The in-flight lookup is owned by the phase itself: the
//! receiver of its completion exists only inside `LookupPhase::Awaiting`, so a
//! second lookup cannot be started while one is pending.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::catalog::{Catalog, PartRecord};
use crate::domain::{CodeGeometry, Symbology};
use crate::session::viewport::ViewportMapper;

/// Which code decides what gets looked up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionMode {
    /// First datamatrix of each frame
    Auto,
    /// The code the operator clicked
    Manual,
}

impl DetectionMode {
    pub fn label(self) -> &'static str {
        match self {
            DetectionMode::Auto => "Auto",
            DetectionMode::Manual => "Manual",
        }
    }
}

/// How a code is drawn in the overlay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayRole {
    Hovered,
    Displayed(DetectionMode),
    Other,
}

/// Coarse state for logging and tests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArbiterState {
    Idle,
    AwaitingLookup,
    Displaying,
    Terminated,
}

struct InFlight {
    payload: Vec<u8>,
    done: oneshot::Receiver<Option<PartRecord>>,
}

enum LookupPhase {
    Idle,
    Awaiting(InFlight),
    Displaying(Option<PartRecord>),
    Terminated,
}

pub struct SelectionArbiter {
    catalog: Arc<dyn Catalog>,
    viewport: ViewportMapper,
    codes: Vec<CodeGeometry>,
    pointer: Option<(f32, f32)>,
    hovered: Option<CodeGeometry>,
    selected: Option<CodeGeometry>,
    displayed: Option<CodeGeometry>,
    phase: LookupPhase,
}

impl SelectionArbiter {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            viewport: ViewportMapper::default(),
            codes: Vec::new(),
            pointer: None,
            hovered: None,
            selected: None,
            displayed: None,
            phase: LookupPhase::Idle,
        }
    }

    /// Take a new scan result and trigger the automatic or manual lookup
    pub fn on_frame(&mut self, viewport: ViewportMapper, codes: Vec<CodeGeometry>) {
        self.viewport = viewport;
        self.codes = codes;
        self.update_hover();

        let focus = match &self.selected {
            Some(code) => Some(code.clone()),
            None => self
                .codes
                .iter()
                .find(|c| c.symbology == Symbology::Datamatrix2D)
                .cloned(),
        };
        if let Some(code) = focus {
            self.trigger(&code);
        }
    }

    pub fn on_pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer = Some((x, y));
        self.update_hover();
    }

    pub fn on_pointer_left(&mut self) {
        self.pointer = None;
        self.hovered = None;
    }

    /// A click on a code selects it; a click anywhere else returns to auto mode
    pub fn on_click(&mut self, x: f32, y: f32) {
        self.on_pointer_moved(x, y);

        match self.hovered.clone() {
            Some(code) => {
                log::info!(
                    "Selected {} code '{}'",
                    code.symbology,
                    code.payload_text()
                );
                self.selected = Some(code.clone());
                self.trigger(&code);
            }
            None => {
                if self.selected.take().is_some() {
                    log::info!("Selection cleared, back to automatic detection");
                }
            }
        }
    }

    /// Start a lookup for `code` unless one is pending or it is already shown.
    ///
    /// Returns whether a lookup was started.
    pub fn trigger(&mut self, code: &CodeGeometry) -> bool {
        if code.symbology != Symbology::Datamatrix2D {
            return false;
        }
        if matches!(self.phase, LookupPhase::Terminated) {
            return false;
        }
        if self
            .displayed
            .as_ref()
            .is_some_and(|d| d.payload == code.payload)
        {
            return false;
        }
        if matches!(self.phase, LookupPhase::Awaiting(_)) {
            log::trace!("Lookup already in flight, dropping trigger");
            return false;
        }

        log::debug!("Looking up '{}'", code.payload_text());
        let (tx, done) = oneshot::channel();
        let lookup = self.catalog.lookup(code.payload.clone());
        tokio::spawn(async move {
            // Receiver gone means the session ended
            let _ = tx.send(lookup.await);
        });

        self.displayed = Some(code.clone());
        self.phase = LookupPhase::Awaiting(InFlight {
            payload: code.payload.clone(),
            done,
        });
        true
    }

    /// Resolves when the pending lookup finishes; never resolves otherwise.
    ///
    /// Cancel safe: dropping the future leaves the lookup pending.
    pub async fn lookup_finished(&mut self) -> Option<PartRecord> {
        match &mut self.phase {
            LookupPhase::Awaiting(flight) => (&mut flight.done).await.unwrap_or_else(|_| {
                log::warn!("Lookup task ended without a result");
                None
            }),
            _ => std::future::pending().await,
        }
    }

    /// Apply a finished lookup to the display
    pub fn complete_lookup(&mut self, record: Option<PartRecord>) {
        let LookupPhase::Awaiting(flight) = &self.phase else {
            log::debug!("Discarding lookup result with nothing pending");
            return;
        };

        let current = self.selected.as_ref().or(self.hovered.as_ref());
        if current.is_some_and(|c| c.payload != flight.payload) {
            log::debug!("Showing lookup result for a code that is no longer focused");
        }
        match &record {
            Some(part) => log::info!("Lookup found {}", part.supplier_part_number),
            None => log::info!("Lookup returned no data"),
        }
        self.phase = LookupPhase::Displaying(record);
    }

    pub fn terminate(&mut self) {
        self.phase = LookupPhase::Terminated;
    }

    pub fn state(&self) -> ArbiterState {
        match self.phase {
            LookupPhase::Idle => ArbiterState::Idle,
            LookupPhase::Awaiting(_) => ArbiterState::AwaitingLookup,
            LookupPhase::Displaying(_) => ArbiterState::Displaying,
            LookupPhase::Terminated => ArbiterState::Terminated,
        }
    }

    pub fn mode(&self) -> DetectionMode {
        if self.selected.is_some() {
            DetectionMode::Manual
        } else {
            DetectionMode::Auto
        }
    }

    pub fn viewport(&self) -> &ViewportMapper {
        &self.viewport
    }

    pub fn codes(&self) -> &[CodeGeometry] {
        &self.codes
    }

    #[cfg(test)]
    pub fn hovered(&self) -> Option<&CodeGeometry> {
        self.hovered.as_ref()
    }

    #[cfg(test)]
    pub fn selected(&self) -> Option<&CodeGeometry> {
        self.selected.as_ref()
    }

    pub fn displayed(&self) -> Option<&CodeGeometry> {
        self.displayed.as_ref()
    }

    /// Result currently shown, if the last lookup produced one
    pub fn record(&self) -> Option<&PartRecord> {
        match &self.phase {
            LookupPhase::Displaying(record) => record.as_ref(),
            _ => None,
        }
    }

    pub fn overlay_role(&self, code: &CodeGeometry) -> OverlayRole {
        if self.hovered.as_ref() == Some(code) {
            OverlayRole::Hovered
        } else if self
            .displayed
            .as_ref()
            .is_some_and(|d| d.payload == code.payload)
        {
            OverlayRole::Displayed(self.mode())
        } else {
            OverlayRole::Other
        }
    }

    /// Payload of the hovered code and where to show it on screen
    pub fn tooltip(&self) -> Option<(String, (f32, f32))> {
        let code = self.hovered.as_ref()?;
        let pointer = self.pointer?;
        Some((code.payload_text().into_owned(), pointer))
    }

    /// First code under the pointer, in scan order
    fn update_hover(&mut self) {
        self.hovered = self.pointer.and_then(|(x, y)| {
            if !self.viewport.contains_screen(x, y) {
                return None;
            }
            let (fx, fy) = self.viewport.to_frame_space(x, y);
            self.codes.iter().find(|c| c.contains(fx, fy)).cloned()
        });
    }
}
