use crate::features::document::DocumentKind;
use crate::features::placement::{DragState, Placements};
use crate::features::render::RenderStatus;
use crate::features::store::{ReportDocument, Signature};
use crate::features::transform::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningMode {
    SelectingSignature,
    Placing,
    Dragging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Closed,
    Viewing,
    Signing(SigningMode),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Closed => "closed",
            Phase::Viewing => "viewing",
            Phase::Signing(SigningMode::SelectingSignature) => "selecting_signature",
            Phase::Signing(SigningMode::Placing) => "placing",
            Phase::Signing(SigningMode::Dragging) => "dragging",
        }
    }

    pub fn is_signing(&self) -> bool {
        matches!(self, Phase::Signing(_))
    }
}

/// How the last signing session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Saved,
    Downloaded,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenDocument {
    pub document: ReportDocument,
    pub kind: DocumentKind,
    pub page_count: u32,
    /// Local file the document was imported from, if any.
    pub source_uri: Option<String>,
}

/// Everything the signing workspace knows, in one place so it can be
/// snapshotted and restored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub phase: Phase,
    pub document: Option<OpenDocument>,
    pub selected_page: u32,
    /// Logical size of the selected page; known once the document is open.
    pub page_size: Option<(f64, f64)>,
    pub zoom_percent: f64,
    pub surface_origin: Point,
    pub signatures: Vec<Signature>,
    pub selected_signature: Option<String>,
    pub selected_placement: Option<String>,
    pub placements: Placements,
    pub drag: DragState,
    pub render: RenderStatus,
    pub render_generation: u64,
    pub last_outcome: Option<Outcome>,
    pub last_error: Option<String>,
    pub last_output: Option<String>,
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceState {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Closed,
            document: None,
            selected_page: 1,
            page_size: None,
            zoom_percent: 100.0,
            surface_origin: Point::new(0.0, 0.0),
            signatures: Vec::new(),
            selected_signature: None,
            selected_placement: None,
            placements: Placements::new(),
            drag: DragState::Idle,
            render: RenderStatus::Idle,
            render_generation: 0,
            last_outcome: None,
            last_error: None,
            last_output: None,
        }
    }

    /// Back to `Closed`. The render generation keeps counting so that results
    /// issued before the reset are still recognised as stale.
    pub fn reset(&mut self) {
        let generation = self.render_generation;
        *self = Self::new();
        self.render_generation = generation;
    }

    /// Drops everything tied to one signing session.
    pub fn end_session(&mut self) {
        self.placements.clear();
        self.drag = DragState::Idle;
        self.selected_placement = None;
        self.selected_signature = None;
    }

    pub fn default_signature(&self) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.is_default)
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |d| d.page_count)
    }
}
