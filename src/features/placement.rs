use crate::error::{Result, SignError};
use crate::features::transform::{clamp_percent, Point, Viewport};
use serde::{Deserialize, Serialize};

/// One signature instance on one page. Lives only for a signing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedSignature {
    pub id: String,
    pub signature_id: String,
    pub x_percent: f64,
    pub y_percent: f64,
    pub size_px: f64,
    pub page: u32,
}

impl PlacedSignature {
    pub fn position(&self) -> Point {
        Point::new(self.x_percent, self.y_percent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeLimits {
    pub min: f64,
    pub max: f64,
}

impl SizeLimits {
    pub fn clamp(&self, size_px: f64) -> f64 {
        if size_px.is_nan() {
            return self.min;
        }
        size_px.clamp(self.min, self.max)
    }
}

/// Placement list in insertion order; later entries are drawn on top.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Placements {
    items: Vec<PlacedSignature>,
}

impl Placements {
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn add(
        &mut self,
        signature_id: &str,
        position: Point,
        page: u32,
        size_px: f64,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.items.push(PlacedSignature {
            id: id.clone(),
            signature_id: signature_id.to_string(),
            x_percent: clamp_percent(position.x),
            y_percent: clamp_percent(position.y),
            size_px,
            page,
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Result<PlacedSignature> {
        let idx = self
            .items
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| SignError::PlacementNotFound(id.to_string()))?;
        Ok(self.items.remove(idx))
    }

    pub fn resize(&mut self, id: &str, size_px: f64, limits: SizeLimits) -> Result<()> {
        let placement = self.get_mut(id)?;
        placement.size_px = limits.clamp(size_px);
        Ok(())
    }

    pub fn move_to(&mut self, id: &str, position: Point) -> Result<()> {
        let placement = self.get_mut(id)?;
        placement.x_percent = clamp_percent(position.x);
        placement.y_percent = clamp_percent(position.y);
        Ok(())
    }

    /// Drops every placement that references `signature_id`; returns how many went.
    pub fn remove_signature(&mut self, signature_id: &str) -> usize {
        self.retain_signatures(|id| id != signature_id)
    }

    /// Keeps placements whose signature passes `known`; returns how many went.
    pub fn retain_signatures(&mut self, known: impl Fn(&str) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|p| known(&p.signature_id));
        before - self.items.len()
    }

    /// Re-applies the position and size clamps to every placement.
    pub fn clamp_all(&mut self, limits: SizeLimits) {
        for placement in &mut self.items {
            placement.x_percent = clamp_percent(placement.x_percent);
            placement.y_percent = clamp_percent(placement.y_percent);
            placement.size_px = limits.clamp(placement.size_px);
        }
    }

    pub fn get(&self, id: &str) -> Option<&PlacedSignature> {
        self.items.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut PlacedSignature> {
        self.items
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| SignError::PlacementNotFound(id.to_string()))
    }

    pub fn on_page(&self, page: u32) -> impl Iterator<Item = &PlacedSignature> {
        self.items.iter().filter(move |p| p.page == page)
    }

    pub fn as_slice(&self) -> &[PlacedSignature] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Pointer gesture over the signing surface.
///
/// A press only turns into a drag once the pointer has travelled past the
/// threshold, so plain clicks never nudge a placement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DragState {
    #[default]
    Idle,
    Pressed {
        origin: Point,
        target: Option<String>,
    },
    Dragging {
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerRelease {
    /// Released over nothing without moving.
    Click(Point),
    /// Released on a placement without moving.
    Select(String),
    DragEnded(String),
    None,
}

impl DragState {
    pub fn press(&mut self, client: Point, target: Option<String>) {
        *self = DragState::Pressed {
            origin: client,
            target,
        };
    }

    /// Returns the id of the placement that moved, if any.
    pub fn motion(
        &mut self,
        client: Point,
        viewport: &Viewport,
        threshold_px: f64,
        placements: &mut Placements,
    ) -> Result<Option<String>> {
        let promote = match self {
            DragState::Pressed {
                origin,
                target: Some(id),
            } if viewport.logical_distance(*origin, client) > threshold_px => Some(id.clone()),
            _ => None,
        };
        if let Some(id) = promote {
            *self = DragState::Dragging { id };
        }
        match self {
            DragState::Dragging { id } => {
                placements.move_to(id, viewport.pointer_to_percent(client))?;
                Ok(Some(id.clone()))
            }
            _ => Ok(None),
        }
    }

    pub fn release(&mut self, client: Point) -> PointerRelease {
        match std::mem::take(self) {
            DragState::Idle => PointerRelease::None,
            DragState::Pressed { target: Some(id), .. } => PointerRelease::Select(id),
            DragState::Pressed { target: None, .. } => PointerRelease::Click(client),
            DragState::Dragging { id } => PointerRelease::DragEnded(id),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging { .. })
    }
}
