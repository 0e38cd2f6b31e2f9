use crate::config::SigningConfig;
use crate::error::{Result, SignError};
use crate::features::compositor::{
    composite, load_signature_images, signature_width, CompositeOutput,
};
use crate::features::document::{signed_file_name, DocumentKind};
use crate::features::local_store::LocalStore;
use crate::features::placement::{PointerRelease, SizeLimits};
use crate::features::render::{MediaBoxRasterizer, RenderJob, RenderOutcome, RenderStatus, Renderer};
use crate::features::storage::output_dir_for;
use crate::features::store::{
    DocumentContent, DocumentStore, ReportDocument, Signature, SignatureUpload,
};
use crate::features::transform::{Point, Viewport};
use crate::state::{OpenDocument, Outcome, Phase, SigningMode, WorkspaceState};
use crate::ui::{
    node, Button as UiButton, Column as UiColumn, PlacementBox, Progress as UiProgress,
    Row as UiRow, SigningSurface, Text as UiText, Warning as UiWarning,
};
use log::{debug, info, warn};
use rust_i18n::t;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

const ZOOM_STEP: f64 = 25.0;
const SIZE_STEP: f64 = 10.0;

/// The signing workspace: session state plus the collaborators it drives.
///
/// Every operation validates against the current phase first and leaves the
/// state untouched when it fails.
pub struct Workspace {
    pub state: WorkspaceState,
    store: Arc<dyn DocumentStore>,
    renderer: Renderer,
    config: SigningConfig,
    source: Option<Arc<Vec<u8>>>,
}

impl Workspace {
    pub fn new(store: Arc<dyn DocumentStore>, renderer: Renderer, config: SigningConfig) -> Self {
        Self {
            state: WorkspaceState::new(),
            store,
            renderer,
            config,
            source: None,
        }
    }

    /// Local store under the configured data dir, blank-canvas rasterizer.
    pub fn from_config(config: SigningConfig) -> Result<Self> {
        let store = LocalStore::open(config.data_dir(), config.url_ttl())?;
        let renderer = Renderer::new(
            Arc::new(MediaBoxRasterizer),
            config.render_scale,
            config.render_timeout(),
        );
        Ok(Self::new(Arc::new(store), renderer, config))
    }

    fn invalid(&self, action: &'static str) -> SignError {
        SignError::InvalidTransition {
            action,
            phase: self.state.phase.name(),
        }
    }

    fn size_limits(&self) -> SizeLimits {
        SizeLimits {
            min: self.config.min_size_px,
            max: self.config.max_size_px,
        }
    }

    fn open(&self) -> Result<&OpenDocument> {
        self.state.document.as_ref().ok_or(SignError::NoDocument)
    }

    /// Signing is active and no drag is in flight.
    fn require_settled(&self, action: &'static str) -> Result<()> {
        match self.state.phase {
            Phase::Signing(SigningMode::SelectingSignature | SigningMode::Placing) => Ok(()),
            _ => Err(self.invalid(action)),
        }
    }

    pub fn viewport(&self) -> Result<Viewport> {
        let (w, h) = self.state.page_size.ok_or(SignError::NoDocument)?;
        let origin = self.state.surface_origin;
        let mut viewport = Viewport::new(w, h)?.with_origin(origin.x, origin.y);
        viewport.set_zoom(
            self.state.zoom_percent,
            self.config.min_zoom_percent,
            self.config.max_zoom_percent,
        );
        Ok(viewport)
    }

    pub fn record_error(&mut self, err: &SignError) {
        self.state.last_error = Some(err.to_string());
    }

    // --- documents -------------------------------------------------------

    /// Uploads a local file into the store and opens it.
    pub fn import_document(
        &mut self,
        bytes: &[u8],
        file_name: &str,
        source_uri: Option<String>,
    ) -> Result<RenderJob> {
        if self.state.phase.is_signing() {
            return Err(self.invalid("workspace_open"));
        }
        DocumentKind::detect(bytes)?;
        let document = self.store.upload_document(bytes, file_name, None)?;
        self.open_document(&document.id, source_uri)
    }

    pub fn open_document(&mut self, id: &str, source_uri: Option<String>) -> Result<RenderJob> {
        if self.state.phase.is_signing() {
            return Err(self.invalid("workspace_open"));
        }
        let document = self.store.get_document(id)?;
        let bytes = self.store.fetch(&document.file_url)?;
        let kind = DocumentKind::detect(&bytes)?;
        let page_count = self.renderer.page_count(&bytes, kind)?;
        if page_count == 0 {
            return Err(SignError::DocumentParse("no_pages".into()));
        }
        let page_size = self.renderer.page_size(&bytes, kind, 1)?;
        let signatures = self.store.list_signatures()?;

        self.state.reset();
        info!(
            "opened document {} ({}, {page_count} page(s))",
            document.id,
            kind.mime_type()
        );
        self.state.document = Some(OpenDocument {
            document,
            kind,
            page_count,
            source_uri,
        });
        self.state.page_size = Some(page_size);
        self.state.signatures = signatures;
        self.state.phase = Phase::Viewing;
        self.source = Some(Arc::new(bytes));
        self.begin_render()
    }

    /// Returns to `Closed` from any phase. Renders still in flight are
    /// discarded when they land.
    pub fn close(&mut self) {
        debug!("workspace closed from {}", self.state.phase.name());
        self.discard_frame();
        self.state.reset();
        self.source = None;
    }

    fn discard_frame(&mut self) {
        if let RenderStatus::Ready { bitmap_path, .. } = std::mem::take(&mut self.state.render) {
            let _ = std::fs::remove_file(bitmap_path);
        }
    }

    /// Adopts a snapshot after checking it against the stored document and
    /// signature library, then reloads the document bytes it refers to.
    pub fn restore(&mut self, snapshot: WorkspaceState) -> Result<Option<RenderJob>> {
        let checked = if snapshot.document.is_some() {
            Some(self.checked_snapshot(snapshot)?)
        } else if snapshot.phase == Phase::Closed {
            None
        } else {
            return Err(SignError::NoDocument);
        };
        let generation = self.state.render_generation;
        self.close();
        let Some((mut state, bytes)) = checked else {
            return Ok(None);
        };
        state.render_generation = state.render_generation.max(generation);
        self.state = state;
        self.source = Some(Arc::new(bytes));
        self.begin_render().map(Some)
    }

    /// Re-derives everything a snapshot could get wrong: document kind and
    /// page count, page numbers, clamped positions and sizes, and signatures.
    fn checked_snapshot(&self, mut snapshot: WorkspaceState) -> Result<(WorkspaceState, Vec<u8>)> {
        let open = snapshot.document.take().ok_or(SignError::NoDocument)?;
        let document = self.store.get_document(&open.document.id)?;
        let bytes = self.store.fetch(&document.file_url)?;
        let kind = DocumentKind::detect(&bytes)?;
        let page_count = self.renderer.page_count(&bytes, kind)?;

        let page = snapshot.selected_page;
        if page == 0 || page > page_count {
            return Err(SignError::PageOutOfRange(page));
        }
        if let Some(p) = snapshot
            .placements
            .as_slice()
            .iter()
            .find(|p| p.page == 0 || p.page > page_count)
        {
            return Err(SignError::PageOutOfRange(p.page));
        }
        let page_size = self.renderer.page_size(&bytes, kind, page)?;
        let signatures = self.store.list_signatures()?;

        let placements = &mut snapshot.placements;
        let dropped = placements.retain_signatures(|id| signatures.iter().any(|s| s.id == id));
        if dropped > 0 {
            debug!("restore dropped {dropped} placement(s) of missing signatures");
        }
        placements.clamp_all(self.size_limits());

        if let Some(id) = &snapshot.selected_placement {
            if placements.get(id).is_none() {
                snapshot.selected_placement = None;
            }
        }
        if let Some(id) = &snapshot.selected_signature {
            if !signatures.iter().any(|s| &s.id == id) {
                snapshot.selected_signature = None;
            }
        }
        snapshot.phase = match snapshot.phase {
            Phase::Closed => Phase::Viewing,
            Phase::Viewing => Phase::Viewing,
            Phase::Signing(_) if snapshot.selected_signature.is_some() => {
                Phase::Signing(SigningMode::Placing)
            }
            Phase::Signing(_) => Phase::Signing(SigningMode::SelectingSignature),
        };
        snapshot.zoom_percent = if snapshot.zoom_percent.is_finite() {
            snapshot
                .zoom_percent
                .clamp(self.config.min_zoom_percent, self.config.max_zoom_percent)
        } else {
            100.0
        };
        snapshot.document = Some(OpenDocument {
            document,
            kind,
            page_count,
            source_uri: open.source_uri,
        });
        snapshot.page_size = Some(page_size);
        snapshot.signatures = signatures;
        snapshot.render = RenderStatus::Idle;
        snapshot.drag = Default::default();
        Ok((snapshot, bytes))
    }

    pub fn set_zoom(&mut self, zoom_percent: f64) -> Result<()> {
        if self.state.phase == Phase::Closed {
            return Err(self.invalid("zoom_set"));
        }
        if !zoom_percent.is_finite() {
            return Err(SignError::InvalidInput("zoom".into()));
        }
        self.state.zoom_percent =
            zoom_percent.clamp(self.config.min_zoom_percent, self.config.max_zoom_percent);
        Ok(())
    }

    pub fn set_surface_origin(&mut self, left: f64, top: f64) {
        self.state.surface_origin = Point::new(left, top);
    }

    pub fn select_page(&mut self, page: u32) -> Result<RenderJob> {
        if matches!(
            self.state.phase,
            Phase::Closed | Phase::Signing(SigningMode::Dragging)
        ) {
            return Err(self.invalid("page_select"));
        }
        let open = self.open()?;
        if page == 0 || page > open.page_count {
            return Err(SignError::PageOutOfRange(page));
        }
        let bytes = self.source.clone().ok_or(SignError::NoDocument)?;
        let page_size = self.renderer.page_size(&bytes, open.kind, page)?;

        self.state.selected_page = page;
        self.state.page_size = Some(page_size);
        self.state.drag = Default::default();
        self.state.selected_placement = None;
        self.begin_render()
    }

    // --- rendering -------------------------------------------------------

    /// Issues a render of the selected page under a new generation.
    pub fn begin_render(&mut self) -> Result<RenderJob> {
        let open = self.open()?;
        let kind = open.kind;
        let bytes = self.source.clone().ok_or(SignError::NoDocument)?;
        self.state.render_generation += 1;
        let generation = self.state.render_generation;
        let page = self.state.selected_page;
        self.state.render = RenderStatus::Loading { generation, page };
        debug!("render generation {generation} for page {page}");
        Ok(RenderJob {
            generation,
            page,
            kind,
            bytes,
            renderer: self.renderer.clone(),
            output_dir: self.config.output_dir(),
        })
    }

    /// Applies a finished render unless a newer request or a close superseded
    /// it. Returns whether it was applied.
    pub fn finish_render(&mut self, outcome: RenderOutcome) -> bool {
        if outcome.generation != self.state.render_generation || self.state.document.is_none() {
            warn!(
                "discarding stale render generation {} (current {})",
                outcome.generation, self.state.render_generation
            );
            if let Ok(frame) = &outcome.result {
                let _ = std::fs::remove_file(&frame.bitmap_path);
            }
            return false;
        }
        let previous = std::mem::take(&mut self.state.render);
        self.state.render = match outcome.result {
            Ok(frame) => {
                self.state.page_size = Some((frame.logical_width, frame.logical_height));
                RenderStatus::Ready {
                    generation: outcome.generation,
                    page: outcome.page,
                    logical_width: frame.logical_width,
                    logical_height: frame.logical_height,
                    bitmap_path: frame.bitmap_path.to_string_lossy().into_owned(),
                }
            }
            Err(e) => {
                warn!("render of page {} failed: {e}", outcome.page);
                RenderStatus::Failed {
                    generation: outcome.generation,
                    page: outcome.page,
                    reason: e.to_string(),
                }
            }
        };
        if let RenderStatus::Ready { bitmap_path, .. } = previous {
            let _ = std::fs::remove_file(bitmap_path);
        }
        true
    }

    // --- signing session -------------------------------------------------

    pub fn start_signing(&mut self) -> Result<()> {
        if self.state.phase != Phase::Viewing {
            return Err(self.invalid("sign_start"));
        }
        let signatures = self.store.list_signatures()?;
        self.state.signatures = signatures;
        self.state.end_session();
        self.state.last_outcome = None;
        self.state.selected_signature = self.state.default_signature().map(|s| s.id.clone());
        self.state.phase = Phase::Signing(if self.state.selected_signature.is_some() {
            SigningMode::Placing
        } else {
            SigningMode::SelectingSignature
        });
        debug!("signing started in {}", self.state.phase.name());
        Ok(())
    }

    pub fn select_signature(&mut self, signature_id: &str) -> Result<()> {
        self.require_settled("signature_select")?;
        if !self.state.signatures.iter().any(|s| s.id == signature_id) {
            return Err(SignError::SignatureNotFound(signature_id.to_string()));
        }
        self.state.selected_signature = Some(signature_id.to_string());
        self.state.phase = Phase::Signing(SigningMode::Placing);
        Ok(())
    }

    pub fn cancel_signing(&mut self) -> Result<()> {
        if !self.state.phase.is_signing() {
            return Err(self.invalid("sign_cancel"));
        }
        debug!("signing cancelled with {} placement(s)", self.state.placements.len());
        self.finish_session(Outcome::Cancelled);
        Ok(())
    }

    fn finish_session(&mut self, outcome: Outcome) {
        self.state.end_session();
        self.state.phase = Phase::Viewing;
        self.state.last_outcome = Some(outcome);
        self.state.last_error = None;
    }

    /// Places the selected signature at a percent position on the selected page.
    pub fn add_placement(&mut self, position: Point) -> Result<String> {
        if self.state.phase != Phase::Signing(SigningMode::Placing) {
            return Err(self.invalid("placement_add"));
        }
        let signature_id = self
            .state
            .selected_signature
            .clone()
            .ok_or(SignError::NoSignatureSelected)?;
        let id = self.state.placements.add(
            &signature_id,
            position,
            self.state.selected_page,
            self.config.default_size_px,
        );
        self.state.selected_placement = Some(id.clone());
        debug!("placement {id} on page {}", self.state.selected_page);
        Ok(id)
    }

    /// Same as [`Workspace::add_placement`] for a click in client coordinates.
    pub fn add_placement_at(&mut self, client: Point) -> Result<String> {
        let position = self.viewport()?.pointer_to_percent(client);
        self.add_placement(position)
    }

    pub fn remove_placement(&mut self, id: &str) -> Result<()> {
        self.require_settled("placement_remove")?;
        self.state.placements.remove(id)?;
        if self.state.selected_placement.as_deref() == Some(id) {
            self.state.selected_placement = None;
        }
        Ok(())
    }

    pub fn resize_placement(&mut self, id: &str, size_px: f64) -> Result<()> {
        self.require_settled("placement_resize")?;
        let limits = self.size_limits();
        self.state.placements.resize(id, size_px, limits)
    }

    pub fn pointer_down(&mut self, client: Point, target: Option<String>) -> Result<()> {
        self.require_settled("pointer_down")?;
        if let Some(id) = &target {
            let on_page = self
                .state
                .placements
                .get(id)
                .map_or(false, |p| p.page == self.state.selected_page);
            if !on_page {
                return Err(SignError::PlacementNotFound(id.clone()));
            }
        }
        self.state.drag.press(client, target);
        Ok(())
    }

    pub fn pointer_move(&mut self, client: Point) -> Result<()> {
        if !self.state.phase.is_signing() {
            return Ok(());
        }
        let viewport = self.viewport()?;
        let moved = self.state.drag.motion(
            client,
            &viewport,
            self.config.drag_threshold_px,
            &mut self.state.placements,
        )?;
        if moved.is_some() {
            self.state.phase = Phase::Signing(SigningMode::Dragging);
        }
        Ok(())
    }

    /// Ends a gesture. A plain click on empty page while placing adds a
    /// placement; its id is returned.
    pub fn pointer_up(&mut self, client: Point) -> Result<Option<String>> {
        if !self.state.phase.is_signing() {
            return Err(self.invalid("pointer_up"));
        }
        match self.state.drag.release(client) {
            PointerRelease::Click(at) => {
                if self.state.phase == Phase::Signing(SigningMode::Placing) {
                    return self.add_placement_at(at).map(Some);
                }
                self.state.selected_placement = None;
            }
            PointerRelease::Select(id) => self.state.selected_placement = Some(id),
            PointerRelease::DragEnded(id) => {
                self.state.selected_placement = Some(id);
                self.state.phase = Phase::Signing(if self.state.selected_signature.is_some() {
                    SigningMode::Placing
                } else {
                    SigningMode::SelectingSignature
                });
            }
            PointerRelease::None => {}
        }
        Ok(None)
    }

    // --- terminal actions ------------------------------------------------

    /// Re-fetches the original through a fresh URL and merges every placement.
    fn composite_current(&self, open: &OpenDocument) -> Result<CompositeOutput> {
        let placements = self.state.placements.as_slice();
        if placements.is_empty() {
            return Err(SignError::NoPlacements);
        }
        let fresh = self.store.get_document(&open.document.id)?;
        let original = self.store.fetch(&fresh.file_url)?;
        let images =
            load_signature_images(self.store.as_ref(), &self.state.signatures, placements)?;
        composite(&original, placements, &images)
    }

    /// Overwrites the stored document with the signed version.
    pub fn save(&mut self) -> Result<ReportDocument> {
        self.require_settled("sign_save")?;
        let open = self.open()?.clone();
        let output = self.composite_current(&open).map_err(|e| {
            warn!("composite for {} failed: {e}", open.document.id);
            e
        })?;
        let meta = DocumentContent {
            file_name: signed_file_name(&open.document.file_name, output.kind),
            file_type: output.kind.mime_type().to_string(),
        };
        let replaced = self
            .store
            .replace_document_content(&open.document.id, &output.bytes, meta)?;
        info!(
            "saved {} placement(s) into {} as {}",
            self.state.placements.len(),
            replaced.id,
            replaced.file_name
        );

        self.state.document = Some(OpenDocument {
            document: replaced.clone(),
            kind: output.kind,
            ..open
        });
        self.source = Some(Arc::new(output.bytes));
        self.finish_session(Outcome::Saved);
        Ok(replaced)
    }

    /// Writes the signed version next to the source file, or into the output
    /// dir, without touching the stored document.
    pub fn download(&mut self) -> Result<PathBuf> {
        self.require_settled("sign_download")?;
        let open = self.open()?.clone();
        let output = self.composite_current(&open).map_err(|e| {
            warn!("composite for {} failed: {e}", open.document.id);
            e
        })?;
        let dir = match open.source_uri.as_deref() {
            Some(uri) => output_dir_for(Some(uri)),
            None => self.config.output_dir(),
        };
        std::fs::create_dir_all(&dir)?;
        let target = dir.join(signed_file_name(&open.document.file_name, output.kind));
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&output.bytes)?;
        tmp.persist(&target).map_err(|e| SignError::Io(e.error))?;
        info!("downloaded signed copy of {} to {}", open.document.id, target.display());

        self.state.last_output = Some(target.display().to_string());
        self.finish_session(Outcome::Downloaded);
        Ok(target)
    }

    // --- signature library -----------------------------------------------

    pub fn refresh_signatures(&mut self) -> Result<()> {
        self.state.signatures = self.store.list_signatures()?;
        Ok(())
    }

    pub fn upload_signature(&mut self, bytes: &[u8], meta: SignatureUpload) -> Result<Signature> {
        let signature = self.store.upload_signature(bytes, meta)?;
        self.refresh_signatures()?;
        Ok(signature)
    }

    pub fn update_signature(
        &mut self,
        id: &str,
        name: &str,
        title: Option<&str>,
    ) -> Result<Signature> {
        let signature = self.store.update_signature(id, name, title)?;
        self.refresh_signatures()?;
        Ok(signature)
    }

    /// Deletes a signature and every placement that uses it.
    pub fn delete_signature(&mut self, id: &str) -> Result<()> {
        if self.state.phase == Phase::Signing(SigningMode::Dragging) {
            return Err(self.invalid("signature_delete"));
        }
        self.store.delete_signature(id)?;
        let dropped = self.state.placements.remove_signature(id);
        if dropped > 0 {
            debug!("dropped {dropped} placement(s) of deleted signature {id}");
        }
        if let Some(selected) = &self.state.selected_placement {
            if self.state.placements.get(selected).is_none() {
                self.state.selected_placement = None;
            }
        }
        if self.state.selected_signature.as_deref() == Some(id) {
            self.state.selected_signature = None;
            if self.state.phase == Phase::Signing(SigningMode::Placing) {
                self.state.phase = Phase::Signing(SigningMode::SelectingSignature);
            }
        }
        self.refresh_signatures()
    }

    pub fn set_default_signature(&mut self, id: &str) -> Result<()> {
        self.store.set_default_signature(id)?;
        self.refresh_signatures()
    }
}

pub fn render_workspace_screen(state: &WorkspaceState) -> Value {
    let mut children = Vec::new();
    let title = t!("signing_title");
    children.push(node(UiText::new(&title).size(20.0)));

    if let Some(err) = &state.last_error {
        let code = err.split(':').next().unwrap_or(err);
        children.push(node(UiWarning::new(code, err)));
    }

    let Some(open) = &state.document else {
        let hint = t!("signing_open_hint");
        let open_label = t!("signing_open");
        children.push(node(UiText::new(&hint).size(14.0)));
        children.push(node(
            UiButton::new(&open_label, "workspace_open").requires_file_picker(true),
        ));
        return node(UiColumn::new(children).padding(24));
    };

    children.push(node(UiText::new(&open.document.file_name).size(16.0)));
    push_navigation(&mut children, state, open.page_count);
    push_surface(&mut children, state);

    match state.phase {
        Phase::Closed | Phase::Viewing => push_viewing_controls(&mut children, state),
        Phase::Signing(mode) => push_signing_controls(&mut children, state, mode),
    }
    node(UiColumn::new(children).padding(16))
}

fn push_navigation(children: &mut Vec<Value>, state: &WorkspaceState, page_count: u32) {
    let page = state.selected_page;
    let page_label = t!("signing_page_label", page = page, count = page_count);
    let prev = t!("signing_prev_page");
    let next = t!("signing_next_page");
    let zoom_label = t!("signing_zoom_label", zoom = state.zoom_percent.round());
    let zoom_out = t!("signing_zoom_out");
    let zoom_in = t!("signing_zoom_in");
    let dragging = state.phase == Phase::Signing(SigningMode::Dragging);
    children.push(node(UiRow::new(vec![
        node(
            UiButton::new(&prev, "page_select")
                .bind("page", page.saturating_sub(1).to_string())
                .enabled(page > 1 && !dragging),
        ),
        node(UiText::new(&page_label)),
        node(
            UiButton::new(&next, "page_select")
                .bind("page", (page + 1).to_string())
                .enabled(page < page_count && !dragging),
        ),
        node(
            UiButton::new(&zoom_out, "zoom_set")
                .bind("zoom", (state.zoom_percent - ZOOM_STEP).to_string()),
        ),
        node(UiText::new(&zoom_label)),
        node(
            UiButton::new(&zoom_in, "zoom_set")
                .bind("zoom", (state.zoom_percent + ZOOM_STEP).to_string()),
        ),
    ])));
}

fn push_surface(children: &mut Vec<Value>, state: &WorkspaceState) {
    match &state.render {
        RenderStatus::Idle | RenderStatus::Loading { .. } => {
            let loading = t!("signing_loading");
            children.push(node(UiProgress::new().text(&loading)));
        }
        RenderStatus::Failed { reason, page, .. } => {
            let failed = t!("signing_render_failed");
            let retry = t!("signing_retry");
            children.push(node(UiWarning::new(reason, &failed)));
            children.push(node(
                UiButton::new(&retry, "page_select").bind("page", page.to_string()),
            ));
        }
        RenderStatus::Ready {
            logical_width,
            logical_height,
            bitmap_path,
            ..
        } => {
            let mut surface =
                SigningSurface::new(*logical_width, *logical_height, state.zoom_percent)
                    .bitmap_path(bitmap_path)
                .interactive(state.phase.is_signing());
            for placement in state.placements.on_page(state.selected_page) {
                let image_url = state
                    .signatures
                    .iter()
                    .find(|s| s.id == placement.signature_id)
                    .map(|s| s.image_url.as_str());
                surface = surface.placement(PlacementBox {
                    id: &placement.id,
                    signature_id: &placement.signature_id,
                    image_url,
                    center_x: placement.x_percent / 100.0 * logical_width,
                    center_y: placement.y_percent / 100.0 * logical_height,
                    width: signature_width(placement.size_px, *logical_width),
                    selected: state.selected_placement.as_deref() == Some(placement.id.as_str()),
                });
            }
            children.push(node(surface));
        }
    }
}

fn push_viewing_controls(children: &mut Vec<Value>, state: &WorkspaceState) {
    let outcome = match state.last_outcome {
        Some(Outcome::Saved) => Some(t!("signing_saved").to_string()),
        Some(Outcome::Downloaded) => Some(
            t!(
                "signing_downloaded",
                path = state.last_output.as_deref().unwrap_or_default()
            )
            .to_string(),
        ),
        Some(Outcome::Cancelled) => Some(t!("signing_cancelled").to_string()),
        None => None,
    };
    if let Some(text) = &outcome {
        children.push(node(UiText::new(text).size(14.0)));
    }
    let start = t!("signing_start");
    let close = t!("signing_close");
    children.push(node(UiButton::new(&start, "sign_start")));
    children.push(node(UiButton::new(&close, "workspace_close")));
}

fn push_signing_controls(children: &mut Vec<Value>, state: &WorkspaceState, mode: SigningMode) {
    let heading = match mode {
        SigningMode::SelectingSignature => t!("signing_choose_signature"),
        SigningMode::Placing | SigningMode::Dragging => t!("signing_placing_hint"),
    };
    children.push(node(UiText::new(&heading).size(14.0)));

    if state.signatures.is_empty() {
        let none = t!("signing_no_signatures");
        children.push(node(UiText::new(&none)));
    }
    let default_marker = t!("signing_default_marker");
    let set_default = t!("signing_set_default");
    let delete = t!("signing_delete_signature");
    for signature in &state.signatures {
        let mut label = signature.name.clone();
        if let Some(title) = &signature.title {
            label.push_str(&format!(" ({title})"));
        }
        if signature.is_default {
            label.push_str(&format!(" {default_marker}"));
        }
        let selected = state.selected_signature.as_deref() == Some(signature.id.as_str());
        let mut row = vec![node(
            UiButton::new(&label, "signature_select")
                .bind("signature_id", signature.id.clone())
                .enabled(!selected),
        )];
        if !signature.is_default {
            row.push(node(
                UiButton::new(&set_default, "signature_set_default")
                    .bind("signature_id", signature.id.clone()),
            ));
        }
        row.push(node(
            UiButton::new(&delete, "signature_delete").bind("signature_id", signature.id.clone()),
        ));
        children.push(node(UiRow::new(row)));
    }
    let upload = t!("signing_upload_signature");
    children.push(node(
        UiButton::new(&upload, "signature_upload").requires_file_picker(true),
    ));

    let count = t!("signing_placement_count", count = state.placements.len());
    children.push(node(UiText::new(&count)));

    if let Some(selected) = state
        .selected_placement
        .as_deref()
        .and_then(|id| state.placements.get(id))
    {
        let smaller = t!("signing_smaller");
        let larger = t!("signing_larger");
        let remove = t!("signing_remove");
        children.push(node(UiRow::new(vec![
            node(
                UiButton::new(&smaller, "placement_resize")
                    .bind("placement_id", selected.id.clone())
                    .bind("size", (selected.size_px - SIZE_STEP).to_string()),
            ),
            node(
                UiButton::new(&larger, "placement_resize")
                    .bind("placement_id", selected.id.clone())
                    .bind("size", (selected.size_px + SIZE_STEP).to_string()),
            ),
            node(
                UiButton::new(&remove, "placement_remove")
                    .bind("placement_id", selected.id.clone()),
            ),
        ])));
    }

    let has_placements = !state.placements.is_empty() && mode != SigningMode::Dragging;
    let save = t!("signing_save");
    let download = t!("signing_download");
    let cancel = t!("signing_cancel");
    children.push(node(UiRow::new(vec![
        node(UiButton::new(&save, "sign_save").enabled(has_placements)),
        node(UiButton::new(&download, "sign_download").enabled(has_placements)),
        node(UiButton::new(&cancel, "sign_cancel")),
    ])));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::{png_bytes, sample_pdf, solid};
    use crate::features::store::{AccessUrl, Folder};
    use lopdf::content::Content;
    use lopdf::{Document, Object};
    use serde_json::json;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Wraps a store so every URL issued so far can be expired on demand.
    struct ExpiringStore {
        inner: LocalStore,
        issued: Mutex<Vec<String>>,
        expired: Mutex<HashSet<String>>,
    }

    impl ExpiringStore {
        fn expire_issued(&self) {
            let issued: Vec<String> = self.issued.lock().unwrap().drain(..).collect();
            self.expired.lock().unwrap().extend(issued);
        }

        fn track(&self, url: &str) {
            self.issued.lock().unwrap().push(url.to_string());
        }
    }

    impl DocumentStore for ExpiringStore {
        fn list_signatures(&self) -> Result<Vec<Signature>> {
            let list = self.inner.list_signatures()?;
            list.iter().for_each(|s| self.track(&s.image_url));
            Ok(list)
        }
        fn upload_signature(&self, bytes: &[u8], meta: SignatureUpload) -> Result<Signature> {
            self.inner.upload_signature(bytes, meta)
        }
        fn update_signature(&self, id: &str, name: &str, title: Option<&str>) -> Result<Signature> {
            self.inner.update_signature(id, name, title)
        }
        fn delete_signature(&self, id: &str) -> Result<()> {
            self.inner.delete_signature(id)
        }
        fn set_default_signature(&self, id: &str) -> Result<()> {
            self.inner.set_default_signature(id)
        }
        fn upload_document(
            &self,
            bytes: &[u8],
            file_name: &str,
            folder_id: Option<&str>,
        ) -> Result<ReportDocument> {
            self.inner.upload_document(bytes, file_name, folder_id)
        }
        fn get_document(&self, id: &str) -> Result<ReportDocument> {
            let doc = self.inner.get_document(id)?;
            self.track(&doc.file_url);
            Ok(doc)
        }
        fn list_documents(&self, folder_id: Option<&str>) -> Result<Vec<ReportDocument>> {
            self.inner.list_documents(folder_id)
        }
        fn replace_document_content(
            &self,
            id: &str,
            bytes: &[u8],
            meta: DocumentContent,
        ) -> Result<ReportDocument> {
            self.inner.replace_document_content(id, bytes, meta)
        }
        fn delete_document(&self, id: &str) -> Result<()> {
            self.inner.delete_document(id)
        }
        fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Folder> {
            self.inner.create_folder(name, parent_id)
        }
        fn list_folders(&self) -> Result<Vec<Folder>> {
            self.inner.list_folders()
        }
        fn delete_folder(&self, id: &str) -> Result<()> {
            self.inner.delete_folder(id)
        }
        fn resolve_url(&self, key: &str) -> Result<AccessUrl> {
            let url = self.inner.resolve_url(key)?;
            self.track(&url.url);
            Ok(url)
        }
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            if self.expired.lock().unwrap().contains(url) {
                return Err(SignError::UrlExpired);
            }
            self.inner.fetch(url)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        out_dir: PathBuf,
        store: Arc<ExpiringStore>,
        ws: Workspace,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let config = SigningConfig {
            output_dir: Some(out_dir.clone()),
            data_dir: Some(dir.path().join("data")),
            ..SigningConfig::default()
        };
        let store = Arc::new(ExpiringStore {
            inner: LocalStore::open(dir.path().join("data"), Duration::from_secs(60)).unwrap(),
            issued: Mutex::new(Vec::new()),
            expired: Mutex::new(HashSet::new()),
        });
        let renderer = Renderer::new(Arc::new(MediaBoxRasterizer), 2.0, Duration::from_secs(5));
        let ws = Workspace::new(store.clone(), renderer, config);
        Fixture {
            _dir: dir,
            out_dir,
            store,
            ws,
        }
    }

    fn upload_ink(ws: &mut Workspace, name: &str) -> Signature {
        // Black ink on white paper; the paper is stripped at composite time.
        let mut img = solid(40, 10, [255, 255, 255, 255]);
        for x in 0..40 {
            for y in 3..7 {
                img.put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
            }
        }
        ws.upload_signature(
            &png_bytes(img),
            SignatureUpload {
                name: name.into(),
                title: None,
                created_by: "tester".into(),
            },
        )
        .unwrap()
    }

    fn open_pdf(ws: &mut Workspace, pages: u32) {
        let job = ws.import_document(&sample_pdf(pages), "report.pdf", None).unwrap();
        let outcome = job.run();
        assert!(ws.finish_render(outcome));
    }

    fn stamps_on(doc: &Document, page: u32) -> Vec<[f64; 6]> {
        let page_id = doc.get_pages()[&page];
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content
            .operations
            .iter()
            .filter(|op| op.operator == "cm")
            .map(|op| {
                let mut m = [0.0; 6];
                for (slot, operand) in m.iter_mut().zip(&op.operands) {
                    *slot = match operand {
                        Object::Integer(i) => *i as f64,
                        Object::Real(r) => *r as f64,
                        _ => f64::NAN,
                    };
                }
                m
            })
            .collect()
    }

    #[test]
    fn invalid_transitions_leave_state_alone() {
        let mut f = fixture();
        let before = f.ws.state.clone();
        assert!(matches!(
            f.ws.start_signing(),
            Err(SignError::InvalidTransition { action: "sign_start", phase: "closed" })
        ));
        assert!(f.ws.add_placement(Point::new(50.0, 50.0)).is_err());
        assert!(f.ws.save().is_err());
        assert_eq!(f.ws.state, before);

        open_pdf(&mut f.ws, 1);
        assert!(matches!(f.ws.cancel_signing(), Err(SignError::InvalidTransition { .. })));
        assert_eq!(f.ws.state.phase, Phase::Viewing);
    }

    #[test]
    fn default_signature_skips_selection() {
        let mut f = fixture();
        let sig = upload_ink(&mut f.ws, "Ada");
        open_pdf(&mut f.ws, 1);

        f.ws.start_signing().unwrap();
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::SelectingSignature));
        f.ws.cancel_signing().unwrap();

        f.ws.set_default_signature(&sig.id).unwrap();
        f.ws.start_signing().unwrap();
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::Placing));
        assert_eq!(f.ws.state.selected_signature.as_deref(), Some(sig.id.as_str()));
    }

    #[test]
    fn cancel_discards_placements() {
        let mut f = fixture();
        let sig = upload_ink(&mut f.ws, "Ada");
        open_pdf(&mut f.ws, 1);
        f.ws.start_signing().unwrap();
        f.ws.select_signature(&sig.id).unwrap();
        f.ws.add_placement(Point::new(30.0, 30.0)).unwrap();

        f.ws.cancel_signing().unwrap();
        assert_eq!(f.ws.state.phase, Phase::Viewing);
        assert!(f.ws.state.placements.is_empty());
        assert_eq!(f.ws.state.last_outcome, Some(Outcome::Cancelled));
    }

    #[test]
    fn click_adds_and_drag_moves_placement() {
        let mut f = fixture();
        let sig = upload_ink(&mut f.ws, "Ada");
        open_pdf(&mut f.ws, 1);
        f.ws.start_signing().unwrap();
        f.ws.select_signature(&sig.id).unwrap();
        f.ws.set_zoom(200.0).unwrap();
        f.ws.set_surface_origin(10.0, 10.0);

        // Page is 612x792; at 2x the centre is at client (622, 802).
        f.ws.pointer_down(Point::new(622.0, 802.0), None).unwrap();
        let id = f.ws.pointer_up(Point::new(622.0, 802.0)).unwrap().unwrap();
        let placed = f.ws.state.placements.get(&id).unwrap();
        assert!((placed.x_percent - 50.0).abs() < 1e-9);
        assert!((placed.y_percent - 50.0).abs() < 1e-9);

        // Below the threshold nothing moves and the release selects.
        f.ws.pointer_down(Point::new(622.0, 802.0), Some(id.clone())).unwrap();
        f.ws.pointer_move(Point::new(623.0, 803.0)).unwrap();
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::Placing));
        f.ws.pointer_up(Point::new(623.0, 803.0)).unwrap();
        assert_eq!(f.ws.state.placements.get(&id).unwrap().x_percent, 50.0);
        assert_eq!(f.ws.state.selected_placement.as_deref(), Some(id.as_str()));

        f.ws.pointer_down(Point::new(622.0, 802.0), Some(id.clone())).unwrap();
        f.ws.pointer_move(Point::new(10.0 + 612.0 * 0.5, 802.0)).unwrap();
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::Dragging));
        assert!(f.ws.select_page(1).is_err());
        f.ws.pointer_up(Point::new(10.0 + 612.0 * 0.5, 802.0)).unwrap();
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::Placing));
        assert!((f.ws.state.placements.get(&id).unwrap().x_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_does_not_move_placements() {
        let mut f = fixture();
        let sig = upload_ink(&mut f.ws, "Ada");
        open_pdf(&mut f.ws, 1);
        f.ws.start_signing().unwrap();
        f.ws.select_signature(&sig.id).unwrap();
        let id = f.ws.add_placement_at(Point::new(200.0, 300.0)).unwrap();
        let stored = f.ws.state.placements.get(&id).unwrap().position();

        for zoom in [25.0, 80.0, 150.0, 400.0, 1000.0] {
            f.ws.set_zoom(zoom).unwrap();
            let vp = f.ws.viewport().unwrap();
            let back = vp.pointer_to_percent(vp.percent_to_client(stored));
            assert!((back.x - stored.x).abs() < 1e-6);
            assert!((back.y - stored.y).abs() < 1e-6);
        }
        assert_eq!(f.ws.state.zoom_percent, 400.0);
    }

    #[test]
    fn stale_renders_are_discarded() {
        let mut f = fixture();
        f.ws.import_document(&sample_pdf(2), "report.pdf", None).unwrap();
        let first = f.ws.select_page(1).unwrap();
        let second = f.ws.select_page(2).unwrap();

        let stale = first.run();
        assert!(!f.ws.finish_render(stale));
        assert!(f.ws.state.render.is_loading());

        let current = second.run();
        assert!(f.ws.finish_render(current));
        let RenderStatus::Ready { page: 2, bitmap_path, .. } = f.ws.state.render.clone() else {
            panic!("page 2 not ready: {:?}", f.ws.state.render);
        };
        assert!(Path::new(&bitmap_path).is_file());

        let late = f.ws.begin_render().unwrap();
        f.ws.close();
        assert!(!f.ws.finish_render(late.run()));
        assert_eq!(f.ws.state.render, RenderStatus::Idle);
        assert!(!Path::new(&bitmap_path).exists());
    }

    #[test]
    fn restore_repairs_tampered_snapshots() {
        let mut f = fixture();
        let keep = upload_ink(&mut f.ws, "Keep");
        let gone = upload_ink(&mut f.ws, "Gone");
        open_pdf(&mut f.ws, 2);
        f.ws.start_signing().unwrap();
        f.ws.select_signature(&gone.id).unwrap();
        f.ws.add_placement(Point::new(30.0, 30.0)).unwrap();
        f.ws.select_signature(&keep.id).unwrap();
        let kept = f.ws.add_placement(Point::new(50.0, 50.0)).unwrap();
        let RenderStatus::Ready { bitmap_path, .. } = f.ws.state.render.clone() else {
            panic!("page 1 not ready");
        };

        let mut snap = serde_json::to_value(&f.ws.state).unwrap();
        snap["placements"]["items"][1]["x_percent"] = json!(250.0);
        snap["placements"]["items"][1]["size_px"] = json!(100000.0);
        snap["document"]["page_count"] = json!(40);
        snap["selected_signature"] = json!(gone.id);
        f.store.inner.delete_signature(&gone.id).unwrap();

        let job = f.ws.restore(serde_json::from_value(snap.clone()).unwrap()).unwrap();
        f.ws.finish_render(job.unwrap().run());
        assert!(!Path::new(&bitmap_path).exists());

        let placements = f.ws.state.placements.as_slice();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].id, kept);
        assert_eq!(placements[0].x_percent, 95.0);
        assert_eq!(placements[0].size_px, 300.0);
        assert_eq!(f.ws.state.page_count(), 2);
        assert_eq!(f.ws.state.selected_signature, None);
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::SelectingSignature));

        let before = f.ws.state.clone();
        snap["selected_page"] = json!(7);
        let err = f.ws.restore(serde_json::from_value(snap.clone()).unwrap()).unwrap_err();
        assert!(matches!(err, SignError::PageOutOfRange(7)));
        snap["selected_page"] = json!(1);
        snap["placements"]["items"][1]["page"] = json!(3);
        let err = f.ws.restore(serde_json::from_value(snap).unwrap()).unwrap_err();
        assert!(matches!(err, SignError::PageOutOfRange(3)));
        assert_eq!(f.ws.state, before);
    }

    #[test]
    fn drag_without_a_selected_signature_keeps_selection_mode() {
        let mut f = fixture();
        let keep = upload_ink(&mut f.ws, "Keep");
        let gone = upload_ink(&mut f.ws, "Gone");
        open_pdf(&mut f.ws, 1);
        f.ws.start_signing().unwrap();
        f.ws.select_signature(&keep.id).unwrap();
        let id = f.ws.add_placement(Point::new(50.0, 50.0)).unwrap();
        f.ws.select_signature(&gone.id).unwrap();
        f.ws.add_placement(Point::new(20.0, 20.0)).unwrap();
        f.ws.delete_signature(&gone.id).unwrap();
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::SelectingSignature));

        // Page centre at zoom 100 is client (306, 396).
        f.ws.pointer_down(Point::new(306.0, 396.0), Some(id.clone())).unwrap();
        f.ws.pointer_move(Point::new(153.0, 396.0)).unwrap();
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::Dragging));
        f.ws.pointer_up(Point::new(153.0, 396.0)).unwrap();

        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::SelectingSignature));
        assert_eq!(f.ws.state.selected_placement.as_deref(), Some(id.as_str()));
        assert!((f.ws.state.placements.get(&id).unwrap().x_percent - 25.0).abs() < 1e-9);
        f.ws.select_signature(&keep.id).unwrap();
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::Placing));
    }

    #[test]
    fn save_overwrites_with_signed_pages_after_urls_expire() {
        let mut f = fixture();
        let sig = upload_ink(&mut f.ws, "Ada");
        open_pdf(&mut f.ws, 2);
        let doc_id = f.ws.state.document.as_ref().unwrap().document.id.clone();
        let stale_url = f.ws.state.document.as_ref().unwrap().document.file_url.clone();

        f.ws.start_signing().unwrap();
        f.ws.select_signature(&sig.id).unwrap();
        f.ws.add_placement(Point::new(50.0, 50.0)).unwrap();
        f.ws.select_page(2).unwrap();
        f.ws.add_placement(Point::new(20.0, 80.0)).unwrap();

        f.store.expire_issued();
        assert!(matches!(f.store.fetch(&stale_url), Err(SignError::UrlExpired)));

        let saved = f.ws.save().unwrap();
        assert_eq!(saved.id, doc_id);
        assert_eq!(saved.file_name, "report_signed.pdf");
        assert_eq!(f.ws.state.phase, Phase::Viewing);
        assert_eq!(f.ws.state.last_outcome, Some(Outcome::Saved));
        assert!(f.ws.state.placements.is_empty());

        let stored = f.store.fetch(&f.store.get_document(&doc_id).unwrap().file_url).unwrap();
        let doc = Document::load_mem(&stored).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        let one = stamps_on(&doc, 1);
        let two = stamps_on(&doc, 2);
        assert_eq!((one.len(), two.len()), (1, 1));
        // 612 * 0.4 wide, 4:1 ink -> 244.8 x 61.2, centred on (306, 396).
        assert!((one[0][4] + one[0][0] / 2.0 - 306.0).abs() < 0.01);
        assert!((one[0][5] + one[0][3] / 2.0 - 396.0).abs() < 0.01);
        // Page 2 centre at (122.4, 158.4), near the bottom-left.
        assert!((two[0][4] + two[0][0] / 2.0 - 122.4).abs() < 0.01);
        assert!((two[0][5] + two[0][3] / 2.0 - 158.4).abs() < 0.01);
    }

    #[test]
    fn failed_signature_fetch_aborts_without_writing() {
        let mut f = fixture();
        let sig = upload_ink(&mut f.ws, "Ada");
        open_pdf(&mut f.ws, 1);
        let doc_id = f.ws.state.document.as_ref().unwrap().document.id.clone();
        f.ws.start_signing().unwrap();
        f.ws.select_signature(&sig.id).unwrap();
        f.ws.add_placement(Point::new(50.0, 50.0)).unwrap();

        // The image disappears behind the workspace's back.
        f.store.inner.delete_signature(&sig.id).unwrap();
        let err = f.ws.save().unwrap_err();
        assert!(matches!(err, SignError::SignatureFetch { .. }));
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::Placing));
        assert_eq!(f.ws.state.placements.len(), 1);
        let doc = f.store.get_document(&doc_id).unwrap();
        assert_eq!(doc.file_name, "report.pdf");
    }

    #[test]
    fn download_writes_signed_image_and_keeps_store_untouched() {
        let mut f = fixture();
        let sig = upload_ink(&mut f.ws, "Ada");
        let original = png_bytes(solid(200, 100, [0, 255, 0, 255]));
        let job = f.ws.import_document(&original, "scan.png", None).unwrap();
        f.ws.finish_render(job.run());
        let doc_id = f.ws.state.document.as_ref().unwrap().document.id.clone();

        f.ws.start_signing().unwrap();
        f.ws.select_signature(&sig.id).unwrap();
        f.ws.add_placement(Point::new(50.0, 50.0)).unwrap();
        let path = f.ws.download().unwrap();

        assert_eq!(path, f.out_dir.join("scan_signed.png"));
        assert_eq!(f.ws.state.last_outcome, Some(Outcome::Downloaded));
        let signed = image::open(&path).unwrap().to_rgba8();
        assert_eq!(signed.dimensions(), (200, 100));
        // Ink row through the middle, paper stripped elsewhere.
        assert_eq!(signed.get_pixel(100, 50)[1], 0);
        assert_eq!(*signed.get_pixel(100, 42), image::Rgba([0, 255, 0, 255]));

        let stored = f.store.fetch(&f.store.get_document(&doc_id).unwrap().file_url).unwrap();
        assert_eq!(stored, original);
    }

    #[test]
    fn deleting_the_selected_signature_returns_to_selection() {
        let mut f = fixture();
        let keep = upload_ink(&mut f.ws, "Keep");
        let gone = upload_ink(&mut f.ws, "Gone");
        open_pdf(&mut f.ws, 1);
        f.ws.start_signing().unwrap();
        f.ws.select_signature(&keep.id).unwrap();
        f.ws.add_placement(Point::new(20.0, 20.0)).unwrap();
        f.ws.select_signature(&gone.id).unwrap();
        f.ws.add_placement(Point::new(60.0, 60.0)).unwrap();

        f.ws.delete_signature(&gone.id).unwrap();
        assert_eq!(f.ws.state.placements.len(), 1);
        assert_eq!(f.ws.state.phase, Phase::Signing(SigningMode::SelectingSignature));
        assert!(f.ws.state.selected_placement.is_none());
        assert_eq!(f.ws.state.signatures.len(), 1);
    }

    #[test]
    fn screen_reflects_phase() {
        let mut f = fixture();
        let closed = render_workspace_screen(&f.ws.state);
        assert_eq!(closed["type"], "Column");
        assert!(closed.to_string().contains("workspace_open"));

        let sig = upload_ink(&mut f.ws, "Ada");
        open_pdf(&mut f.ws, 1);
        f.ws.start_signing().unwrap();
        f.ws.select_signature(&sig.id).unwrap();
        f.ws.add_placement(Point::new(50.0, 50.0)).unwrap();
        let ui = render_workspace_screen(&f.ws.state).to_string();
        assert!(ui.contains("SigningSurface"));
        assert!(ui.contains("sign_save"));
        assert!(ui.contains("placement_resize"));
    }
}
