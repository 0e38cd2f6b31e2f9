use crate::config::SigningConfig;
use crate::error::{Result, SignError};
use crate::features::render::{RenderJob, RenderOutcome};
use crate::features::storage::parse_file_uri_path;
use crate::features::store::SignatureUpload;
use crate::features::transform::Point;
use crate::features::workspace::{render_workspace_screen, Workspace};
use crate::i18n::apply_locale;
use crate::state::WorkspaceState;
use base64::Engine;
use jni::objects::{JClass, JString};
use jni::sys::jstring;
use jni::JNIEnv;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    fs::File,
    io::Read,
    os::unix::io::{FromRawFd, RawFd},
    path::Path,
    ptr,
    sync::{mpsc, Mutex, MutexGuard, OnceLock},
    thread,
};

struct GlobalState {
    workspace: OnceLock<Mutex<Workspace>>,
    worker: OnceLock<WorkerRuntime>,
    notifications: Mutex<Vec<RenderOutcome>>,
}

impl GlobalState {
    const fn new() -> Self {
        Self {
            workspace: OnceLock::new(),
            worker: OnceLock::new(),
            notifications: Mutex::new(Vec::new()),
        }
    }

    /// Builds the workspace from the environment on first use.
    fn workspace_lock(&self) -> Result<MutexGuard<'_, Workspace>> {
        if self.workspace.get().is_none() {
            let workspace = Workspace::from_config(SigningConfig::load()?)?;
            let _ = self.workspace.set(Mutex::new(workspace));
        }
        let cell = self.workspace.get().ok_or(SignError::NoDocument)?;
        Ok(cell.lock().unwrap_or_else(|poisoned| {
            warn!("workspace mutex was poisoned; continuing with last state");
            poisoned.into_inner()
        }))
    }

    #[cfg_attr(test, allow(dead_code))]
    fn worker(&self) -> &WorkerRuntime {
        self.worker.get_or_init(WorkerRuntime::new)
    }

    #[cfg_attr(test, allow(dead_code))]
    fn push_worker_result(&self, result: RenderOutcome) {
        if let Ok(mut guard) = self.notifications.lock() {
            guard.push(result);
        }
    }

    fn drain_worker_results(&self) -> Vec<RenderOutcome> {
        self.notifications
            .lock()
            .map(|mut q| q.drain(..).collect())
            .unwrap_or_default()
    }
}

static STATE: GlobalState = GlobalState::new();

#[cfg_attr(test, allow(dead_code))]
struct WorkerRuntime {
    sender: Option<mpsc::Sender<RenderJob>>,
}

#[cfg_attr(test, allow(dead_code))]
impl WorkerRuntime {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel::<RenderJob>();
        let spawned = thread::Builder::new()
            .name("signdesk-worker".into())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    STATE.push_worker_result(job.run());
                }
            });
        match spawned {
            Ok(_) => Self { sender: Some(tx) },
            Err(e) => {
                warn!("render worker unavailable, rendering inline: {e}");
                Self { sender: None }
            }
        }
    }

    fn enqueue(&self, job: RenderJob) {
        match &self.sender {
            Some(sender) => {
                if let Err(mpsc::SendError(job)) = sender.send(job) {
                    STATE.push_worker_result(job.run());
                }
            }
            None => STATE.push_worker_result(job.run()),
        }
    }
}

#[cfg(not(test))]
fn schedule_render(_workspace: &mut Workspace, job: RenderJob) {
    STATE.worker().enqueue(job);
}

// Tests render inline so results land on the workspace under test.
#[cfg(test)]
fn schedule_render(workspace: &mut Workspace, job: RenderJob) {
    workspace.finish_render(job.run());
}

fn apply_worker_results(workspace: &mut Workspace) {
    for outcome in STATE.drain_worker_results() {
        workspace.finish_render(outcome);
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Command {
    action: String,
    path: Option<String>,
    fd: Option<i32>,
    error: Option<String>,
    bindings: Option<HashMap<String, String>>,
    snapshot: Option<String>,
    /// Base64 payload for uploads that do not come from a file.
    data: Option<String>,
}

#[derive(Debug)]
enum Source {
    Fd(RawFd),
    Path(String),
    Inline(Vec<u8>),
}

#[derive(Debug)]
enum Action {
    Init { locale: Option<String> },
    Refresh,
    Reset,
    Snapshot,
    Restore { snapshot: String },
    WorkspaceOpenStored { document_id: String },
    WorkspaceOpen { source: Source, file_name: String },
    WorkspaceClose,
    SignStart,
    SignCancel,
    SignatureSelect { id: String },
    SignatureUpload { source: Source, meta: SignatureUpload },
    SignatureUpdate { id: String, name: String, title: Option<String> },
    SignatureDelete { id: String },
    SignatureSetDefault { id: String },
    ZoomSet { zoom: f64 },
    PageSelect { page: u32 },
    PointerDown { client: Point, origin: Option<Point>, target: Option<String> },
    PointerMove { client: Point, origin: Option<Point> },
    PointerUp { client: Point, origin: Option<Point> },
    PlacementAdd { at: PlacementTarget },
    PlacementRemove { id: String },
    PlacementResize { id: String, size: f64 },
    SignSave,
    SignDownload,
}

#[derive(Debug)]
enum PlacementTarget {
    Percent(Point),
    Client(Point),
}

fn required<'a>(bindings: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    bindings
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SignError::InvalidInput(format!("missing_binding:{key}")))
}

fn optional(bindings: &HashMap<String, String>, key: &str) -> Option<String> {
    bindings
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u32_binding(bindings: &HashMap<String, String>, key: &str) -> Result<u32> {
    required(bindings, key)?
        .parse::<u32>()
        .map_err(|_| SignError::InvalidInput(format!("invalid_binding:{key}")))
}

fn parse_f64_binding(bindings: &HashMap<String, String>, key: &str) -> Result<f64> {
    required(bindings, key)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SignError::InvalidInput(format!("invalid_binding:{key}")))
}

fn parse_point(bindings: &HashMap<String, String>, x: &str, y: &str) -> Result<Point> {
    Ok(Point::new(
        parse_f64_binding(bindings, x)?,
        parse_f64_binding(bindings, y)?,
    ))
}

fn parse_origin(bindings: &HashMap<String, String>) -> Option<Point> {
    parse_point(bindings, "surface_left", "surface_top").ok()
}

fn parse_source(path: Option<String>, fd: Option<i32>, data: Option<String>) -> Result<Source> {
    if let Some(fd) = fd {
        return Ok(Source::Fd(fd as RawFd));
    }
    if let Some(path) = path {
        return Ok(Source::Path(path));
    }
    if let Some(data) = data {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| SignError::InvalidInput(format!("base64:{e}")))?;
        return Ok(Source::Inline(bytes));
    }
    Err(SignError::InvalidInput("missing_source".into()))
}

fn parse_action(command: Command) -> Result<Action> {
    let Command {
        action,
        path,
        fd,
        error,
        bindings,
        snapshot,
        data,
    } = command;

    if let Some(err) = error {
        return Err(SignError::InvalidInput(err));
    }
    let bindings = bindings.unwrap_or_default();

    match action.as_str() {
        "init" => Ok(Action::Init {
            locale: optional(&bindings, "locale"),
        }),
        "refresh" => Ok(Action::Refresh),
        "reset" => Ok(Action::Reset),
        "snapshot" => Ok(Action::Snapshot),
        "restore" => snapshot
            .map(|snapshot| Action::Restore { snapshot })
            .ok_or_else(|| SignError::InvalidInput("missing_snapshot".into())),
        "workspace_open" => {
            if let Some(document_id) = optional(&bindings, "document_id") {
                return Ok(Action::WorkspaceOpenStored { document_id });
            }
            let file_name = optional(&bindings, "file_name")
                .or_else(|| {
                    path.as_deref()
                        .and_then(parse_file_uri_path)
                        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                })
                .unwrap_or_else(|| "document".into());
            Ok(Action::WorkspaceOpen {
                source: parse_source(path, fd, data)?,
                file_name,
            })
        }
        "workspace_close" => Ok(Action::WorkspaceClose),
        "sign_start" => Ok(Action::SignStart),
        "sign_cancel" => Ok(Action::SignCancel),
        "signature_select" => Ok(Action::SignatureSelect {
            id: required(&bindings, "signature_id")?.to_string(),
        }),
        "signature_upload" => Ok(Action::SignatureUpload {
            meta: SignatureUpload {
                name: required(&bindings, "name")?.to_string(),
                title: optional(&bindings, "title"),
                created_by: optional(&bindings, "created_by").unwrap_or_else(|| "local".into()),
            },
            source: parse_source(path, fd, data)?,
        }),
        "signature_update" => Ok(Action::SignatureUpdate {
            id: required(&bindings, "signature_id")?.to_string(),
            name: required(&bindings, "name")?.to_string(),
            title: optional(&bindings, "title"),
        }),
        "signature_delete" => Ok(Action::SignatureDelete {
            id: required(&bindings, "signature_id")?.to_string(),
        }),
        "signature_set_default" => Ok(Action::SignatureSetDefault {
            id: required(&bindings, "signature_id")?.to_string(),
        }),
        "zoom_set" => Ok(Action::ZoomSet {
            zoom: parse_f64_binding(&bindings, "zoom")?,
        }),
        "page_select" => Ok(Action::PageSelect {
            page: parse_u32_binding(&bindings, "page")?,
        }),
        "pointer_down" => Ok(Action::PointerDown {
            client: parse_point(&bindings, "x", "y")?,
            origin: parse_origin(&bindings),
            target: optional(&bindings, "placement_id"),
        }),
        "pointer_move" => Ok(Action::PointerMove {
            client: parse_point(&bindings, "x", "y")?,
            origin: parse_origin(&bindings),
        }),
        "pointer_up" => Ok(Action::PointerUp {
            client: parse_point(&bindings, "x", "y")?,
            origin: parse_origin(&bindings),
        }),
        "placement_add" => {
            let at = match parse_point(&bindings, "x_percent", "y_percent") {
                Ok(percent) => PlacementTarget::Percent(percent),
                Err(_) => PlacementTarget::Client(parse_point(&bindings, "x", "y")?),
            };
            Ok(Action::PlacementAdd { at })
        }
        "placement_remove" => Ok(Action::PlacementRemove {
            id: required(&bindings, "placement_id")?.to_string(),
        }),
        "placement_resize" => Ok(Action::PlacementResize {
            id: required(&bindings, "placement_id")?.to_string(),
            size: parse_f64_binding(&bindings, "size")?,
        }),
        "sign_save" => Ok(Action::SignSave),
        "sign_download" => Ok(Action::SignDownload),
        other => Err(SignError::InvalidInput(format!("unknown_action:{other}"))),
    }
}

fn read_source(source: Source) -> Result<(Vec<u8>, Option<String>)> {
    match source {
        Source::Fd(fd) => {
            // The host hands over ownership of the descriptor.
            let mut file = unsafe { File::from_raw_fd(fd) };
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            Ok((bytes, None))
        }
        Source::Path(path) => {
            let local = parse_file_uri_path(&path)
                .ok_or_else(|| SignError::InvalidInput(format!("unsupported_uri:{path}")))?;
            Ok((std::fs::read(local)?, Some(path)))
        }
        Source::Inline(bytes) => Ok((bytes, None)),
    }
}

fn with_origin(workspace: &mut Workspace, origin: Option<Point>) {
    if let Some(origin) = origin {
        workspace.set_surface_origin(origin.x, origin.y);
    }
}

/// Runs one action against the workspace. `Ok(Some(_))` short-circuits the
/// usual screen render.
fn run_action(workspace: &mut Workspace, action: Action) -> Result<Option<Value>> {
    match action {
        Action::Init { locale } => {
            if let Some(locale) = locale {
                let applied = apply_locale(&locale);
                debug!("locale set to {applied}");
            }
        }
        Action::Refresh => {}
        Action::Reset => workspace.close(),
        Action::Snapshot => {
            let snap = serde_json::to_string(&workspace.state)?;
            return Ok(Some(json!({
                "type": "Snapshot",
                "snapshot": snap
            })));
        }
        Action::Restore { snapshot } => {
            let restored: WorkspaceState = serde_json::from_str(&snapshot)?;
            if let Some(job) = workspace.restore(restored)? {
                schedule_render(workspace, job);
            }
        }
        Action::WorkspaceOpenStored { document_id } => {
            let job = workspace.open_document(&document_id, None)?;
            schedule_render(workspace, job);
        }
        Action::WorkspaceOpen { source, file_name } => {
            let (bytes, uri) = read_source(source)?;
            let file_name = Path::new(&file_name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(file_name);
            let job = workspace.import_document(&bytes, &file_name, uri)?;
            schedule_render(workspace, job);
        }
        Action::WorkspaceClose => workspace.close(),
        Action::SignStart => workspace.start_signing()?,
        Action::SignCancel => workspace.cancel_signing()?,
        Action::SignatureSelect { id } => workspace.select_signature(&id)?,
        Action::SignatureUpload { source, meta } => {
            let (bytes, _) = read_source(source)?;
            workspace.upload_signature(&bytes, meta)?;
        }
        Action::SignatureUpdate { id, name, title } => {
            workspace.update_signature(&id, &name, title.as_deref())?;
        }
        Action::SignatureDelete { id } => workspace.delete_signature(&id)?,
        Action::SignatureSetDefault { id } => workspace.set_default_signature(&id)?,
        Action::ZoomSet { zoom } => workspace.set_zoom(zoom)?,
        Action::PageSelect { page } => {
            let job = workspace.select_page(page)?;
            schedule_render(workspace, job);
        }
        Action::PointerDown {
            client,
            origin,
            target,
        } => {
            with_origin(workspace, origin);
            workspace.pointer_down(client, target)?;
        }
        Action::PointerMove { client, origin } => {
            with_origin(workspace, origin);
            workspace.pointer_move(client)?;
        }
        Action::PointerUp { client, origin } => {
            with_origin(workspace, origin);
            workspace.pointer_up(client)?;
        }
        Action::PlacementAdd { at } => {
            match at {
                PlacementTarget::Percent(p) => workspace.add_placement(p)?,
                PlacementTarget::Client(c) => workspace.add_placement_at(c)?,
            };
        }
        Action::PlacementRemove { id } => workspace.remove_placement(&id)?,
        Action::PlacementResize { id, size } => workspace.resize_placement(&id, size)?,
        Action::SignSave => {
            workspace.save()?;
            let job = workspace.begin_render()?;
            schedule_render(workspace, job);
        }
        Action::SignDownload => {
            workspace.download()?;
        }
    }
    Ok(None)
}

/// Parses, applies and renders one command. Failures are recorded on the
/// state and shown on the returned screen.
fn apply_command(workspace: &mut Workspace, command: Command) -> Value {
    apply_worker_results(workspace);
    let label = command.action.clone();
    let result = parse_action(command).and_then(|action| run_action(workspace, action));
    match result {
        Ok(Some(value)) => value,
        Ok(None) => {
            workspace.state.last_error = None;
            render_ui(&workspace.state)
        }
        Err(err) => {
            debug!("{label} failed: {err}");
            workspace.record_error(&err);
            render_ui(&workspace.state)
        }
    }
}

fn handle_command(command: Command) -> Result<Value> {
    let mut workspace = STATE.workspace_lock()?;
    Ok(apply_command(&mut workspace, command))
}

/// In-process entry point for shells that do not go through JNI.
pub fn dispatch_json(input: &str) -> String {
    let command: Command = serde_json::from_str(input).unwrap_or_else(|_| Command {
        action: "error".into(),
        error: Some("invalid_json".into()),
        ..Command::default()
    });
    let response =
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handle_command(command)));
    let value = match response {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => error_ui(&err.to_string()),
        Err(_) => error_ui("panic"),
    };
    value.to_string()
}

#[no_mangle]
pub extern "system" fn Java_aeska_signdesk_SigningBridge_dispatch(
    mut env: JNIEnv,
    _class: JClass,
    input: JString,
) -> jstring {
    crate::init_logging();
    let input_str: String = env
        .get_string(&input)
        .map(|s| s.into())
        .unwrap_or_else(|_| "{}".to_string());

    let output_string = dispatch_json(&input_str);
    match env.new_string(output_string) {
        Ok(java_str) => java_str.into_raw(),
        Err(_) => {
            let fallback = error_ui("jni_new_string_failed").to_string();
            env.new_string(fallback)
                .map(|s| s.into_raw())
                .unwrap_or(ptr::null_mut())
        }
    }
}

fn error_ui(message: &str) -> Value {
    json!({
        "type": "Column",
        "padding": 24,
        "children": [
            { "type": "Text", "text": "Error", "size": 18.0 },
            { "type": "Text", "text": message }
        ]
    })
}

fn render_ui(state: &WorkspaceState) -> Value {
    render_workspace_screen(state)
}
