use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Serializes a builder into a UI node.
pub fn node<T: Serialize>(element: T) -> Value {
    serde_json::to_value(element).unwrap_or(Value::Null)
}

#[derive(Serialize)]
pub struct Text<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_description: Option<&'a str>,
}

impl<'a> Text<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            kind: "Text",
            text,
            size: None,
            content_description: None,
        }
    }

    pub fn size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn content_description(mut self, cd: &'a str) -> Self {
        self.content_description = Some(cd);
        self
    }
}

/// Tapping sends `action` back with `bindings` merged into the command.
#[derive(Serialize)]
pub struct Button<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
    pub action: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<&'static str, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_file_picker: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_description: Option<&'a str>,
}

impl<'a> Button<'a> {
    pub fn new(text: &'a str, action: &'a str) -> Self {
        Self {
            kind: "Button",
            text,
            action,
            bindings: BTreeMap::new(),
            requires_file_picker: None,
            enabled: None,
            content_description: None,
        }
    }

    pub fn bind(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.bindings.insert(key, value.into());
        self
    }

    pub fn requires_file_picker(mut self, needs: bool) -> Self {
        self.requires_file_picker = Some(needs);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn content_description(mut self, cd: &'a str) -> Self {
        self.content_description = Some(cd);
        self
    }
}

#[derive(Serialize)]
pub struct Column<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,
    pub children: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_description: Option<&'a str>,
}

impl<'a> Column<'a> {
    pub fn new(children: Vec<Value>) -> Self {
        Self {
            kind: "Column",
            padding: None,
            children,
            content_description: None,
        }
    }

    pub fn padding(mut self, padding: u32) -> Self {
        self.padding = Some(padding);
        self
    }

    pub fn content_description(mut self, cd: &'a str) -> Self {
        self.content_description = Some(cd);
        self
    }
}

#[derive(Serialize)]
pub struct Row {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub children: Vec<Value>,
}

impl Row {
    pub fn new(children: Vec<Value>) -> Self {
        Self {
            kind: "Row",
            children,
        }
    }
}

#[derive(Serialize)]
pub struct Progress<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_description: Option<&'a str>,
}

impl<'a> Progress<'a> {
    pub fn new() -> Self {
        Self {
            kind: "Progress",
            text: None,
            content_description: None,
        }
    }

    pub fn text(mut self, text: &'a str) -> Self {
        self.text = Some(text);
        self
    }
}

#[derive(Serialize)]
pub struct Warning<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub code: &'a str,
    pub text: &'a str,
}

impl<'a> Warning<'a> {
    pub fn new(code: &'a str, text: &'a str) -> Self {
        Self {
            kind: "Warning",
            code,
            text,
        }
    }
}

/// One placed signature as the shell should draw it, in logical page pixels
/// before zoom. The image is centred on `center_x`/`center_y` and keeps its
/// aspect ratio at `width`.
#[derive(Debug, Serialize)]
pub struct PlacementBox<'a> {
    pub id: &'a str,
    pub signature_id: &'a str,
    pub image_url: Option<&'a str>,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub selected: bool,
}

/// The zoomable page the shell draws and reports pointer events against.
///
/// Pointer events go back as `pointer_down`/`pointer_move`/`pointer_up` with
/// the client position in `x`/`y` and the pressed placement, if any, in
/// `placement_id`.
#[derive(Serialize)]
pub struct SigningSurface<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitmap_path: Option<&'a str>,
    pub logical_width: f64,
    pub logical_height: f64,
    pub zoom_percent: f64,
    pub interactive: bool,
    pub placements: Vec<PlacementBox<'a>>,
}

impl<'a> SigningSurface<'a> {
    pub fn new(logical_width: f64, logical_height: f64, zoom_percent: f64) -> Self {
        Self {
            kind: "SigningSurface",
            bitmap_path: None,
            logical_width,
            logical_height,
            zoom_percent,
            interactive: false,
            placements: Vec::new(),
        }
    }

    pub fn bitmap_path(mut self, path: &'a str) -> Self {
        self.bitmap_path = Some(path);
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn placement(mut self, placement: PlacementBox<'a>) -> Self {
        self.placements.push(placement);
        self
    }
}
