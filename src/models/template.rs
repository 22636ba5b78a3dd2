//! User-authored canvas templates.
//!
//! Templates are stored wholesale as JSON under `templates/{id}.json`;
//! saving an existing id overwrites the document. Keys the server does not
//! model are carried through unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Image,
    Signature,
}

/// Canvas coordinates. Numbers are kept as sent, so `10` does not come
/// back as `10.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: Number,
    pub y: Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: Number,
    pub height: Number,
}

/// One element on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub kind: ElementKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    pub position: Position,

    pub size: Size,

    /// Free-form style properties (font, color, alignment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Map<String, Value>>,

    /// Certificate field this element is bound to, e.g. `name` or `course`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_field: Option<String>,

    /// Editor properties the server does not interpret (`rotation`,
    /// `zIndex`, ...), stored and returned untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A saved canvas template.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Workshop",
///   "orientation": "landscape",
///   "size": "A4",
///   "backgroundColor": "#ffffff",
///   "elements": [
///     { "type": "text", "content": "{name}", "position": {"x": 10, "y": 20},
///       "size": {"width": 200, "height": 40}, "dynamicField": "name" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    pub orientation: Orientation,

    pub size: String,

    pub background_color: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<TemplateElement>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Top-level keys without a typed field, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTemplateResponse {
    pub success: bool,
    pub template_id: String,
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<Template>,
}

#[derive(Debug, Serialize)]
pub struct DeleteTemplateResponse {
    pub success: bool,
}
