//! Field descriptors: one form input's shape and layout hints.

use serde::{Deserialize, Serialize};

/// Grid width of a form row.
pub const GRID_COLUMNS: u8 = 12;

/// Input kind. Decides how the renderer draws the field and which base rule
/// the field gets in [`TypedSchema::for_form`](crate::TypedSchema::for_form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Password,
    Number,
    Select,
    Otp,
}

/// One form input. Serialized as `{name, type, required, label, placeholder,
/// cols, row, rows}` for the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub placeholder: String,
    /// Column span on a 12-column grid.
    #[serde(default = "full_width")]
    pub cols: u8,
    /// Grid row the field starts on; `None` lets the renderer flow it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u16>,
    /// Visible text lines (textarea only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u16>,
    /// Choices (select only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

fn full_width() -> u8 {
    GRID_COLUMNS
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            label: String::new(),
            placeholder: String::new(),
            cols: GRID_COLUMNS,
            row: None,
            rows: None,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn cols(mut self, cols: u8) -> Self {
        self.cols = cols;
        self
    }

    pub fn row(mut self, row: u16) -> Self {
        self.row = Some(row);
        self
    }

    pub fn rows(mut self, rows: u16) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Human name for messages: the label when set, the field name otherwise.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}
