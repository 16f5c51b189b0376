use serde::Serialize;

/// A schema that cannot be built. Always a programmer error, never user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("form `{form}` declares field `{field}` more than once")]
    DuplicateField { form: String, field: String },
    #[error("field `{field}` spans {cols} columns, expected 1..=12")]
    ColumnSpan { field: String, cols: u8 },
    #[error("typed schema declares `{0}` more than once")]
    DuplicateRule(String),
    #[error("typed schema has no field `{0}`")]
    UnknownField(String),
}

/// Which class of constraint a value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Required,
    Length,
    Pattern,
    Email,
    Type,
    Range,
    OneOf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub constraint: Constraint,
    pub message: String,
}

/// All field failures of one submission, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }

    /// Shorthand for a single failure, used by callers that validate one value.
    pub fn single(field: &str, constraint: Constraint, message: impl Into<String>) -> Self {
        Self(vec![FieldError {
            field: field.to_owned(),
            constraint,
            message: message.into(),
        }])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == field)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
