//! Form schemas: the ordered field list one screen renders.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::field::{FieldDescriptor, GRID_COLUMNS};

/// Ordered sequence of field descriptors. Field names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFormSchema")]
pub struct FormSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

#[derive(Deserialize)]
struct RawFormSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl TryFrom<RawFormSchema> for FormSchema {
    type Error = SchemaError;

    fn try_from(raw: RawFormSchema) -> Result<Self, Self::Error> {
        Self::new(raw.name, raw.fields)
    }
}

impl FormSchema {
    pub fn new(
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    form: name,
                    field: field.name.clone(),
                });
            }
            if !(1..=GRID_COLUMNS).contains(&field.cols) {
                return Err(SchemaError::ColumnSpan {
                    field: field.name.clone(),
                    cols: field.cols,
                });
            }
        }
        Ok(Self { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
