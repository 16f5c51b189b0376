//! The validation engine: `(TypedSchema, raw JSON) -> normalized value | field errors`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::error::{Constraint, FieldError, ValidationErrors};
use crate::rule::{Case, EnumRule, NumberRule, Rule, StringRule};

/// A submission that passed its schema. Holds only the schema's fields, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated(Map<String, Value>);

impl Validated {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(Value::as_f64)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Deserialize into a caller's struct. Fails only when the struct does not
    /// match the schema it was validated against.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.into_value())
    }
}

type Failure = (Constraint, String);

/// Validate `input` against `schema`.
///
/// Never panics and never errors on malformed input: a non-object `input` is
/// read as an object with every field missing. Each failing field contributes
/// exactly one [`FieldError`], from the first stage that rejected it.
pub fn validate(schema: &crate::TypedSchema, input: &Value) -> Result<Validated, ValidationErrors> {
    let object = input.as_object();
    let mut normalized = Map::new();
    let mut errors = Vec::new();

    for (name, rule) in schema.fields() {
        let raw = object.and_then(|o| o.get(name));
        let outcome = match rule {
            Rule::String(rule) => apply_string(rule, raw),
            Rule::Number(rule) => apply_number(rule, raw),
            Rule::Enum(rule) => apply_enum(rule, raw),
        };
        match outcome {
            Ok(value) => {
                normalized.insert(name.to_owned(), value);
            }
            Err((constraint, message)) => errors.push(FieldError {
                field: name.to_owned(),
                constraint,
                message,
            }),
        }
    }

    if errors.is_empty() {
        Ok(Validated(normalized))
    } else {
        Err(ValidationErrors::new(errors))
    }
}

/// Nullish becomes `""`; scalars become their text. `None` means the value
/// has no string reading at all (array or object).
fn preprocess(raw: Option<&Value>) -> Option<String> {
    match raw {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Array(_) | Value::Object(_)) => None,
    }
}

fn apply_string(rule: &StringRule, raw: Option<&Value>) -> Result<Value, Failure> {
    let type_error = || (Constraint::Type, "Expected text".to_owned());
    if rule.text_only && matches!(raw, Some(Value::Number(_) | Value::Bool(_))) {
        return Err(type_error());
    }
    let mut text = preprocess(raw).ok_or_else(type_error)?;

    if rule.trim {
        text = text.trim().to_owned();
    }
    match rule.case {
        Some(Case::Lower) => text = text.to_lowercase(),
        Some(Case::Upper) => text = text.to_uppercase(),
        None => {}
    }
    if rule.optional && text.is_empty() {
        return Ok(Value::String(text));
    }

    let len = text.chars().count();
    if let Some(message) = &rule.required {
        if text.is_empty() {
            return Err((Constraint::Required, message.clone()));
        }
    }
    if let Some(check) = &rule.exact_len {
        if len != check.limit {
            return Err((Constraint::Length, check.message.clone()));
        }
    }
    if let Some(check) = &rule.min_len {
        if len < check.limit {
            return Err((Constraint::Length, check.message.clone()));
        }
    }
    if let Some(check) = &rule.max_len {
        if len > check.limit {
            return Err((Constraint::Length, check.message.clone()));
        }
    }

    if let Some(pattern) = rule.patterns.iter().find(|p| !p.regex.is_match(&text)) {
        return Err((pattern.constraint, pattern.message.clone()));
    }

    Ok(Value::String(text))
}

fn apply_number(rule: &NumberRule, raw: Option<&Value>) -> Result<Value, Failure> {
    let type_error = || (Constraint::Type, rule.type_message.clone());

    let number = match raw {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(type_error)?,
        other => {
            let text = preprocess(other).ok_or_else(type_error)?;
            let text = text.trim();
            if text.is_empty() {
                return match &rule.required {
                    Some(message) => Err((Constraint::Required, message.clone())),
                    None => Ok(Value::Null),
                };
            }
            text.parse::<f64>().map_err(|_| type_error())?
        }
    };

    if !number.is_finite() {
        return Err(type_error());
    }
    if rule.integer && number.fract() != 0.0 {
        return Err(type_error());
    }
    if let Some(check) = &rule.min {
        if number < check.limit {
            return Err((Constraint::Range, check.message.clone()));
        }
    }
    if let Some(check) = &rule.max {
        if number > check.limit {
            return Err((Constraint::Range, check.message.clone()));
        }
    }

    if rule.integer {
        // Range checks above keep integral values well inside i64 for sane schemas.
        Ok(Value::Number(Number::from(number as i64)))
    } else {
        Number::from_f64(number).map(Value::Number).ok_or_else(type_error)
    }
}

fn apply_enum(rule: &EnumRule, raw: Option<&Value>) -> Result<Value, Failure> {
    let one_of = || {
        (
            Constraint::OneOf,
            format!("Must be one of: {}", rule.allowed.join(", ")),
        )
    };
    let text = preprocess(raw).ok_or_else(one_of)?;
    let text = text.trim();
    if text.is_empty() {
        return match &rule.required {
            Some(message) => Err((Constraint::Required, message.clone())),
            None => Ok(Value::String(String::new())),
        };
    }
    if rule.allowed.iter().any(|allowed| allowed == text) {
        Ok(Value::String(text.to_owned()))
    } else {
        Err(one_of())
    }
}
