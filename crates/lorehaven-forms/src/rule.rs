//! Typed validation schema: a small rule tree over string, number and enum
//! values, evaluated by [`crate::validate`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Constraint, SchemaError};
use crate::field::{FieldDescriptor, FieldKind};
use crate::form::FormSchema;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

static ASCII_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("digit pattern compiles"));

/// Length of a one-time code.
pub const OTP_CODE_LEN: usize = 6;

#[derive(Debug, Clone)]
pub enum Rule {
    String(StringRule),
    Number(NumberRule),
    Enum(EnumRule),
}

impl From<StringRule> for Rule {
    fn from(rule: StringRule) -> Self {
        Self::String(rule)
    }
}

impl From<NumberRule> for Rule {
    fn from(rule: NumberRule) -> Self {
        Self::Number(rule)
    }
}

impl From<EnumRule> for Rule {
    fn from(rule: EnumRule) -> Self {
        Self::Enum(rule)
    }
}

impl Rule {
    /// Base rule implied by a descriptor's kind and required-ness.
    pub fn for_field(field: &FieldDescriptor) -> Self {
        let name = field.display_name();
        match field.kind {
            FieldKind::Text | FieldKind::Textarea => {
                presence(StringRule::new().trim(), field).into()
            }
            FieldKind::Password => presence(StringRule::new(), field).into(),
            FieldKind::Email => presence(email_rule(), field).into(),
            FieldKind::Otp => otp_code_rule().into(),
            FieldKind::Number => {
                let rule = NumberRule::new(format!("{name} must be a number"));
                if field.required {
                    rule.required(format!("{name} is required")).into()
                } else {
                    rule.into()
                }
            }
            FieldKind::Select => {
                let rule = EnumRule::new(field.options.iter().cloned());
                if field.required {
                    rule.required(format!("{name} is required")).into()
                } else {
                    rule.into()
                }
            }
        }
    }
}

fn presence(rule: StringRule, field: &FieldDescriptor) -> StringRule {
    if field.required {
        rule.required(format!("{} is required", field.display_name()))
    } else {
        rule.optional()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Lower,
    Upper,
}

#[derive(Debug, Clone)]
pub(crate) struct Check<T> {
    pub(crate) limit: T,
    pub(crate) message: String,
}

#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    pub(crate) regex: Regex,
    pub(crate) constraint: Constraint,
    pub(crate) message: String,
}

/// String refinements. Applied in a fixed order regardless of builder order:
/// trim, case, required/length, pattern.
#[derive(Debug, Clone, Default)]
pub struct StringRule {
    pub(crate) trim: bool,
    pub(crate) text_only: bool,
    pub(crate) case: Option<Case>,
    pub(crate) optional: bool,
    pub(crate) required: Option<String>,
    pub(crate) exact_len: Option<Check<usize>>,
    pub(crate) min_len: Option<Check<usize>>,
    pub(crate) max_len: Option<Check<usize>>,
    pub(crate) patterns: Vec<Pattern>,
}

impl StringRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Numbers and booleans are a type error instead of being read as text.
    pub fn text_only(mut self) -> Self {
        self.text_only = true;
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.case = Some(Case::Lower);
        self
    }

    pub fn uppercase(mut self) -> Self {
        self.case = Some(Case::Upper);
        self
    }

    /// Empty input is accepted as-is and skips every later stage.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = None;
        self
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.optional = false;
        self.required = Some(message.into());
        self
    }

    pub fn exact_len(mut self, len: usize, message: impl Into<String>) -> Self {
        self.exact_len = Some(Check {
            limit: len,
            message: message.into(),
        });
        self
    }

    pub fn min_len(mut self, len: usize, message: impl Into<String>) -> Self {
        self.min_len = Some(Check {
            limit: len,
            message: message.into(),
        });
        self
    }

    pub fn max_len(mut self, len: usize, message: impl Into<String>) -> Self {
        self.max_len = Some(Check {
            limit: len,
            message: message.into(),
        });
        self
    }

    pub fn pattern(mut self, regex: Regex, message: impl Into<String>) -> Self {
        self.patterns.push(Pattern {
            regex,
            constraint: Constraint::Pattern,
            message: message.into(),
        });
        self
    }

    pub fn email(mut self, message: impl Into<String>) -> Self {
        self.patterns.push(Pattern {
            regex: EMAIL_SHAPE.clone(),
            constraint: Constraint::Email,
            message: message.into(),
        });
        self
    }
}

/// Trimmed, lower-cased, non-empty, email-shaped.
pub fn email_rule() -> StringRule {
    StringRule::new()
        .trim()
        .lowercase()
        .required("Email is required")
        .email("Enter a valid email address")
}

/// Exactly six ASCII digits, taken verbatim: no trimming, no numeric input.
/// Length and charset fail with distinct messages.
pub fn otp_code_rule() -> StringRule {
    StringRule::new()
        .text_only()
        .exact_len(OTP_CODE_LEN, "Code must be exactly 6 characters")
        .pattern(ASCII_DIGITS.clone(), "Code must contain only digits")
}

#[derive(Debug, Clone)]
pub struct NumberRule {
    pub(crate) integer: bool,
    pub(crate) required: Option<String>,
    pub(crate) type_message: String,
    pub(crate) min: Option<Check<f64>>,
    pub(crate) max: Option<Check<f64>>,
}

impl NumberRule {
    /// Optional by default; `type_message` is reported for non-numeric input.
    pub fn new(type_message: impl Into<String>) -> Self {
        Self {
            integer: false,
            required: None,
            type_message: type_message.into(),
            min: None,
            max: None,
        }
    }

    pub fn integer(mut self) -> Self {
        self.integer = true;
        self
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    pub fn min(mut self, min: f64, message: impl Into<String>) -> Self {
        self.min = Some(Check {
            limit: min,
            message: message.into(),
        });
        self
    }

    pub fn max(mut self, max: f64, message: impl Into<String>) -> Self {
        self.max = Some(Check {
            limit: max,
            message: message.into(),
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct EnumRule {
    pub(crate) allowed: Vec<String>,
    pub(crate) required: Option<String>,
}

impl EnumRule {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            required: None,
        }
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }
}

/// Ordered `(field, rule)` pairs describing one submission.
#[derive(Debug, Clone, Default)]
pub struct TypedSchema {
    fields: Vec<(String, Rule)>,
}

impl TypedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive base rules for every field of a form.
    pub fn for_form(form: &FormSchema) -> Self {
        Self {
            fields: form
                .fields()
                .iter()
                .map(|f| (f.name.clone(), Rule::for_field(f)))
                .collect(),
        }
    }

    pub fn field(mut self, name: &str, rule: impl Into<Rule>) -> Result<Self, SchemaError> {
        if self.rule(name).is_some() {
            return Err(SchemaError::DuplicateRule(name.to_owned()));
        }
        self.fields.push((name.to_owned(), rule.into()));
        Ok(self)
    }

    /// Replace the rule of an existing field, keeping its position.
    pub fn with(mut self, name: &str, rule: impl Into<Rule>) -> Result<Self, SchemaError> {
        let slot = self
            .fields
            .iter_mut()
            .find(|(field, _)| field == name)
            .ok_or_else(|| SchemaError::UnknownField(name.to_owned()))?;
        slot.1 = rule.into();
        Ok(self)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, rule)| rule)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.fields.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
