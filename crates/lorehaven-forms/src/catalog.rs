//! Built-in forms: every screen's field list paired with its submit-time schema.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{SchemaError, ValidationErrors};
use crate::field::{FieldDescriptor, FieldKind};
use crate::form::FormSchema;
use crate::rule::{NumberRule, StringRule, TypedSchema, email_rule, otp_code_rule};
use crate::validate::{Validated, validate};

pub const LOGIN: &str = "login";
pub const SIGN_UP: &str = "sign_up";
pub const FORGOT_PASSWORD: &str = "forgot_password";
pub const OTP: &str = "otp";
pub const VERIFICATION_TOKEN: &str = "verification_token";
pub const CHARACTER: &str = "character";
pub const PERSONA: &str = "persona";
pub const LOREBOOK: &str = "lorebook";

/// Characters in an email verification token (32 bytes, base64url, no padding).
pub const VERIFICATION_TOKEN_LEN: usize = 43;

const NAME_MAX: usize = 64;
const TEXT_MAX: usize = 4000;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;

/// A form and the schema its submissions are checked against.
#[derive(Debug, Clone)]
pub struct FormDefinition {
    pub form: FormSchema,
    pub schema: TypedSchema,
}

impl FormDefinition {
    fn derived(form: FormSchema) -> Self {
        let schema = TypedSchema::for_form(&form);
        Self { form, schema }
    }

    pub fn name(&self) -> &str {
        self.form.name()
    }

    pub fn validate(&self, input: &Value) -> Result<Validated, ValidationErrors> {
        validate(&self.schema, input)
    }
}

static CATALOG: LazyLock<Vec<FormDefinition>> =
    LazyLock::new(|| build().expect("built-in form catalog is well-formed"));

pub fn get(name: &str) -> Option<&'static FormDefinition> {
    CATALOG.iter().find(|def| def.name() == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(FormDefinition::name)
}

fn build() -> Result<Vec<FormDefinition>, SchemaError> {
    Ok(vec![
        login()?,
        sign_up()?,
        forgot_password()?,
        otp()?,
        verification_token()?,
        character()?,
        persona()?,
        lorebook()?,
    ])
}

fn email_field() -> FieldDescriptor {
    FieldDescriptor::new("email", FieldKind::Email)
        .required()
        .label("Email")
        .placeholder("you@example.com")
}

fn name_rule(label: &str) -> StringRule {
    StringRule::new()
        .trim()
        .required(format!("{label} is required"))
        .max_len(NAME_MAX, format!("{label} must be at most {NAME_MAX} characters"))
}

fn long_text_rule(label: &str, required: bool) -> StringRule {
    let rule = StringRule::new().trim().max_len(
        TEXT_MAX,
        format!("{label} must be at most {TEXT_MAX} characters"),
    );
    if required {
        rule.required(format!("{label} is required"))
    } else {
        rule.optional()
    }
}

fn login() -> Result<FormDefinition, SchemaError> {
    let form = FormSchema::new(
        LOGIN,
        vec![
            email_field(),
            FieldDescriptor::new("password", FieldKind::Password)
                .required()
                .label("Password"),
        ],
    )?;
    Ok(FormDefinition::derived(form))
}

fn sign_up() -> Result<FormDefinition, SchemaError> {
    let form = FormSchema::new(
        SIGN_UP,
        vec![
            FieldDescriptor::new("name", FieldKind::Text)
                .required()
                .label("Display name")
                .placeholder("Ada"),
            email_field(),
            FieldDescriptor::new("password", FieldKind::Password)
                .required()
                .label("Password"),
        ],
    )?;
    let schema = TypedSchema::for_form(&form)
        .with("name", name_rule("Display name"))?
        .with(
            "password",
            StringRule::new()
                .required("Password is required")
                .min_len(
                    PASSWORD_MIN,
                    format!("Password must be at least {PASSWORD_MIN} characters"),
                )
                .max_len(
                    PASSWORD_MAX,
                    format!("Password must be at most {PASSWORD_MAX} characters"),
                ),
        )?;
    Ok(FormDefinition { form, schema })
}

fn forgot_password() -> Result<FormDefinition, SchemaError> {
    let form = FormSchema::new(FORGOT_PASSWORD, vec![email_field()])?;
    let schema = TypedSchema::for_form(&form).with("email", email_rule())?;
    Ok(FormDefinition { form, schema })
}

fn otp() -> Result<FormDefinition, SchemaError> {
    let form = FormSchema::new(
        OTP,
        vec![
            FieldDescriptor::new("code", FieldKind::Otp)
                .required()
                .label("Verification code")
                .placeholder("123456"),
        ],
    )?;
    let schema = TypedSchema::for_form(&form).with("code", otp_code_rule())?;
    Ok(FormDefinition { form, schema })
}

fn verification_token() -> Result<FormDefinition, SchemaError> {
    let url_safe = Regex::new(r"^[A-Za-z0-9_-]+$").expect("token pattern compiles");
    let form = FormSchema::new(
        VERIFICATION_TOKEN,
        vec![FieldDescriptor::new("token", FieldKind::Text).required()],
    )?;
    let schema = TypedSchema::for_form(&form).with(
        "token",
        StringRule::new()
            .trim()
            .required("Verification link is missing its token")
            .exact_len(VERIFICATION_TOKEN_LEN, "Verification link is malformed")
            .pattern(url_safe, "Verification link is malformed"),
    )?;
    Ok(FormDefinition { form, schema })
}

fn character() -> Result<FormDefinition, SchemaError> {
    let form = FormSchema::new(
        CHARACTER,
        vec![
            FieldDescriptor::new("name", FieldKind::Text)
                .required()
                .label("Name")
                .cols(6)
                .row(1),
            FieldDescriptor::new("visibility", FieldKind::Select)
                .required()
                .label("Visibility")
                .options(["public", "unlisted", "private"])
                .cols(6)
                .row(1),
            FieldDescriptor::new("description", FieldKind::Textarea)
                .required()
                .label("Description")
                .rows(4),
            FieldDescriptor::new("personality", FieldKind::Textarea)
                .label("Personality")
                .rows(3),
            FieldDescriptor::new("scenario", FieldKind::Textarea)
                .label("Scenario")
                .rows(3),
            FieldDescriptor::new("first_message", FieldKind::Textarea)
                .required()
                .label("First message")
                .placeholder("*waves* Hello there!")
                .rows(4),
        ],
    )?;
    let schema = TypedSchema::for_form(&form)
        .with("name", name_rule("Name"))?
        .with("description", long_text_rule("Description", true))?
        .with("personality", long_text_rule("Personality", false))?
        .with("scenario", long_text_rule("Scenario", false))?
        .with("first_message", long_text_rule("First message", true))?;
    Ok(FormDefinition { form, schema })
}

fn persona() -> Result<FormDefinition, SchemaError> {
    let form = FormSchema::new(
        PERSONA,
        vec![
            FieldDescriptor::new("name", FieldKind::Text)
                .required()
                .label("Name"),
            FieldDescriptor::new("description", FieldKind::Textarea)
                .label("Description")
                .placeholder("How characters should see you")
                .rows(4),
        ],
    )?;
    let schema = TypedSchema::for_form(&form)
        .with("name", name_rule("Name"))?
        .with("description", long_text_rule("Description", false))?;
    Ok(FormDefinition { form, schema })
}

fn lorebook() -> Result<FormDefinition, SchemaError> {
    let form = FormSchema::new(
        LOREBOOK,
        vec![
            FieldDescriptor::new("name", FieldKind::Text)
                .required()
                .label("Name"),
            FieldDescriptor::new("description", FieldKind::Textarea)
                .label("Description")
                .rows(3),
            FieldDescriptor::new("scan_depth", FieldKind::Number)
                .label("Scan depth")
                .placeholder("4")
                .cols(6)
                .row(3),
            FieldDescriptor::new("token_budget", FieldKind::Number)
                .label("Token budget")
                .placeholder("512")
                .cols(6)
                .row(3),
        ],
    )?;
    let schema = TypedSchema::for_form(&form)
        .with("name", name_rule("Name"))?
        .with("description", long_text_rule("Description", false))?
        .with(
            "scan_depth",
            NumberRule::new("Scan depth must be a whole number")
                .integer()
                .min(0.0, "Scan depth cannot be negative")
                .max(100.0, "Scan depth is at most 100"),
        )?
        .with(
            "token_budget",
            NumberRule::new("Token budget must be a whole number")
                .integer()
                .min(1.0, "Token budget must be positive")
                .max(8192.0, "Token budget is at most 8192"),
        )?;
    Ok(FormDefinition { form, schema })
}
