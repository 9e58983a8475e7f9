//! Per-row field validation.
//!
//! Pure and stateless: duplicate detection needs cross-row state and lives
//! in the engine.

use super::row::ParsedRow;
use super::schema::{AllowedValues, ColumnMapping, FieldPattern, FieldSpec, TableSchema};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Which rule a field broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// Value missing or blank
    Required,
    /// Longer than the field allows
    TooLong,
    /// Does not match the field pattern
    InvalidFormat,
    /// Outside the field's allowed values
    NotAllowed,
}

/// One broken rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Canonical field name
    pub field: String,
    /// Rule that was broken
    pub kind: FieldErrorKind,
    /// Caller-facing description
    pub message: String,
}

/// Pre-compiled value patterns.
struct ValuePatterns {
    email: regex::Regex,
    phone: regex::Regex,
    url: regex::Regex,
    identifier: regex::Regex,
}

impl ValuePatterns {
    fn instance() -> &'static Self {
        static PATTERNS: OnceLock<ValuePatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::compile)
    }

    fn compile() -> Self {
        Self {
            email: regex::Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
                .expect("Invalid email pattern"),
            phone: regex::Regex::new(r"^\+?[0-9][0-9 ().\-]{5,18}[0-9]$")
                .expect("Invalid phone pattern"),
            url: regex::Regex::new(r"^https?://[^\s/?#]+\.[^\s/?#]+(:[0-9]+)?([/?#]\S*)?$|^https?://localhost(:[0-9]+)?([/?#]\S*)?$")
                .expect("Invalid URL pattern"),
            identifier: regex::Regex::new(r"^[A-Za-z][A-Za-z0-9._\-]*$")
                .expect("Invalid identifier pattern"),
        }
    }

    fn matches(&self, pattern: FieldPattern, value: &str) -> bool {
        match pattern {
            FieldPattern::Email => self.email.is_match(value),
            FieldPattern::Phone => self.phone.is_match(value),
            FieldPattern::Url => self.url.is_match(value),
            FieldPattern::Identifier => self.identifier.is_match(value),
        }
    }
}

fn describe(pattern: FieldPattern) -> &'static str {
    match pattern {
        FieldPattern::Email => "a valid email address",
        FieldPattern::Phone => "a valid phone number",
        FieldPattern::Url => "an http(s) URL",
        FieldPattern::Identifier => "letters, digits, '.', '_' or '-' starting with a letter",
    }
}

/// Validates mapped rows against a schema.
#[derive(Debug, Clone, Default)]
pub struct RowValidator {
    valid_roles: Vec<String>,
}

impl RowValidator {
    /// Validator accepting `valid_roles` in role fields.
    pub fn new<I, S>(valid_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid_roles: valid_roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Checks every schema field of `row` and returns at most one error per
    /// field. Empty or whitespace-only values count as missing.
    pub fn validate(
        &self,
        row: &ParsedRow,
        schema: &TableSchema,
        mapping: &ColumnMapping,
    ) -> Vec<FieldError> {
        schema
            .fields
            .iter()
            .filter_map(|field| {
                let value = mapping
                    .value(row, field.name)
                    .map(str::trim)
                    .filter(|v| !v.is_empty());
                self.check_field(field, value)
            })
            .collect()
    }

    fn check_field(&self, field: &FieldSpec, value: Option<&str>) -> Option<FieldError> {
        let error = |kind, message: String| {
            Some(FieldError {
                field: field.name.to_string(),
                kind,
                message,
            })
        };

        let Some(value) = value else {
            return if field.required {
                error(FieldErrorKind::Required, format!("{} is required", field.name))
            } else {
                None
            };
        };

        if let Some(max) = field.max_length
            && value.chars().count() > max
        {
            return error(
                FieldErrorKind::TooLong,
                format!("{} must be at most {max} characters", field.name),
            );
        }

        if let Some(pattern) = field.pattern
            && !ValuePatterns::instance().matches(pattern, value)
        {
            return error(
                FieldErrorKind::InvalidFormat,
                format!("{} must be {}", field.name, describe(pattern)),
            );
        }

        match field.allowed {
            Some(AllowedValues::Roles)
                if !self.valid_roles.iter().any(|r| r.eq_ignore_ascii_case(value)) =>
            {
                error(
                    FieldErrorKind::NotAllowed,
                    format!(
                        "{} '{value}' is not a valid role (expected one of: {})",
                        field.name,
                        self.valid_roles.join(", ")
                    ),
                )
            }
            Some(AllowedValues::Fixed(allowed))
                if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) =>
            {
                error(
                    FieldErrorKind::NotAllowed,
                    format!(
                        "{} '{value}' is not allowed (expected one of: {})",
                        field.name,
                        allowed.join(", ")
                    ),
                )
            }
            _ => None,
        }
    }
}
