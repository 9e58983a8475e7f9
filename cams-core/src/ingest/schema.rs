//! Target schemas for bulk uploads.

use super::row::{ParsedRow, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of table a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    /// User accounts keyed by email
    Users,
    /// Role definitions keyed by name
    Roles,
    /// Registered applications keyed by name
    Applications,
    /// User to role assignments within an application
    UserRoles,
    /// No schema scored above the confidence threshold
    Unknown,
    /// Several schemas scored within the ambiguity margin
    Mixed,
}

impl TableType {
    /// Table types that have a schema.
    pub const KNOWN: [Self; 4] = [Self::Users, Self::Roles, Self::Applications, Self::UserRoles];

    /// Schema of a known table type.
    pub fn schema(self) -> Option<&'static TableSchema> {
        SCHEMAS.iter().find(|schema| schema.table_type == self)
    }

    /// Whether the type has a schema.
    pub fn is_known(self) -> bool {
        Self::KNOWN.contains(&self)
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Users => "users",
            Self::Roles => "roles",
            Self::Applications => "applications",
            Self::UserRoles => "user_roles",
            Self::Unknown => "unknown",
            Self::Mixed => "mixed",
        })
    }
}

impl std::str::FromStr for TableType {
    type Err = crate::error::CamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "users" | "user" => Ok(Self::Users),
            "roles" | "role" => Ok(Self::Roles),
            "applications" | "application" | "apps" => Ok(Self::Applications),
            "userroles" | "userrole" | "roleassignments" => Ok(Self::UserRoles),
            _ => Err(crate::error::CamsError::validation(format!(
                "Unknown table type '{s}'"
            ))),
        }
    }
}

/// Value format a field must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPattern {
    /// Mailbox address
    Email,
    /// Digits with optional `+`, spaces, dashes and parentheses
    Phone,
    /// `http` or `https` URL
    Url,
    /// Starts with a letter, then letters, digits, `_`, `-` or `.`
    Identifier,
}

/// Closed value sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedValues {
    /// Role names from `IngestionSettings::valid_roles`
    Roles,
    /// Literal values, compared case-insensitively
    Fixed(&'static [&'static str]),
}

/// One field of a target schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical field name
    pub name: &'static str,
    /// Whether a value must be present
    pub required: bool,
    /// Alternative column names, compared after normalization
    pub synonyms: &'static [&'static str],
    /// Maximum length in characters
    pub max_length: Option<usize>,
    /// Format the value must match
    pub pattern: Option<FieldPattern>,
    /// Closed set the value must belong to
    pub allowed: Option<AllowedValues>,
}

impl FieldSpec {
    const fn required(name: &'static str, max_length: usize) -> Self {
        Self {
            name,
            required: true,
            synonyms: &[],
            max_length: Some(max_length),
            pattern: None,
            allowed: None,
        }
    }

    const fn optional(name: &'static str, max_length: usize) -> Self {
        Self {
            required: false,
            ..Self::required(name, max_length)
        }
    }

    const fn synonyms(mut self, synonyms: &'static [&'static str]) -> Self {
        self.synonyms = synonyms;
        self
    }

    const fn pattern(mut self, pattern: FieldPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    const fn allowed(mut self, allowed: AllowedValues) -> Self {
        self.allowed = Some(allowed);
        self
    }
}

/// Fields and unique key of one table type.
#[derive(Debug)]
pub struct TableSchema {
    /// Table type the schema describes
    pub table_type: TableType,
    /// Fields in declaration order
    pub fields: &'static [FieldSpec],
    /// Fields that identify a row for duplicate detection
    pub unique_key: &'static [&'static str],
}

const BOOLEAN: AllowedValues =
    AllowedValues::Fixed(&["true", "false", "yes", "no", "1", "0", "active", "inactive"]);

static USER_FIELDS: [FieldSpec; 8] = [
    FieldSpec::required("email", 256)
        .synonyms(&["email_address", "mail", "user_email", "e_mail"])
        .pattern(FieldPattern::Email),
    FieldSpec::required("first_name", 100).synonyms(&["given_name", "fname", "forename"]),
    FieldSpec::required("last_name", 100).synonyms(&["surname", "family_name", "lname"]),
    FieldSpec::optional("username", 100)
        .synonyms(&["user_name", "login", "login_name"])
        .pattern(FieldPattern::Identifier),
    FieldSpec::optional("phone", 32)
        .synonyms(&["phone_number", "mobile", "telephone"])
        .pattern(FieldPattern::Phone),
    FieldSpec::optional("role", 100)
        .synonyms(&["role_name", "user_role"])
        .allowed(AllowedValues::Roles),
    FieldSpec::optional("department", 100).synonyms(&["dept", "team"]),
    FieldSpec::optional("is_active", 10)
        .synonyms(&["active", "enabled"])
        .allowed(BOOLEAN),
];

static ROLE_FIELDS: [FieldSpec; 3] = [
    FieldSpec::required("name", 100).synonyms(&["role_name", "role", "title"]),
    FieldSpec::optional("description", 500).synonyms(&["desc", "details"]),
    FieldSpec::optional("permissions", 2000).synonyms(&["rights", "privileges", "scopes"]),
];

static APPLICATION_FIELDS: [FieldSpec; 6] = [
    FieldSpec::required("name", 200).synonyms(&["app_name", "application_name", "application"]),
    FieldSpec::optional("description", 1000).synonyms(&["desc", "summary"]),
    FieldSpec::optional("owner_email", 256)
        .synonyms(&["owner", "contact_email", "app_owner"])
        .pattern(FieldPattern::Email),
    FieldSpec::optional("url", 2048)
        .synonyms(&["app_url", "homepage", "base_url", "website"])
        .pattern(FieldPattern::Url),
    FieldSpec::optional("version", 50).synonyms(&["app_version", "release"]),
    FieldSpec::optional("environment", 20)
        .synonyms(&["env", "stage"])
        .allowed(AllowedValues::Fixed(&[
            "development",
            "dev",
            "test",
            "staging",
            "production",
            "prod",
        ])),
];

static USER_ROLE_FIELDS: [FieldSpec; 3] = [
    FieldSpec::required("user_email", 256)
        .synonyms(&["email", "user", "member_email"])
        .pattern(FieldPattern::Email),
    FieldSpec::required("role_name", 100)
        .synonyms(&["role", "assigned_role"])
        .allowed(AllowedValues::Roles),
    FieldSpec::optional("application_name", 200).synonyms(&["application", "app", "app_name"]),
];

/// Every known schema.
pub static SCHEMAS: [TableSchema; 4] = [
    TableSchema {
        table_type: TableType::Users,
        fields: &USER_FIELDS,
        unique_key: &["email"],
    },
    TableSchema {
        table_type: TableType::Roles,
        fields: &ROLE_FIELDS,
        unique_key: &["name"],
    },
    TableSchema {
        table_type: TableType::Applications,
        fields: &APPLICATION_FIELDS,
        unique_key: &["name"],
    },
    TableSchema {
        table_type: TableType::UserRoles,
        fields: &USER_ROLE_FIELDS,
        unique_key: &["user_email", "role_name", "application_name"],
    },
];

impl TableSchema {
    /// Field by canonical name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fields that must be present in every row.
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| field.required)
    }

    /// Duplicate-detection key of a mapped record, case-insensitive.
    pub fn unique_key_of(&self, record: &Record) -> String {
        self.unique_key
            .iter()
            .map(|field| {
                record
                    .get(*field)
                    .map(|value| value.trim().to_lowercase())
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Column names compared ignoring case, `_`, `-` and spaces.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Schema field to source column assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    fields: BTreeMap<String, String>,
}

impl ColumnMapping {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping from `column -> field` pairs as users write them.
    pub fn from_column_pairs<I, C, F>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, F)>,
        C: Into<String>,
        F: Into<String>,
    {
        let mut mapping = Self::new();
        for (column, field) in pairs {
            mapping.insert(field, column);
        }
        mapping
    }

    /// Maps `field` to `column`, replacing an earlier column.
    pub fn insert(&mut self, field: impl Into<String>, column: impl Into<String>) {
        self.fields.insert(field.into(), column.into());
    }

    /// Source column mapped to `field`.
    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Value of a schema field in a row, if the field is mapped.
    pub fn value<'a>(&self, row: &'a ParsedRow, field: &str) -> Option<&'a str> {
        self.column_for(field).and_then(|column| row.get(column))
    }

    /// Mapped, trimmed field values of a row.
    pub fn project(&self, row: &ParsedRow) -> Record {
        self.fields
            .iter()
            .filter_map(|(field, column)| {
                row.get(column)
                    .map(|value| (field.clone(), value.trim().to_string()))
            })
            .collect()
    }

    /// Fields in this mapping.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `(field, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(f, c)| (f.as_str(), c.as_str()))
    }

    /// Whether `column` is already mapped to some field.
    pub fn contains_column(&self, column: &str) -> bool {
        self.fields.values().any(|c| c == column)
    }

    /// Adds entries of `fallback` whose field and column are both unused.
    pub fn fill_from(&mut self, fallback: &Self) {
        for (field, column) in fallback.iter() {
            if self.column_for(field).is_none() && !self.contains_column(column) {
                self.insert(field, column);
            }
        }
    }

    /// `column -> field` view for reports.
    pub fn by_column(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(field, column)| (column.clone(), field.clone()))
            .collect()
    }

    /// Number of mapped fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is mapped.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_type_has_a_schema() {
        for table_type in TableType::KNOWN {
            let schema = table_type.schema().unwrap();
            assert!(schema.required_fields().count() > 0);
            for key in schema.unique_key {
                assert!(schema.field(key).is_some(), "{table_type}: {key}");
            }
        }
        assert!(TableType::Unknown.schema().is_none());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("First_Name"), normalize("firstName"));
        assert_eq!(normalize("E-Mail"), "email");
        assert_eq!(normalize("  role name "), "rolename");
    }

    #[test]
    fn test_table_type_parsing() {
        assert_eq!("user-roles".parse::<TableType>().unwrap(), TableType::UserRoles);
        assert_eq!("Users".parse::<TableType>().unwrap(), TableType::Users);
        assert!("invoices".parse::<TableType>().is_err());
    }

    #[test]
    fn test_unique_key_is_case_insensitive() {
        let schema = TableType::Users.schema().unwrap();
        let mut record = Record::new();
        record.insert("email".to_string(), " Ann@X.io ".to_string());
        assert_eq!(schema.unique_key_of(&record), "ann@x.io");
    }

    #[test]
    fn test_mapping_projection() {
        let mapping = ColumnMapping::from_column_pairs([("Mail", "email"), ("Given", "first_name")]);
        let row = ParsedRow::new(
            1,
            vec![
                ("Mail".to_string(), " a@x.io ".to_string()),
                ("Given".to_string(), "Ann".to_string()),
                ("Extra".to_string(), "ignored".to_string()),
            ],
        );
        let record = mapping.project(&row);
        assert_eq!(record.len(), 2);
        assert_eq!(record["email"], "a@x.io");
        assert_eq!(mapping.by_column()["Given"], "first_name");
    }

    #[test]
    fn test_fill_from_keeps_explicit_entries() {
        let mut explicit = ColumnMapping::from_column_pairs([("Contact", "email")]);
        let detected = ColumnMapping::from_column_pairs([
            ("email", "email"),
            ("Contact", "phone"),
            ("First", "first_name"),
        ]);
        explicit.fill_from(&detected);
        assert_eq!(explicit.column_for("email"), Some("Contact"));
        assert_eq!(explicit.column_for("phone"), None);
        assert_eq!(explicit.column_for("first_name"), Some("First"));
    }
}
