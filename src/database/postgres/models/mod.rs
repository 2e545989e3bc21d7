#[cfg(test)]
mod tests;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::connection::Role;
use crate::RegistryError;

/// Which population a record belongs to; child and parent HNs are separate namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    Child,
    Parent,
}

impl PersonKind {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            PersonKind::Child => "child",
            PersonKind::Parent => "parent",
        }
    }

    #[inline]
    pub fn table(self) -> &'static str {
        match self {
            PersonKind::Child => "child",
            PersonKind::Parent => "parent",
        }
    }

    #[inline]
    pub fn vector_table(self) -> &'static str {
        match self {
            PersonKind::Child => "identity_vector_child",
            PersonKind::Parent => "identity_vector_parent",
        }
    }

    /// Column of `parent_child` referencing this population
    #[inline]
    pub fn relation_column(self) -> &'static str {
        match self {
            PersonKind::Child => "child_id",
            PersonKind::Parent => "parent_id",
        }
    }

    #[inline]
    pub fn counterpart(self) -> PersonKind {
        match self {
            PersonKind::Child => PersonKind::Parent,
            PersonKind::Parent => PersonKind::Child,
        }
    }
}

impl fmt::Display for PersonKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonKind {
    type Err = RegistryError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "child" => Ok(PersonKind::Child),
            "parent" => Ok(PersonKind::Parent),
            other => Err(RegistryError::Validation(format!(
                "Unknown person kind: {} (expected 'child' or 'parent')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Person {
    pub person_id: Uuid,
    pub hn: String,
    pub firstname: String,
    pub lastname: String,
    pub age: Option<i32>,
    pub sex: Option<String>,
    pub dob: Option<NaiveDate>,
    pub active_status: bool,
    pub created_at: DateTime<Utc>,
}

impl Person {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active_status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    pub hn: String,
    pub firstname: String,
    pub lastname: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
}

/// Editable fields; `None` leaves the column unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PersonUpdate {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub age: Option<i32>,
    pub sex: Option<String>,
    pub dob: Option<NaiveDate>,
}

impl PersonUpdate {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.firstname.is_none()
            && self.lastname.is_none()
            && self.age.is_none()
            && self.sex.is_none()
            && self.dob.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Relation {
    pub relation_id: Uuid,
    pub parent_id: Uuid,
    pub child_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A matched person joined with the linked counterpart, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RelationRow {
    pub relation_id: Option<Uuid>,
    pub child_hn: Option<String>,
    pub child_firstname: Option<String>,
    pub child_lastname: Option<String>,
    pub child_age: Option<i32>,
    pub child_sex: Option<String>,
    pub child_dob: Option<NaiveDate>,
    pub parent_hn: Option<String>,
    pub parent_firstname: Option<String>,
    pub parent_lastname: Option<String>,
    pub parent_age: Option<i32>,
    pub parent_sex: Option<String>,
    pub parent_dob: Option<NaiveDate>,
}

impl RelationRow {
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.relation_id.is_some()
    }
}

/// Search criteria; `None` means "do not filter on this field"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchFilter {
    pub hn: Option<String>,
    /// Matches first or last name
    pub name: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

impl SearchFilter {
    #[inline]
    pub fn by_hn(hn: &str) -> Self {
        Self {
            hn: Some(hn.to_string()),
            ..Self::default()
        }
    }

    #[inline]
    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Trim every field and drop the empty ones
    #[inline]
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            hn: clean(self.hn),
            name: clean(self.name),
            firstname: clean(self.firstname),
            lastname: clean(self.lastname),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hn.is_none() && self.name.is_none() && self.firstname.is_none() && self.lastname.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IdentityVector {
    pub vector_id: Uuid,
    pub person_id: Uuid,
    pub slot: i16,
    pub folder: Option<String>,
    pub active_status: bool,
    pub created_at: DateTime<Utc>,
}

/// Closest owner of a stored identity vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MatchCandidate {
    pub hn: String,
    pub distance: f64,
}

#[derive(Debug, Error)]
#[error("Unknown operator role: {0}")]
pub struct UnknownRoleError(String);

/// Role stored on the operator row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorRole {
    User,
    Admin,
}

impl OperatorRole {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            OperatorRole::User => "user",
            OperatorRole::Admin => "admin",
        }
    }

    /// Database credentials an authenticated operator of this role works under
    #[inline]
    pub fn connection_role(self) -> Role {
        match self {
            OperatorRole::User => Role::User,
            OperatorRole::Admin => Role::Admin,
        }
    }
}

impl fmt::Display for OperatorRole {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for OperatorRole {
    type Error = UnknownRoleError;

    #[inline]
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(OperatorRole::User),
            "admin" => Ok(OperatorRole::Admin),
            _ => Err(UnknownRoleError(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Operator {
    pub op_id: Uuid,
    pub op_number: String,
    pub username: String,
    #[sqlx(try_from = "String")]
    pub role: OperatorRole,
    pub created_at: DateTime<Utc>,
}

/// Operator row including the password hash; only read by the login path
#[derive(Debug, Clone, FromRow)]
pub struct OperatorCredentials {
    #[sqlx(flatten)]
    pub operator: Operator,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewOperator {
    pub op_number: String,
    pub username: String,
    pub password: String,
    pub role: OperatorRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ActivityEntry {
    pub activity_id: Uuid,
    pub op_number: String,
    pub activity: String,
    pub created_at: DateTime<Utc>,
}
