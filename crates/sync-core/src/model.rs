//! Source-side rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::SyncCoreError;

/// `{id, modified}` pair returned by the paginated change queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRow {
    pub id: Uuid,
    pub modified: DateTime<Utc>,
}

/// A person as it appears in an index document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
}

/// Role of a person in a film work (`person_film_work.role`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Director,
    Writer,
    Actor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Director => "director",
            Role::Writer => "writer",
            Role::Actor => "actor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SyncCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "director" => Ok(Role::Director),
            "writer" => Ok(Role::Writer),
            "actor" => Ok(Role::Actor),
            other => Err(SyncCoreError::UnknownRole(other.to_string())),
        }
    }
}

/// A person attached to a film work under a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub role: Role,
    pub person: Person,
}

/// Film-work-level columns, identical on every joined row of one film work.
#[derive(Debug, Clone, PartialEq)]
pub struct FilmWorkColumns {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    /// `film_work.type`
    pub kind: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: DateTime<Utc>,
}

/// One row of the film work × person-role × genre outer join.
///
/// The outer join yields NULL person and genre columns for film works
/// without credits or genres; those come through as `None` rather than
/// as empty fields.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub film: FilmWorkColumns,
    pub credit: Option<Credit>,
    pub genre: Option<Genre>,
}

impl JoinedRow {
    /// Build a row from the nullable outer-join columns.
    ///
    /// A credit is only attached when role, person id and full name are all
    /// present and the role is known; an unknown role is logged and dropped.
    pub fn from_nullable(
        film: FilmWorkColumns,
        role: Option<&str>,
        person_id: Option<Uuid>,
        full_name: Option<String>,
        genre_id: Option<Uuid>,
        genre_name: Option<String>,
    ) -> Self {
        let credit = match (role, person_id, full_name) {
            (Some(role), Some(id), Some(name)) => match role.parse::<Role>() {
                Ok(role) => Some(Credit {
                    role,
                    person: Person { id, name },
                }),
                Err(e) => {
                    tracing::warn!(film_work_id = %film.id, person_id = %id, "Skipping credit: {e}");
                    None
                }
            },
            _ => None,
        };

        let genre = match (genre_id, genre_name) {
            (Some(id), Some(name)) => Some(Genre { id, name }),
            _ => None,
        };

        Self {
            film,
            credit,
            genre,
        }
    }
}
