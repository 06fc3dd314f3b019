//! Watermark values stored in checkpoints.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// String written for [`Watermark::Earliest`].
pub const EARLIEST_SENTINEL: &str = "-infinity";

/// Position in a table ordered by `(modified, id)`.
///
/// `Earliest` sorts before every cursor. Cursors compare by `modified` first
/// and `id` second, which matches the `ORDER BY modified, id` used by every
/// paginated source query, so rows sharing a timestamp across a page
/// boundary are never skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Watermark {
    /// Nothing processed yet.
    #[default]
    Earliest,
    /// Everything up to and including `(modified, id)` has been processed.
    At { modified: DateTime<Utc>, id: Uuid },
}

#[derive(Debug, thiserror::Error)]
pub enum WatermarkParseError {
    #[error("invalid watermark timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("invalid watermark id '{value}': {source}")]
    Id { value: String, source: uuid::Error },
}

impl Watermark {
    pub fn at(modified: DateTime<Utc>, id: Uuid) -> Self {
        Self::At { modified, id }
    }

    /// Timestamp-only watermark, as written by older state files.
    ///
    /// The nil id sorts before every real id, so rows carrying exactly this
    /// timestamp are read again.
    pub fn timestamp(modified: DateTime<Utc>) -> Self {
        Self::At {
            modified,
            id: Uuid::nil(),
        }
    }

    pub fn is_earliest(&self) -> bool {
        matches!(self, Self::Earliest)
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Earliest => None,
            Self::At { modified, .. } => Some(*modified),
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Earliest => None,
            Self::At { id, .. } => Some(*id),
        }
    }

    /// Encode for storage: `-infinity`, `<rfc3339>` or `<rfc3339>#<uuid>`.
    pub fn encode(&self) -> String {
        match self {
            Self::Earliest => EARLIEST_SENTINEL.to_string(),
            Self::At { modified, id } => {
                let ts = modified.to_rfc3339_opts(SecondsFormat::AutoSi, true);
                if id.is_nil() {
                    ts
                } else {
                    format!("{ts}#{id}")
                }
            }
        }
    }

    /// Decode a stored value. `None` and the sentinel both mean `Earliest`.
    pub fn decode(value: Option<&str>) -> Result<Self, WatermarkParseError> {
        match value.map(str::trim) {
            None | Some("") | Some(EARLIEST_SENTINEL) => Ok(Self::Earliest),
            Some(s) => s.parse(),
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Watermark {
    type Err = WatermarkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == EARLIEST_SENTINEL {
            return Ok(Self::Earliest);
        }

        let (ts, id) = match s.split_once('#') {
            Some((ts, id)) => (ts, Some(id)),
            None => (s, None),
        };

        let modified = parse_timestamp(ts)?;
        let id = match id {
            Some(id) => Uuid::parse_str(id).map_err(|source| WatermarkParseError::Id {
                value: id.to_string(),
                source,
            })?,
            None => Uuid::nil(),
        };

        Ok(Self::At { modified, id })
    }
}

/// RFC 3339 first, then a zone-less ISO 8601 timestamp taken as UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, WatermarkParseError> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(source) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| WatermarkParseError::Timestamp {
                value: value.to_string(),
                source,
            }),
    }
}
