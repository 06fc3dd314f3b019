use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SyncCoreError;

/// A change-tracked source category.
///
/// Table and column names used in SQL are taken from here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Person,
    Genre,
    FilmWork,
}

/// Link table joining a root entity to film works.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// e.g. `person_film_work`
    pub table: &'static str,
    /// Column holding the root entity id, e.g. `person_id`
    pub column: &'static str,
}

impl Stream {
    /// Streams in the order a sync pass processes them.
    pub const ALL: [Stream; 3] = [Stream::Person, Stream::Genre, Stream::FilmWork];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Person => "person",
            Stream::Genre => "genre",
            Stream::FilmWork => "film_work",
        }
    }

    /// Table holding the stream's root entities and their `modified` column.
    pub fn root_table(&self) -> &'static str {
        self.as_str()
    }

    /// Link table to film works, `None` for the film work stream itself.
    pub fn link(&self) -> Option<Link> {
        match self {
            Stream::Person => Some(Link {
                table: "person_film_work",
                column: "person_id",
            }),
            Stream::Genre => Some(Link {
                table: "genre_film_work",
                column: "genre_id",
            }),
            Stream::FilmWork => None,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stream {
    type Err = SyncCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(Stream::Person),
            "genre" => Ok(Stream::Genre),
            "film_work" => Ok(Stream::FilmWork),
            other => Err(SyncCoreError::UnknownStream(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_order_and_names() {
        let names: Vec<_> = Stream::ALL.iter().map(Stream::as_str).collect();
        assert_eq!(names, ["person", "genre", "film_work"]);
    }

    #[test]
    fn test_stream_links() {
        assert_eq!(Stream::Person.link().unwrap().table, "person_film_work");
        assert_eq!(Stream::Genre.link().unwrap().column, "genre_id");
        assert!(Stream::FilmWork.link().is_none());
    }

    #[test]
    fn test_stream_parse() {
        assert_eq!("genre".parse::<Stream>(), Ok(Stream::Genre));
        assert_eq!(
            "movie".parse::<Stream>(),
            Err(SyncCoreError::UnknownStream("movie".into()))
        );
    }

    #[test]
    fn test_stream_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Stream::FilmWork).unwrap(),
            "\"film_work\""
        );
    }
}
