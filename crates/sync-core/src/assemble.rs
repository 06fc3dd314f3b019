//! Document assembly: fold flat joined rows into per-film-work aggregates.
//!
//! Every aggregate is rebuilt from scratch out of the rows given; nothing is
//! merged with a previously indexed version, so assembling the same rows
//! twice always yields the same documents.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{FilmDocument, FilmWorkColumns, Genre, JoinedRow, Person, Role};

/// People credited under one role, de-duplicated by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleCredits {
    pub people: Vec<Person>,
    pub names: Vec<String>,
}

impl RoleCredits {
    /// Record `person` unless someone with the same name is already there.
    fn add(&mut self, person: &Person) -> bool {
        if self.names.iter().any(|n| n == &person.name) {
            return false;
        }
        self.people.push(person.clone());
        self.names.push(person.name.clone());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

/// Denormalized film work before it is flattened into a [`FilmDocument`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilmAggregate {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub imdb_rating: Option<f64>,
    pub kind: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: DateTime<Utc>,
    pub genres: Vec<Genre>,
    pub directors: RoleCredits,
    pub writers: RoleCredits,
    pub actors: RoleCredits,
}

impl FilmAggregate {
    fn new(film: &FilmWorkColumns) -> Self {
        Self {
            id: film.id,
            title: film.title.clone(),
            description: film.description.clone(),
            imdb_rating: film.rating,
            kind: film.kind.clone(),
            created: film.created,
            modified: film.modified,
            genres: Vec::new(),
            directors: RoleCredits::default(),
            writers: RoleCredits::default(),
            actors: RoleCredits::default(),
        }
    }

    pub fn credits(&self, role: Role) -> &RoleCredits {
        match role {
            Role::Director => &self.directors,
            Role::Writer => &self.writers,
            Role::Actor => &self.actors,
        }
    }

    fn credits_mut(&mut self, role: Role) -> &mut RoleCredits {
        match role {
            Role::Director => &mut self.directors,
            Role::Writer => &mut self.writers,
            Role::Actor => &mut self.actors,
        }
    }

    fn absorb(&mut self, row: &JoinedRow) {
        if let Some(genre) = &row.genre {
            if !self.genres.iter().any(|g| g.name == genre.name) {
                self.genres.push(genre.clone());
            }
        }

        if let Some(credit) = &row.credit {
            self.credits_mut(credit.role).add(&credit.person);
        }
    }

    pub fn to_document(&self) -> FilmDocument {
        FilmDocument {
            id: self.id,
            imdb_rating: self.imdb_rating,
            genres: self.genres.iter().map(|g| g.name.clone()).collect(),
            title: self.title.clone(),
            description: self.description.clone(),
            directors_names: self.directors.names.clone(),
            actors_names: self.actors.names.clone(),
            writers_names: self.writers.names.clone(),
            directors: self.directors.people.clone(),
            actors: self.actors.people.clone(),
            writers: self.writers.people.clone(),
        }
    }
}

/// Group joined rows by film work id and fold each group into an aggregate.
///
/// Film-work-level fields come from the first row seen for each id. Genres
/// are de-duplicated by name, people by name within their role.
pub fn assemble(rows: &[JoinedRow]) -> BTreeMap<Uuid, FilmAggregate> {
    let mut aggregates: BTreeMap<Uuid, FilmAggregate> = BTreeMap::new();
    for row in rows {
        aggregates
            .entry(row.film.id)
            .or_insert_with(|| FilmAggregate::new(&row.film))
            .absorb(row);
    }
    aggregates
}

/// [`assemble`] followed by flattening, ordered by film work id.
pub fn to_documents(rows: &[JoinedRow]) -> Vec<FilmDocument> {
    assemble(rows)
        .values()
        .map(FilmAggregate::to_document)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Credit;
    use chrono::TimeZone;

    fn film(n: u128, title: &str) -> FilmWorkColumns {
        FilmWorkColumns {
            id: Uuid::from_u128(n),
            title: title.into(),
            description: Some(format!("About {title}")),
            rating: Some(7.5),
            kind: Some("movie".into()),
            created: None,
            modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn person(n: u128, name: &str) -> Person {
        Person {
            id: Uuid::from_u128(n),
            name: name.into(),
        }
    }

    fn genre(n: u128, name: &str) -> Genre {
        Genre {
            id: Uuid::from_u128(n),
            name: name.into(),
        }
    }

    fn row(film: &FilmWorkColumns, credit: Option<(Role, Person)>, genre: Option<Genre>) -> JoinedRow {
        JoinedRow {
            film: film.clone(),
            credit: credit.map(|(role, person)| Credit { role, person }),
            genre,
        }
    }

    #[test]
    fn test_duplicate_genre_collapses() {
        let f = film(1, "Stalker");
        let rows = vec![
            row(&f, Some((Role::Actor, person(10, "A"))), Some(genre(100, "Drama"))),
            row(&f, Some((Role::Actor, person(11, "B"))), Some(genre(100, "Drama"))),
        ];

        let docs = to_documents(&rows);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].genres, vec!["Drama"]);
        assert_eq!(docs[0].actors_names, vec!["A", "B"]);
    }

    #[test]
    fn test_person_not_duplicated_across_genres() {
        let f = film(1, "Mirror");
        let director = person(10, "Andrei Tarkovsky");
        let rows = vec![
            row(&f, Some((Role::Director, director.clone())), Some(genre(100, "Drama"))),
            row(&f, Some((Role::Director, director.clone())), Some(genre(101, "Biography"))),
        ];

        let aggregates = assemble(&rows);
        let aggregate = &aggregates[&f.id];
        assert_eq!(aggregate.directors.people, vec![director]);
        assert_eq!(
            aggregate.genres.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            ["Drama", "Biography"]
        );
    }

    #[test]
    fn test_same_person_in_two_roles_is_kept_in_both() {
        let f = film(1, "Nostalghia");
        let p = person(10, "Andrei Tarkovsky");
        let rows = vec![
            row(&f, Some((Role::Director, p.clone())), None),
            row(&f, Some((Role::Writer, p.clone())), None),
        ];

        let doc = &to_documents(&rows)[0];
        assert_eq!(doc.directors, vec![p.clone()]);
        assert_eq!(doc.writers, vec![p]);
        assert!(doc.actors.is_empty());
    }

    #[test]
    fn test_film_without_credits_or_genres() {
        let f = film(1, "Untitled");
        let doc = &to_documents(&[row(&f, None, None)])[0];

        assert!(doc.genres.is_empty());
        assert!(doc.directors.is_empty());
        assert!(doc.directors_names.is_empty());
        assert_eq!(doc.title, "Untitled");
    }

    #[test]
    fn test_groups_by_film_work() {
        let a = film(2, "B-side");
        let b = film(1, "A-side");
        let rows = vec![
            row(&a, Some((Role::Actor, person(10, "X"))), None),
            row(&b, Some((Role::Actor, person(11, "Y"))), None),
            row(&a, Some((Role::Actor, person(12, "Z"))), None),
        ];

        let docs = to_documents(&rows);
        assert_eq!(docs.len(), 2);
        // ordered by id
        assert_eq!(docs[0].title, "A-side");
        assert_eq!(docs[1].actors_names, vec!["X", "Z"]);
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let f = film(1, "Solaris");
        let rows = vec![
            row(&f, Some((Role::Director, person(10, "D"))), Some(genre(100, "Sci-Fi"))),
            row(&f, Some((Role::Actor, person(11, "A"))), Some(genre(101, "Drama"))),
            row(&f, Some((Role::Writer, person(12, "W"))), Some(genre(100, "Sci-Fi"))),
        ];

        let first = serde_json::to_vec(&to_documents(&rows)).unwrap();
        let second = serde_json::to_vec(&to_documents(&rows)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_document_shape() {
        let f = film(1, "Solaris");
        let rows = vec![row(
            &f,
            Some((Role::Director, person(10, "D"))),
            Some(genre(100, "Sci-Fi")),
        )];
        let value = serde_json::to_value(&to_documents(&rows)[0]).unwrap();

        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "actors",
                "actors_names",
                "description",
                "directors",
                "directors_names",
                "genres",
                "id",
                "imdb_rating",
                "title",
                "writers",
                "writers_names"
            ]
        );
        assert_eq!(value["directors"][0]["name"], "D");
        assert_eq!(
            value["directors"][0]["id"],
            "00000000-0000-0000-0000-00000000000a"
        );
        assert_eq!(value["genres"][0], "Sci-Fi");
    }
}
