//! In-memory catalog for tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use checkpoint::Watermark;
use chrono::{DateTime, Utc};
use sync_core::{ChangedRow, FilmWorkColumns, JoinedRow, Role, Stream};
use uuid::Uuid;

use crate::{SourceRepository, PAGE_SIZE};

/// Query of [`SourceRepository`], used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    ChangedRoots(Stream),
    AffectedFilmWorks(Stream),
    JoinedRows,
}

#[derive(Debug, Clone)]
struct Named {
    name: String,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Catalog {
    persons: BTreeMap<Uuid, Named>,
    genres: BTreeMap<Uuid, Named>,
    film_works: BTreeMap<Uuid, FilmWorkColumns>,
    /// `(film_work_id, person_id, role)`
    person_links: Vec<(Uuid, Uuid, Role)>,
    /// `(film_work_id, genre_id)`
    genre_links: Vec<(Uuid, Uuid)>,
    failing: HashSet<Query>,
    calls: Vec<Query>,
}

/// [`SourceRepository`] over in-memory tables.
///
/// Ordering, filtering and paging follow the SQL queries: rows strictly
/// after the cursor, ordered by `(modified, id)`, at most `page_size` per
/// page. Like the database, editing links leaves `film_work.modified`
/// alone.
#[derive(Debug)]
pub struct MemorySource {
    catalog: Mutex<Catalog>,
    page_size: usize,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            catalog: Mutex::new(Catalog::default()),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Catalog> {
        self.catalog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or update a person.
    pub fn put_person(&self, id: Uuid, name: &str, modified: DateTime<Utc>) {
        self.lock().persons.insert(
            id,
            Named {
                name: name.to_string(),
                modified,
            },
        );
    }

    /// Insert or update a genre.
    pub fn put_genre(&self, id: Uuid, name: &str, modified: DateTime<Utc>) {
        self.lock().genres.insert(
            id,
            Named {
                name: name.to_string(),
                modified,
            },
        );
    }

    /// Insert or update a film work.
    pub fn put_film_work(&self, film: FilmWorkColumns) {
        self.lock().film_works.insert(film.id, film);
    }

    pub fn link_person(&self, film_work_id: Uuid, person_id: Uuid, role: Role) {
        self.lock()
            .person_links
            .push((film_work_id, person_id, role));
    }

    pub fn link_genre(&self, film_work_id: Uuid, genre_id: Uuid) {
        self.lock().genre_links.push((film_work_id, genre_id));
    }

    /// Make `query` fail until [`MemorySource::heal`] is called.
    pub fn fail_on(&self, query: Query) {
        self.lock().failing.insert(query);
    }

    pub fn heal(&self) {
        self.lock().failing.clear();
    }

    /// Every query issued so far, in order.
    pub fn calls(&self) -> Vec<Query> {
        self.lock().calls.clone()
    }

    fn record(&self, query: Query) -> Result<std::sync::MutexGuard<'_, Catalog>> {
        let mut catalog = self.lock();
        catalog.calls.push(query);
        if catalog.failing.contains(&query) {
            anyhow::bail!("injected failure for {query:?}");
        }
        Ok(catalog)
    }

    fn page(&self, rows: impl IntoIterator<Item = ChangedRow>, after: Watermark) -> Vec<ChangedRow> {
        let mut rows: Vec<_> = rows
            .into_iter()
            .filter(|row| Watermark::at(row.modified, row.id) > after)
            .collect();
        rows.sort_by_key(|row| (row.modified, row.id));
        rows.truncate(self.page_size);
        rows
    }
}

fn changed(entries: &BTreeMap<Uuid, Named>) -> Vec<ChangedRow> {
    entries
        .iter()
        .map(|(id, named)| ChangedRow {
            id: *id,
            modified: named.modified,
        })
        .collect()
}

#[async_trait::async_trait]
impl SourceRepository for MemorySource {
    async fn changed_roots(&self, stream: Stream, after: Watermark) -> Result<Vec<ChangedRow>> {
        let catalog = self.record(Query::ChangedRoots(stream))?;
        let rows = match stream {
            Stream::Person => changed(&catalog.persons),
            Stream::Genre => changed(&catalog.genres),
            Stream::FilmWork => catalog
                .film_works
                .values()
                .map(|film| ChangedRow {
                    id: film.id,
                    modified: film.modified,
                })
                .collect(),
        };
        Ok(self.page(rows, after))
    }

    async fn affected_film_works(
        &self,
        stream: Stream,
        root_ids: &[Uuid],
        after: Watermark,
    ) -> Result<Vec<ChangedRow>> {
        let catalog = self.record(Query::AffectedFilmWorks(stream))?;
        let roots: HashSet<&Uuid> = root_ids.iter().collect();

        let linked: BTreeSet<Uuid> = match stream {
            Stream::Person => catalog
                .person_links
                .iter()
                .filter(|(_, person, _)| roots.contains(person))
                .map(|(film, _, _)| *film)
                .collect(),
            Stream::Genre => catalog
                .genre_links
                .iter()
                .filter(|(_, genre)| roots.contains(genre))
                .map(|(film, _)| *film)
                .collect(),
            Stream::FilmWork => anyhow::bail!("Stream {stream} has no link table to film works"),
        };

        let rows = linked.iter().filter_map(|id| {
            catalog.film_works.get(id).map(|film| ChangedRow {
                id: film.id,
                modified: film.modified,
            })
        });
        Ok(self.page(rows, after))
    }

    async fn joined_rows(&self, film_work_ids: &[Uuid]) -> Result<Vec<JoinedRow>> {
        let catalog = self.record(Query::JoinedRows)?;
        let wanted: BTreeSet<&Uuid> = film_work_ids.iter().collect();

        let mut rows = Vec::new();
        for id in wanted {
            let Some(film) = catalog.film_works.get(id) else {
                continue;
            };

            let credits: Vec<_> = catalog
                .person_links
                .iter()
                .filter(|(film_id, _, _)| film_id == id)
                .filter_map(|(_, person_id, role)| {
                    catalog
                        .persons
                        .get(person_id)
                        .map(|p| (Some(*role), Some(*person_id), Some(p.name.clone())))
                })
                .collect();
            let genres: Vec<_> = catalog
                .genre_links
                .iter()
                .filter(|(film_id, _)| film_id == id)
                .filter_map(|(_, genre_id)| {
                    catalog
                        .genres
                        .get(genre_id)
                        .map(|g| (Some(*genre_id), Some(g.name.clone())))
                })
                .collect();

            let credits = if credits.is_empty() {
                vec![(None, None, None)]
            } else {
                credits
            };
            let genres = if genres.is_empty() {
                vec![(None, None)]
            } else {
                genres
            };

            for (role, person_id, full_name) in &credits {
                for (genre_id, genre_name) in &genres {
                    rows.push(JoinedRow::from_nullable(
                        film.clone(),
                        role.as_ref().map(Role::as_str),
                        *person_id,
                        full_name.clone(),
                        *genre_id,
                        genre_name.clone(),
                    ));
                }
            }
        }
        Ok(rows)
    }
}
