use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Person;

/// Index-ready shape of a film work.
///
/// Field names and order match the strict index mapping; adding a field
/// here without adding it to the mapping makes every upsert fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmDocument {
    pub id: Uuid,
    pub imdb_rating: Option<f64>,
    pub genres: Vec<String>,
    pub title: String,
    pub description: Option<String>,
    pub directors_names: Vec<String>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
    pub directors: Vec<Person>,
    pub actors: Vec<Person>,
    pub writers: Vec<Person>,
}
