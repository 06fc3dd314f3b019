//! Index settings and mapping for film work documents.

use serde_json::{json, Value};

const ANALYZER: &str = "ru_en";

fn person_mapping() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "name": { "type": "text", "analyzer": ANALYZER }
        }
    })
}

fn analyzed_text() -> Value {
    json!({ "type": "text", "analyzer": ANALYZER })
}

/// Body of the `PUT /<index>` request.
///
/// The mapping is strict: a document carrying a field not listed here is
/// rejected by the cluster instead of growing the mapping.
pub fn index_definition() -> Value {
    json!({
        "settings": {
            "refresh_interval": "1s",
            "analysis": {
                "filter": {
                    "english_stop": { "type": "stop", "stopwords": "_english_" },
                    "english_stemmer": { "type": "stemmer", "language": "english" },
                    "english_possessive_stemmer": {
                        "type": "stemmer",
                        "language": "possessive_english"
                    },
                    "russian_stop": { "type": "stop", "stopwords": "_russian_" },
                    "russian_stemmer": { "type": "stemmer", "language": "russian" }
                },
                "analyzer": {
                    ANALYZER: {
                        "tokenizer": "standard",
                        "filter": [
                            "lowercase",
                            "english_stop",
                            "english_stemmer",
                            "english_possessive_stemmer",
                            "russian_stop",
                            "russian_stemmer"
                        ]
                    }
                }
            }
        },
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": { "type": "keyword" },
                "imdb_rating": { "type": "float" },
                "genres": { "type": "keyword" },
                "title": {
                    "type": "text",
                    "analyzer": ANALYZER,
                    "fields": { "raw": { "type": "keyword" } }
                },
                "description": analyzed_text(),
                "directors_names": analyzed_text(),
                "actors_names": analyzed_text(),
                "writers_names": analyzed_text(),
                "directors": person_mapping(),
                "actors": person_mapping(),
                "writers": person_mapping()
            }
        }
    })
}
