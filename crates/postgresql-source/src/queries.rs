//! SQL text for the source queries.
//!
//! Only the schema name and identifiers taken from [`Stream`] are
//! interpolated; every value is a bind parameter.

use anyhow::Result;
use sync_core::{Link, Stream};

/// Accept plain identifiers only: ASCII letters, digits and `_`, not
/// starting with a digit.
pub fn validate_schema(schema: &str) -> Result<()> {
    let mut chars = schema.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("Invalid schema name '{schema}'");
    }
    Ok(())
}

/// `$1` modified, `$2` id of the cursor (both NULL for the earliest cursor),
/// `$3` page size.
pub(crate) fn changed_roots(schema: &str, stream: Stream) -> String {
    format!(
        "SELECT id, modified \
         FROM {schema}.{table} \
         WHERE ($1::timestamptz IS NULL OR (modified, id) > ($1::timestamptz, $2::uuid)) \
         ORDER BY modified, id \
         LIMIT $3",
        table = stream.root_table(),
    )
}

/// `$1` root ids, `$2`/`$3` film work cursor, `$4` page size.
pub(crate) fn affected_film_works(schema: &str, link: Link) -> String {
    format!(
        "SELECT DISTINCT fw.id, fw.modified \
         FROM {schema}.film_work fw \
         JOIN {schema}.{link_table} lnk ON lnk.film_work_id = fw.id \
         WHERE lnk.{link_column} = ANY($1::uuid[]) \
         AND ($2::timestamptz IS NULL OR (fw.modified, fw.id) > ($2::timestamptz, $3::uuid)) \
         ORDER BY fw.modified, fw.id \
         LIMIT $4",
        link_table = link.table,
        link_column = link.column,
    )
}

/// `$1` film work ids.
pub(crate) fn joined_rows(schema: &str) -> String {
    format!(
        "SELECT fw.id, fw.title, fw.description, fw.rating::numeric, fw.type, fw.created, fw.modified, \
                pfw.role, p.id, p.full_name, g.id, g.name \
         FROM {schema}.film_work fw \
         LEFT JOIN {schema}.person_film_work pfw ON pfw.film_work_id = fw.id \
         LEFT JOIN {schema}.person p ON p.id = pfw.person_id \
         LEFT JOIN {schema}.genre_film_work gfw ON gfw.film_work_id = fw.id \
         LEFT JOIN {schema}.genre g ON g.id = gfw.genre_id \
         WHERE fw.id = ANY($1::uuid[]) \
         ORDER BY fw.id, pfw.role, p.full_name, g.name"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_schema() {
        assert!(validate_schema("content").is_ok());
        assert!(validate_schema("_staging2").is_ok());
        assert!(validate_schema("").is_err());
        assert!(validate_schema("2content").is_err());
        assert!(validate_schema("content; DROP TABLE film_work").is_err());
        assert!(validate_schema("public.content").is_err());
    }

    #[test]
    fn test_changed_roots_uses_composite_cursor() {
        let sql = changed_roots("content", Stream::Genre);
        assert!(sql.contains("FROM content.genre "));
        assert!(sql.contains("(modified, id) > ($1::timestamptz, $2::uuid)"));
        assert!(sql.contains("ORDER BY modified, id"));
        assert!(sql.ends_with("LIMIT $3"));
    }

    #[test]
    fn test_affected_film_works_joins_link_table() {
        let link = Stream::Person.link().unwrap();
        let sql = affected_film_works("content", link);
        assert!(sql.contains("JOIN content.person_film_work lnk ON lnk.film_work_id = fw.id"));
        assert!(sql.contains("lnk.person_id = ANY($1::uuid[])"));
        assert!(sql.contains("SELECT DISTINCT fw.id, fw.modified"));
        assert!(sql.ends_with("LIMIT $4"));
    }

    #[test]
    fn test_joined_rows_is_outer_join() {
        let sql = joined_rows("cinema");
        assert_eq!(sql.matches("LEFT JOIN cinema.").count(), 4);
        assert!(sql.contains("WHERE fw.id = ANY($1::uuid[])"));
        assert!(sql.contains("fw.rating::numeric"));
        assert!(!sql.contains("content."));
    }
}
