//! Helpers shared by the per-collection modules: dynamic `WHERE` clauses
//! built from a caller's [`Scope`] plus optional filters, and column
//! conversions between SQLite text/integer values and domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::ParamsFromIter;
use vetcare_shared::Scope;

/// Ordered `AND`-joined predicates with their positional parameters.
#[derive(Debug, Default)]
pub(crate) struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a predicate containing exactly one `?`.
    pub(crate) fn push(&mut self, clause: &str, value: impl Into<Value>) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.params.push(value.into());
        self
    }

    /// Add a predicate without parameters.
    pub(crate) fn push_raw(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    /// Restrict rows to the caller's scope. `owner_column` is a column or
    /// scalar sub-select yielding the owner id each row is checked against.
    pub(crate) fn scope(&mut self, scope: &Scope, owner_column: &str) -> &mut Self {
        match scope.restricted_to() {
            None => self,
            Some(owner) => self.push(&format!("{owner_column} = ?"), owner.to_string()),
        }
    }

    /// `" WHERE a AND b"`, or an empty string when there are no predicates.
    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> ParamsFromIter<std::slice::Iter<'_, Value>> {
        rusqlite::params_from_iter(self.params.iter())
    }

    /// Parameters followed by `extra` (e.g. `LIMIT ? OFFSET ?` values).
    pub(crate) fn params_with(&self, extra: &[Value]) -> ParamsFromIter<Vec<Value>> {
        let mut all = self.params.clone();
        all.extend_from_slice(extra);
        rusqlite::params_from_iter(all)
    }
}

// ---------------------------------------------------------------------------
// Column conversions
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("unknown value `{0}`")]
struct UnknownVariant(String);

pub(crate) fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Parse a UUID text column into one of the typed id newtypes.
pub(crate) fn id_column<T>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    parse: fn(&str) -> Result<T, uuid::Error>,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_id_column<T>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    parse: fn(&str) -> Result<T, uuid::Error>,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse(&t).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Parse a lowercase enum text column.
pub(crate) fn enum_column<T>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).ok_or_else(|| conversion_error(idx, UnknownVariant(text)))
}

pub(crate) fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Integer unix seconds (appointment start times).
pub(crate) fn unix_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| conversion_error(idx, UnknownVariant(secs.to_string())))
}

pub(crate) fn opt_date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| NaiveDate::parse_from_str(&t, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// JSON array column (medications, vaccines).
pub(crate) fn json_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

/// Drop sub-second precision; start times are stored as whole seconds.
pub(crate) fn whole_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetcare_shared::types::UserId;

    #[test]
    fn test_empty_conditions() {
        let c = Conditions::new();
        assert_eq!(c.where_sql(), "");
    }

    #[test]
    fn test_scope_clauses() {
        let owner = UserId::new();

        let mut c = Conditions::new();
        c.scope(&Scope::Unrestricted, "owner_id");
        assert_eq!(c.where_sql(), "");

        let mut c = Conditions::new();
        c.scope(&Scope::OwnedBy(owner), "owner_id").push_raw("active = 1");
        assert_eq!(c.where_sql(), " WHERE owner_id = ? AND active = 1");
        assert_eq!(c.params.len(), 1);

        let mut c = Conditions::new();
        c.scope(&Scope::PetsOwnedBy(owner), "(SELECT owner_id FROM pets WHERE pets.id = pet_id)");
        assert_eq!(
            c.where_sql(),
            " WHERE (SELECT owner_id FROM pets WHERE pets.id = pet_id) = ?"
        );
        assert_eq!(c.params.len(), 1);
    }

    #[test]
    fn test_whole_seconds() {
        let dt = DateTime::parse_from_rfc3339("2025-01-10T10:00:00.750Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(whole_seconds(dt).to_rfc3339(), "2025-01-10T10:00:00+00:00");
    }
}
