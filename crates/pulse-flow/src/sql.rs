//! SQL compilation from filter sets.
//!
//! A pure, deterministic translation: `SELECT * FROM <table>` plus one
//! predicate per filter clause, `AND`-joined. List values become `IN (...)`,
//! scalars become `=`. The WHERE clause is present iff the set is non-empty.
//!
//! Filter values reach this compiler from the public API, so they are not
//! trusted: column names must match the normalized schema pattern, embedded
//! single quotes are doubled, and control characters are rejected outright.

use crate::error::{Error, Result};
use crate::filter::{FilterSet, FilterValue};

/// Compiles a filter set into a SQL statement against the given table.
///
/// # Errors
///
/// Returns `Error::Validation` for a malformed column name or a value
/// containing control characters.
pub fn compile(table: &str, filters: &FilterSet) -> Result<String> {
    let mut sql = format!("SELECT * FROM {table}");

    if !filters.is_empty() {
        let mut predicates = Vec::with_capacity(filters.len());
        for clause in filters {
            validate_column(&clause.column)?;
            let predicate = match &clause.value {
                FilterValue::One(value) => {
                    format!("{} = {}", clause.column, quote(value)?)
                }
                FilterValue::Many(values) => {
                    let quoted: Vec<String> =
                        values.iter().map(|v| quote(v)).collect::<Result<_>>()?;
                    format!("{} IN ({})", clause.column, quoted.join(", "))
                }
            };
            predicates.push(predicate);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    sql.push(';');
    Ok(sql)
}

/// Column names are normalized upstream at schema registration: lower-case,
/// spaces and colons replaced with underscores.
fn validate_column(column: &str) -> Result<()> {
    let mut chars = column.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid filter column: {column:?}"
        )))
    }
}

/// Quotes a filter value, doubling embedded single quotes.
fn quote(value: &str) -> Result<String> {
    if value.chars().any(char::is_control) {
        return Err(Error::validation(format!(
            "filter value contains control characters: {value:?}"
        )));
    }
    Ok(format!("'{}'", value.replace('\'', "''")))
}
