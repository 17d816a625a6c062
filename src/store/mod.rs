//! SQLite persistence, one module per table.
//!
//! Functions take the pool and return `sqlx::Error`; handlers map the
//! `Option`/`bool` results onto 404s.

pub mod api_keys;
pub mod bugs;
pub mod developers;
pub mod predictions;

/// True when the error is a UNIQUE constraint failure.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
