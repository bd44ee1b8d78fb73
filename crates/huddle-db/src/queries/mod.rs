//! Query functions, one module per collection. Every function takes a plain
//! `&Connection` so callers can compose several of them inside one
//! `Database::with_tx` closure.

pub mod channels;
pub mod conversations;
pub mod files;
pub mod members;
pub mod messages;
pub mod reactions;
pub mod users;
pub mod workspaces;

use anyhow::Result;
use rusqlite::types::Type;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Wrap a decode failure of column `idx` as a rusqlite conversion error.
pub(crate) fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

/// Escape `%`, `_` and `\` so user text matches literally inside LIKE.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
