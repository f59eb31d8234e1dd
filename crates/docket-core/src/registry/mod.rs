//! Registry implementations.

mod sqlite;

pub use self::sqlite::SqliteRegistry;
