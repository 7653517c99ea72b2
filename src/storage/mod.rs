//! SQLite-backed extension storage.
//!
//! A single key-value table (`extension_storage`) stands in for the browser's
//! extension storage area. The settings record lives under
//! [`SETTINGS_KEY`](crate::settings::SETTINGS_KEY) as JSON.

mod schema;
mod settings_store;
mod types;

pub use schema::Database;
pub use types::DatabaseError;
