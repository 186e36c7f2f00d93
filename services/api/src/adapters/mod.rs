pub mod db;
pub mod documents;

pub use db::PgStore;
pub use documents::DocumentStore;
