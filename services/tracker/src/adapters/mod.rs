pub mod content;
pub mod db;

pub use content::PgContentAdapter;
pub use db::PgStore;
