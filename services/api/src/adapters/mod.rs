pub mod db;
pub mod sheet;

pub use db::PgStore;
pub use sheet::SheetCatalog;
