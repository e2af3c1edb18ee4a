mod connection;
pub mod helpers;
mod migrations;
mod repositories;
mod store;

pub use connection::Database;
pub use migrations::CURRENT_SCHEMA_VERSION;
pub use repositories::response_ref;
