pub mod operations;
pub mod schema;


pub use operations::{DepositStore, SqliteDepositStore};
pub use schema::{initialize_schema, run_migrations};
