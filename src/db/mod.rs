//! Credential store: trait plus PostgreSQL and in-memory backends.

mod memory;
mod pool;
mod postgres;
mod store;

pub use memory::MemoryUserStore;
pub use pool::{create_pool, run_migrations, DbPool};
pub use postgres::PgUserStore;
pub use store::UserStore;
