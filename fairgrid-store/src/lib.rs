pub mod app_config;
pub mod database;
pub mod pg_store;

pub use app_config::Config;
pub use database::DbClient;
pub use pg_store::PgEntityStore;
