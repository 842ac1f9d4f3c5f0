pub mod connection;
pub mod entities;
pub mod error;
pub mod orchestrator;
pub mod repositories;
pub mod schema;

pub use connection::DbPool;
pub use error::DbError;
pub use orchestrator::{save, Persistable};
pub use repositories::Repositories;
