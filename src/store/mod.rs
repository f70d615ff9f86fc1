//! Persistence for the three durable entities: `Profile`, `GenerationJob`
//! and `Episode`/`TopicHistoryEntry`. Everything the orchestrator, scheduler
//! and HTTP API read or write goes through the `Dao` trait so tests can swap
//! in `InMemoryDao`.
pub mod dao;
pub(crate) mod models;

pub use dao::{Dao, PostgresDao};
#[cfg(test)]
pub(crate) use dao::InMemoryDao;
