//! 存储层
//!
//! `PersistenceGateway` 定义工作流层需要的持久化操作，`SqlitePersistence` 是基于 rusqlite 的实现。

pub mod gateway;
pub mod sqlite_store;

pub use gateway::PersistenceGateway;
pub use sqlite_store::SqlitePersistence;
