//! Самомасштабируемый async пул задач
//!
//! # Features
//! - Ограниченная очередь с backpressure на `submit`
//! - Приоритетные задачи через единственного владельца кучи
//! - Автомасштабирование воркеров в пределах `[min_workers, max_workers]`
//! - Lock-free метрики
//! - Остановка с отбрасыванием очереди или с её выполнением

pub mod config;
pub mod errors;
pub mod handle;
pub mod job;
pub mod metrics;
pub mod model;
pub mod pool;
pub mod scaling;

mod feed;
mod priority;
mod worker;

pub use config::PoolConfig;
pub use errors::{BoxError, ConfigError, JobError, SubmitError};
pub use handle::Results;
pub use model::{MetricsSnapshot, ShutdownMode, WorkerStats};
pub use pool::{Pool, PoolInner};
