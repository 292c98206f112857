//! The worker gateway: spawning, polling, and tearing down remote workers.

pub mod gateway;
pub mod types;

pub use gateway::{StrategosGateway, WorkerGateway, DEFAULT_WAIT_TIMEOUT};
pub use types::{SpawnRequest, SpawnTask, WorkerId, WorkerState, WorkerStatus};

#[cfg(test)]
pub(crate) mod testing;
