//! Background work queues consumed against the volume manager: the pull
//! worker (repair under-replication) and the trash worker (grace-period
//! deletion).

pub mod pull;
pub mod trash;

pub use pull::PullWorker;
pub use trash::{TrashReport, TrashWorker};
