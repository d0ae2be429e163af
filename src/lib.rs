pub mod config;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod sweep;

pub use config::{AppConfig, ScanScope};
pub use error::Error;
pub use scheduler::{Scheduler, SweepTally};
pub use service::OccurrenceService;
pub use storage::{OccurrenceRecord, OccurrenceRepository, PhotoStore};
pub use sweep::{CleanupExecutor, DuplicateScanner, SweepOutcome, SweepReport, Sweeper};
