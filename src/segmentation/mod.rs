pub mod bounded;
pub mod config;
pub mod finalizer;
pub mod instant;
pub mod scheduler;
pub mod session;
pub mod strategy;

pub use config::SegmentationConfig;
pub use finalizer::fill_gaps;
pub use scheduler::{PendingKey, ScheduledResolution};
pub use session::{LabelingSession, SelectOutcome};
pub use strategy::TimingStrategy;
