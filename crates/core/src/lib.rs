#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod time;
pub mod tracker;

pub use error::ModelError;
pub use progress::ProgressAggregator;
pub use registry::ItemRegistry;
pub use scheduler::{AnswerOutcome, Scheduler};
pub use time::Clock;
pub use tracker::SessionTracker;
