pub mod broadcast;
pub mod builder;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod decision;
pub mod error;
pub mod sources;
pub mod stats;

pub use broadcast::{Broadcaster, Subscription};
pub use builder::{build_classifier, build_coordinator, build_source, open_journal};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, parse_config};
pub use coordinator::{CleanupReport, Coordinator, TickReport};
pub use daemon::Daemon;
pub use decision::{decide, SignalEngine};
pub use error::{PipelineError, SourceError};
pub use sources::{FileSource, NewsSource, SimulatedSource, StaticSource};
pub use stats::PipelineStats;
