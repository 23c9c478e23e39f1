pub mod dedup;
pub mod error;
pub mod journal;
pub mod window;

pub use dedup::DedupCache;
pub use error::StoreError;
pub use journal::SignalJournal;
pub use window::{SentimentWindowStore, TickerWindow, WindowEntry};
