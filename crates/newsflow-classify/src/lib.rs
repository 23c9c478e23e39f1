pub mod classifier;
pub mod command;
pub mod error;
pub mod keyword;
pub mod parser;
pub mod tickers;

pub mod test_support;

pub use classifier::{check_contract, Classifier};
pub use command::{CommandClassifier, CommandConfig};
pub use error::ClassifyError;
pub use keyword::KeywordClassifier;
pub use tickers::TickerMapper;
