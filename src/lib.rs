pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod output;
pub mod platform;
pub mod registry;
pub mod report;
pub mod size;
pub mod update;

pub use cache::{FileCache, MemoryCache, SizeCache};
pub use config::Config;
pub use error::ExportError;
pub use model::{Plugin, Report, ReportRecord, SizeInfo, Summary, UpdateInfo};
pub use report::Aggregator;
