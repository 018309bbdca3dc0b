//! Configuration loading, validation and paths.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AudioConfig, Config, HistoryConfig, HotkeysConfig, OutputConfig, ProcessingConfig,
    TranscriptionConfig,
};
