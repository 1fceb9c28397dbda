pub mod alert_sink;
pub mod config;
pub mod crossing;
pub mod error;
pub mod model;
pub mod poll_strategy;
pub mod quote;
pub mod runtime;
pub mod store;

pub use crate::runtime::{AlertEngine, EngineHandle, EngineSettings, EngineSummary};
