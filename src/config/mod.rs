//! Configuration module

mod engine;

pub use engine::EngineConfig;
