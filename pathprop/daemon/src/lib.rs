//! Path Propagation Userspace Library
//!
//! Provides reusable components for loading the path propagation programs
//! and reading their shared maps.

pub mod collector;
pub mod exporter;
pub mod layout;
pub mod loader;
pub mod types;

pub use collector::CorrelationCollector;
pub use exporter::{JsonExporter, ReportExporter};
pub use layout::PinLayout;
pub use loader::PathPropLoader;
pub use types::*;
