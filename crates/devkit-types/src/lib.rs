//! devkit-types: shared leaf types for devkit.
//!
//! This crate provides:
//!
//! - **Value**: the runtime value type flowing through the evaluator
//! - **ResultItem**: one unit of evaluator output (printed text or a value)
//! - **DevError**: the closed error taxonomy with per-category markers
//! - **Settings**: the explicit configuration struct passed into components
//! - **OutputSink**: the message-delivery contract toward the host chat layer
//! - **TimedInfo**: a small deadline-aware stopwatch

pub mod error;
pub mod settings;
pub mod sink;
pub mod timing;
pub mod value;

pub use error::{DevError, ErrorCategory, TracebackStore, SUCCESS_MARKER};
pub use settings::Settings;
pub use sink::{BufferSink, OutputSink, SendOptions};
pub use timing::TimedInfo;
pub use value::{json_to_value, value_to_json, ResultItem, Value};
