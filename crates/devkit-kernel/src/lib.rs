//! devkit-kernel: the evaluator/session core.
//!
//! This crate provides:
//!
//! - **Scope**: the persistent two-tier (global/local) variable environment
//! - **Lexer**: tokenizes evaluation-language source using logos
//! - **Parser**: builds statements from tokens
//! - **Execute**: streams evaluation results one item at a time
//! - **ShellSession / Process**: the subprocess multiplexer with idle
//!   timeout and forced-kill semantics
//! - **Paginator**: message-size-aware line splitting for the output sink
//! - **vars**: virtual-variable substitution and secret scrubbing

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod pagination;
pub mod parser;
pub mod scope;
pub mod session;
pub mod vars;

pub use eval::Execute;
pub use pagination::{strip_codeblock, wrap_codeblock, Paginator};
pub use scope::Scope;
pub use session::{KillHandle, Process, ShellSession};
pub use vars::{conceal_vars, replace_vars, scrub_paths};
