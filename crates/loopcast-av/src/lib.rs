//! # loopcast-av
//!
//! External media tool plumbing for loopcast.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Corruption checks** ([`Validator`], [`FfprobeValidator`]) -- bounded
//!   time "is this file corrupted?" predicate.
//! - **Restream commands** ([`RestreamLauncher`], [`FfmpegRestream`]) -- the
//!   looping re-encode that publishes a file to the media server.

pub mod command;
pub mod restream;
pub mod tools;
pub mod validator;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput, ToolRun};
pub use restream::{FfmpegRestream, RestreamLauncher};
pub use tools::{ToolInfo, ToolRegistry};
pub use validator::{FfprobeValidator, Validator};
