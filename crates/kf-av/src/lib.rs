//! # kf-av
//!
//! External tool execution and the conversion stages built on it.
//!
//! This crate provides:
//!
//! - **Command execution** ([`ToolCommand`]) -- async builder with a
//!   mandatory timeout; on timeout the whole process tree is killed before
//!   the error is returned.
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the ffmpeg binary
//!   and the two renderer commands.
//! - **Argument templates** ([`TemplateContext`]) -- `{input}` / `{output}`
//!   style substitution for renderer arguments.
//! - **Job workspaces** ([`JobWorkspace`]) -- a job-scoped temporary
//!   directory with job-unique artifact names.
//! - **Stages** ([`actions`]) -- render-silent-video, render-audio-track, and
//!   mux-audio-video, each yielding a [`StageResult`].

pub mod actions;
pub mod command;
mod process_tree;
pub mod stage;
pub mod template;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use stage::{Stage, StageResult};
pub use template::TemplateContext;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::JobWorkspace;

// Stage functions
pub use actions::{mux_audio_video, render_audio_track, render_silent_video};
