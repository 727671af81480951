//! The three conversion stages: silent video render, audio track render,
//! and audio/video mux. Each is a thin composition of [`ToolCommand`]
//! with stage-specific arguments and success criteria.
//!
//! [`ToolCommand`]: crate::command::ToolCommand

mod audio;
mod mux;
mod video;

pub use audio::render_audio_track;
pub use mux::{mux_args, mux_audio_video};
pub use video::render_silent_video;
