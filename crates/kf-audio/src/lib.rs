//! # kf-audio
//!
//! Audio handling for the conversion pipeline.
//!
//! This crate provides:
//!
//! - **Track mixing** ([`mixer`]) -- overflow-safe summation of decoded
//!   tracks with hard clipping and a fixed-threshold soft limiter.
//! - **Track selection** ([`TrackSelector`]) -- one numbered track or the mix
//!   of all of them.
//! - **Track sources** ([`TrackSource`]) -- the seam through which decoded
//!   per-track samples arrive, plus a WAV-directory implementation.
//! - **WAV encoding** ([`wav`]) -- mono 16-bit PCM with a 44-byte header.

pub mod mixer;
pub mod selector;
pub mod source;
pub mod wav;

pub use mixer::{extract_track, mix_decoded, mix_tracks, render, MixedTrack, LIMITER_THRESHOLD};
pub use selector::TrackSelector;
pub use source::{TrackSource, WavTrackSource, TRACK_COUNT};
pub use wav::{encode_wav, write_wav, WAV_HEADER_LEN};
