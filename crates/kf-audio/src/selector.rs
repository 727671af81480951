//! Track selection for audio export.

use std::fmt;
use std::str::FromStr;

use kf_core::Error;

use crate::source::TRACK_COUNT;

/// Which audio to export from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelector {
    /// A single track by index (0 = background music, 1..=4 = sound effects).
    Track(usize),
    /// Every available track summed through the mixer.
    Mix,
}

impl TrackSelector {
    /// The background-music track, used by the pipeline's audio stage.
    pub const PRIMARY: TrackSelector = TrackSelector::Track(0);
}

impl fmt::Display for TrackSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSelector::Track(i) => write!(f, "{i}"),
            TrackSelector::Mix => f.write_str("mix"),
        }
    }
}

impl FromStr for TrackSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("mix") {
            return Ok(TrackSelector::Mix);
        }
        let index: usize = s
            .parse()
            .map_err(|_| Error::Validation(format!("invalid track selector '{s}'")))?;
        if index >= TRACK_COUNT {
            return Err(Error::Validation(format!(
                "track {index} out of range (0..{TRACK_COUNT})"
            )));
        }
        Ok(TrackSelector::Track(index))
    }
}
