//! Sources of decoded per-track audio.
//!
//! The source-format parser lives outside this workspace. It reaches the
//! mixer through [`TrackSource`], which hands out one track of signed 16-bit
//! samples at a time.

use std::path::{Path, PathBuf};

use kf_core::{Error, Result};

/// Number of audio tracks in a source: background music plus four
/// sound-effect tracks.
pub const TRACK_COUNT: usize = 5;

/// Producer of decoded per-track PCM samples.
pub trait TrackSource {
    /// Number of track slots to consider.
    fn track_count(&self) -> usize {
        TRACK_COUNT
    }

    /// Decode one track. An absent track may return an empty vector or an
    /// error; both mean "skip" to the mixer.
    fn decode_track(&self, index: usize) -> Result<Vec<i16>>;

    /// Optional capability probe. `None` means the source cannot tell, in
    /// which case decode failure or emptiness stands in for absence.
    fn has_track(&self, _index: usize) -> Option<bool> {
        None
    }
}

/// A directory holding one `track{i}.wav` file per decoded track.
///
/// Missing files are absent tracks. Files that are not mono 16-bit integer
/// PCM, or that fail to read, are decode errors.
#[derive(Debug, Clone)]
pub struct WavTrackSource {
    dir: PathBuf,
}

impl WavTrackSource {
    /// Create a source over the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this source reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding track `index`.
    pub fn track_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("track{index}.wav"))
    }
}

impl TrackSource for WavTrackSource {
    fn decode_track(&self, index: usize) -> Result<Vec<i16>> {
        let path = self.track_path(index);
        let reader = hound::WavReader::open(&path)
            .map_err(|e| Error::decode(index, format!("{}: {e}", path.display())))?;

        let spec = reader.spec();
        if spec.channels != 1
            || spec.bits_per_sample != 16
            || spec.sample_format != hound::SampleFormat::Int
        {
            return Err(Error::decode(
                index,
                format!(
                    "{}: expected mono 16-bit PCM, found {} channel(s) at {} bits",
                    path.display(),
                    spec.channels,
                    spec.bits_per_sample
                ),
            ));
        }

        reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::decode(index, format!("{}: {e}", path.display())))
    }

    fn has_track(&self, index: usize) -> Option<bool> {
        Some(self.track_path(index).is_file())
    }
}
