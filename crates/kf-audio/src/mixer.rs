//! Multi-track mixing.
//!
//! Tracks are summed positionally into an `i32` accumulator, hard-clipped to
//! the `i16` range, and then uniformly attenuated when the clipped peak
//! exceeds [`LIMITER_THRESHOLD`]. Quiet material passes through untouched.

use kf_core::Result;

use crate::selector::TrackSelector;
use crate::source::TrackSource;

/// Peak above which the soft limiter scales the whole mix down to this level.
pub const LIMITER_THRESHOLD: i32 = 30_000;

/// A single mono track of signed 16-bit samples at a declared sample rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedTrack {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// The minimally valid buffer handed out when there is nothing to play.
fn silence() -> Vec<i16> {
    vec![0]
}

/// Mix already-decoded tracks.
///
/// Empty tracks are skipped. With no surviving track the result is a single
/// silent sample. The output length is the length of the longest track.
pub fn mix_decoded<I>(tracks: I) -> Vec<i16>
where
    I: IntoIterator,
    I::Item: AsRef<[i16]>,
{
    let mut acc: Vec<i32> = Vec::new();
    let mut any = false;

    for track in tracks {
        let track = track.as_ref();
        if track.is_empty() {
            continue;
        }
        any = true;
        if track.len() > acc.len() {
            acc.resize(track.len(), 0);
        }
        for (slot, &sample) in acc.iter_mut().zip(track) {
            *slot += i32::from(sample);
        }
    }

    if !any {
        return silence();
    }

    let mut mixed: Vec<i16> = acc
        .into_iter()
        .map(|v| v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16)
        .collect();
    apply_limiter(&mut mixed);
    mixed
}

/// Scale every sample by `LIMITER_THRESHOLD / peak` when the peak is above
/// the threshold. Products are truncated toward zero.
fn apply_limiter(samples: &mut [i16]) {
    let peak = samples
        .iter()
        .map(|&s| i32::from(s).abs())
        .max()
        .unwrap_or(0);
    if peak <= LIMITER_THRESHOLD {
        return;
    }

    let gain = LIMITER_THRESHOLD as f32 / peak as f32;
    tracing::trace!("limiter engaged: peak {peak}, gain {gain:.4}");
    for sample in samples.iter_mut() {
        *sample = (f32::from(*sample) * gain) as i16;
    }
}

/// Mix every track the source offers.
///
/// A track is skipped when the source reports it absent, when it decodes to
/// nothing, or when decoding fails. One bad track never aborts the mix.
pub fn mix_tracks(source: &dyn TrackSource) -> Vec<i16> {
    let mut tracks = Vec::new();

    for index in 0..source.track_count() {
        if source.has_track(index) == Some(false) {
            continue;
        }
        match source.decode_track(index) {
            Ok(track) if !track.is_empty() => tracks.push(track),
            Ok(_) => tracing::debug!("track {index} is empty; skipping"),
            Err(e) => tracing::warn!("skipping undecodable track {index}: {e}"),
        }
    }

    tracing::debug!("mixing {} track(s)", tracks.len());
    mix_decoded(tracks)
}

/// Extract one track unchanged. An empty track becomes a single silent
/// sample.
///
/// # Errors
///
/// Returns the source's decode error; unlike the mix path there is nothing
/// to fall back on.
pub fn extract_track(source: &dyn TrackSource, index: usize) -> Result<Vec<i16>> {
    let track = source.decode_track(index)?;
    if track.is_empty() {
        return Ok(silence());
    }
    Ok(track)
}

/// Render the selected audio from a source at a fixed sample rate.
pub fn render(
    source: &dyn TrackSource,
    selector: TrackSelector,
    sample_rate: u32,
) -> Result<MixedTrack> {
    let samples = match selector {
        TrackSelector::Mix => mix_tracks(source),
        TrackSelector::Track(index) => extract_track(source, index)?,
    };
    Ok(MixedTrack {
        samples,
        sample_rate,
    })
}
