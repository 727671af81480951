//! WAV encoding.
//!
//! Output is always RIFF/WAVE, PCM format tag 1, mono, 16-bit little-endian,
//! with the canonical 44-byte header. Downstream size checks depend on that
//! header length being exact.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use kf_core::{Error, Result};

/// Length of the RIFF header written in front of the sample data.
pub const WAV_HEADER_LEN: u64 = 44;

fn mono_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn wav_error(e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(source) => Error::Io { source },
        other => Error::Internal(format!("wav encoding failed: {other}")),
    }
}

/// Encode samples into an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(
        WAV_HEADER_LEN as usize + samples.len() * 2,
    ));
    {
        let mut writer = WavWriter::new(&mut cursor, mono_spec(sample_rate)).map_err(wav_error)?;
        for &sample in samples {
            writer.write_sample(sample).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(cursor.into_inner())
}

/// Write samples to a WAV file at `path`, replacing any existing file.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let mut writer = WavWriter::create(path, mono_spec(sample_rate)).map_err(wav_error)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    tracing::debug!(
        "wrote {} samples at {} Hz to {}",
        samples.len(),
        sample_rate,
        path.display()
    );
    Ok(())
}
