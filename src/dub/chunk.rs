//! Splitting long WAV extracts into pieces small enough for one upload.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, info};

use crate::error::{RedubError, Result};

/// Longest piece sent in a single request.
pub const MAX_CHUNK_SECS: u64 = 600;

/// Room left for the RIFF header, which grows for extensible formats.
const HEADER_RESERVE: u64 = 1024;

/// Frames per piece so that each file stays under `max_bytes` and
/// [`MAX_CHUNK_SECS`].
pub fn frames_per_chunk(spec: &WavSpec, max_bytes: u64) -> u64 {
    let frame_bytes =
        u64::from(spec.channels) * u64::from(spec.bits_per_sample).div_ceil(8);
    let by_size = max_bytes.saturating_sub(HEADER_RESERVE) / frame_bytes.max(1);
    let by_time = u64::from(spec.sample_rate) * MAX_CHUNK_SECS;
    by_size.min(by_time).max(1)
}

fn wav_error(path: &Path, e: hound::Error) -> RedubError {
    RedubError::Transcription(format!("cannot split {}: {e}", path.display()))
}

/// Cut `audio` into consecutive WAV files in `dir`, in playback order.
///
/// Every piece keeps the source format. Only integer PCM is supported, which
/// is what the extract stage writes.
pub fn split_wav(audio: &Path, dir: &Path, max_bytes: u64) -> Result<Vec<PathBuf>> {
    let mut reader = WavReader::open(audio).map_err(|e| wav_error(audio, e))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int {
        return Err(RedubError::Transcription(format!(
            "cannot split {}: float samples",
            audio.display()
        )));
    }

    let samples_per_chunk = frames_per_chunk(&spec, max_bytes) * u64::from(spec.channels);
    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    debug!(
        "Splitting {:?} ({} Hz, {} ch) every {} samples",
        audio, spec.sample_rate, spec.channels, samples_per_chunk
    );

    let mut chunks = Vec::new();
    let mut writer = None;
    let mut written = 0u64;
    for sample in reader.samples::<i32>() {
        let sample = sample.map_err(|e| wav_error(audio, e))?;
        if writer.is_none() {
            let path = dir.join(format!("{stem}_chunk{:03}.wav", chunks.len() + 1));
            writer = Some(WavWriter::create(&path, spec).map_err(|e| wav_error(&path, e))?);
            chunks.push(path);
        }
        if let Some(w) = writer.as_mut() {
            w.write_sample(sample).map_err(|e| wav_error(audio, e))?;
        }
        written += 1;
        if written == samples_per_chunk {
            if let Some(w) = writer.take() {
                w.finalize().map_err(|e| wav_error(audio, e))?;
            }
            written = 0;
        }
    }
    if let Some(w) = writer.take() {
        w.finalize().map_err(|e| wav_error(audio, e))?;
    }

    info!("Split {:?} into {} piece(s)", audio, chunks.len());
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_16k() -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    fn write_wav(path: &Path, spec: WavSpec, samples: &[i16]) {
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_frames_per_chunk_limits() {
        let spec = mono_16k();
        // 25 MB of 16-bit mono is longer than ten minutes.
        assert_eq!(frames_per_chunk(&spec, 25 * 1024 * 1024), 16_000 * MAX_CHUNK_SECS);
        assert_eq!(frames_per_chunk(&spec, HEADER_RESERVE + 200), 100);

        let stereo = WavSpec { channels: 2, ..spec };
        assert_eq!(frames_per_chunk(&stereo, HEADER_RESERVE + 200), 50);
        assert_eq!(frames_per_chunk(&spec, 10), 1);
    }

    #[test]
    fn test_split_keeps_every_sample_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("extract.wav");
        let samples: Vec<i16> = (0..250).collect();
        write_wav(&source, mono_16k(), &samples);

        // 100 frames per piece.
        let chunks = split_wav(&source, dir.path(), HEADER_RESERVE + 200).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].ends_with("extract_chunk001.wav"));

        let mut joined = Vec::new();
        let mut lengths = Vec::new();
        for chunk in &chunks {
            let mut reader = WavReader::open(chunk).unwrap();
            assert_eq!(reader.spec(), mono_16k());
            let part: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
            lengths.push(part.len());
            joined.extend(part);
        }
        assert_eq!(lengths, vec![100, 100, 50]);
        assert_eq!(joined, samples);
    }

    #[test]
    fn test_split_rejects_float_samples() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("float.wav");
        let spec = WavSpec {
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
            ..mono_16k()
        };
        let mut writer = WavWriter::create(&source, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        assert!(split_wav(&source, dir.path(), 1 << 20).is_err());
    }
}
