//! In-memory PCM audio and WAV file I/O.
//!
//! The pipeline works on mono 16-bit PCM throughout: the converter stage
//! normalizes whatever arrives into this shape, and everything downstream
//! (segmentation, chunk export) slices it by millisecond offsets.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur reading or writing audio
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to read WAV {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("failed to write WAV {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("unsupported WAV layout in {path}: {detail}")]
    Unsupported { path: String, detail: String },
}

/// A mono PCM buffer with a known sample rate and duration.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in milliseconds, rounded up so no trailing samples fall
    /// outside the final chunk.
    pub fn duration_ms(&self) -> u64 {
        let rate = u64::from(self.sample_rate.max(1));
        let len = self.samples.len() as u64;
        (len * 1000).div_ceil(rate)
    }

    /// Sample index for a millisecond offset, clamped to the buffer.
    pub fn sample_at(&self, ms: u64) -> usize {
        let rate = u64::from(self.sample_rate);
        let idx = ms.saturating_mul(rate) / 1000;
        (idx as usize).min(self.samples.len())
    }

    /// Copy out the samples covering `[start_ms, end_ms)`, clamped to the
    /// buffer's bounds.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> PcmAudio {
        let a = self.sample_at(start_ms);
        let b = self.sample_at(end_ms.max(start_ms));
        PcmAudio::new(self.samples[a..b].to_vec(), self.sample_rate)
    }
}

/// Root-mean-square level of a frame, normalized to `0.0..=1.0`.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = f64::from(sample) / f64::from(i16::MAX);
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Frame loudness in dBFS. Digital silence is negative infinity.
pub fn dbfs(samples: &[i16]) -> f32 {
    let level = rms(samples);
    if level <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * level.log10()
    }
}

/// Read a PCM WAV file, downmixing multi-channel audio to mono by
/// averaging.
pub fn read_wav(path: &Path) -> Result<PcmAudio, AudioError> {
    let display = path.display().to_string();
    let mut reader = hound::WavReader::open(path).map_err(|e| AudioError::Read {
        path: display.clone(),
        source: e,
    })?;

    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample > 16 {
        return Err(AudioError::Unsupported {
            path: display,
            detail: format!(
                "{}-bit {:?} samples, expected 16-bit integer PCM",
                spec.bits_per_sample, spec.sample_format
            ),
        });
    }

    let raw: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AudioError::Read {
            path: display,
            source: e,
        })?;

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        raw
    } else {
        raw.chunks(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    };

    Ok(PcmAudio::new(samples, spec.sample_rate))
}

/// Write a buffer as 16-bit mono PCM WAV.
pub fn write_wav(path: &Path, audio: &PcmAudio) -> Result<(), AudioError> {
    let display = path.display().to_string();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| AudioError::Write {
        path: display.clone(),
        source: e,
    })?;

    for &sample in &audio.samples {
        writer.write_sample(sample).map_err(|e| AudioError::Write {
            path: display.clone(),
            source: e,
        })?;
    }

    writer.finalize().map_err(|e| AudioError::Write {
        path: display,
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_duration_rounds_up() {
        let audio = PcmAudio::new(vec![0; 8000], 8000);
        assert_eq!(audio.duration_ms(), 1000);

        let audio = PcmAudio::new(vec![0; 8001], 8000);
        assert_eq!(audio.duration_ms(), 1001);
    }

    #[test]
    fn test_slice_ms_clamps() {
        let audio = PcmAudio::new((0..8000).map(|i| i as i16).collect(), 8000);

        let piece = audio.slice_ms(250, 500);
        assert_eq!(piece.samples.len(), 2000);
        assert_eq!(piece.samples[0], 2000);

        let past_end = audio.slice_ms(900, 5000);
        assert_eq!(past_end.samples.len(), 800);

        let inverted = audio.slice_ms(500, 500);
        assert!(inverted.samples.is_empty());
    }

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(rms(&vec![0i16; 1000]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_full_scale() {
        let full = vec![i16::MAX; 1000];
        assert!((rms(&full) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_dbfs_silence_is_negative_infinity() {
        assert_eq!(dbfs(&vec![0i16; 100]), f32::NEG_INFINITY);
    }

    #[test]
    fn test_dbfs_of_loud_tone_is_high() {
        let loud = vec![8000i16; 1000];
        let level = dbfs(&loud);
        assert!(level > -40.0, "expected above -40 dBFS, got {}", level);

        let quiet = vec![10i16; 1000];
        assert!(dbfs(&quiet) < -40.0);
    }

    #[test]
    fn test_wav_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tone.wav");

        let original = PcmAudio::new((0..4000).map(|i| (i % 255) as i16).collect(), 8000);
        write_wav(&path, &original).unwrap();

        let loaded = read_wav(&path).unwrap();
        assert_eq!(loaded.sample_rate, 8000);
        assert_eq!(loaded.samples, original.samples);
    }

    #[test]
    fn test_read_wav_downmixes_stereo() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stereo.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(1000i16).unwrap();
            writer.write_sample(3000i16).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = read_wav(&path).unwrap();
        assert_eq!(loaded.samples.len(), 100);
        assert!(loaded.samples.iter().all(|&s| s == 2000));
    }
}
