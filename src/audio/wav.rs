use log::{info, warn};
use std::path::Path;

use super::capture::{BlockRead, CaptureSource};
use crate::error::SessionError;

/// Block source backed by a WAV file, decoded to mono up front
pub struct WavCapture {
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
}

impl WavCapture {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| SessionError::Device(format!("{}: {}", path.display(), e)))?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(SessionError::device)?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(SessionError::device)?
            }
        };

        let capture = Self::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate);
        if capture.is_empty() {
            warn!("{} contains no audio frames", path.display());
        } else {
            info!(
                "Loaded {} frames at {} Hz from {}",
                capture.len(),
                capture.sample_rate,
                path.display()
            );
        }
        Ok(capture)
    }

    /// Build from interleaved samples, averaging channels to mono
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Self {
            samples,
            position: 0,
            sample_rate,
        }
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl CaptureSource for WavCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_block(&mut self, block: &mut [f32]) -> Result<BlockRead, SessionError> {
        if self.position >= self.samples.len() {
            return Ok(BlockRead::Finished);
        }

        // The final partial block is zero padded
        let available = (self.samples.len() - self.position).min(block.len());
        block[..available].copy_from_slice(&self.samples[self.position..self.position + available]);
        block[available..].iter_mut().for_each(|s| *s = 0.0);
        self.position += available;

        Ok(BlockRead::Ready { overflows: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_downmix_and_blocks() {
        let interleaved = [1.0, 0.0, 0.5, 0.5, -1.0, 0.0];
        let mut capture = WavCapture::from_interleaved(&interleaved, 2, 8000);
        assert_eq!(capture.len(), 3);

        let mut block = [9.0; 2];
        assert_eq!(capture.read_block(&mut block).unwrap(), BlockRead::Ready { overflows: 0 });
        assert_eq!(block, [0.5, 0.5]);

        assert_eq!(capture.read_block(&mut block).unwrap(), BlockRead::Ready { overflows: 0 });
        assert_eq!(block, [-0.5, 0.0]);

        assert_eq!(capture.read_block(&mut block).unwrap(), BlockRead::Finished);
    }

    #[test]
    fn test_reads_int_wav_file() {
        let path = env::temp_dir().join(format!("stylomidi-wav-{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for sample in [i16::MAX, 0, i16::MIN / 2] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let mut capture = WavCapture::open(&path).unwrap();
        assert_eq!(capture.sample_rate(), 22050);

        let mut block = [0.0; 4];
        capture.read_block(&mut block).unwrap();
        assert!((block[0] - 1.0).abs() < 0.001);
        assert_eq!(block[1], 0.0);
        assert!((block[2] + 0.5).abs() < 0.001);
        assert_eq!(block[3], 0.0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_empty_wav_file_finishes_immediately() {
        let path = env::temp_dir().join(format!("stylomidi-empty-{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        hound::WavWriter::create(&path, spec).unwrap().finalize().unwrap();

        let mut capture = WavCapture::open(&path).unwrap();
        assert!(capture.is_empty());
        assert_eq!(capture.len(), 0);

        let mut block = [0.0; 4];
        assert_eq!(capture.read_block(&mut block).unwrap(), BlockRead::Finished);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_device_error() {
        let err = WavCapture::open("/definitely/not/here.wav").err().unwrap();
        assert!(matches!(err, SessionError::Device(_)));
    }
}
