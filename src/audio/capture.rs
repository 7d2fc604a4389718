//! Audio input capture
//!
//! The device callback pushes mono chunks into a bounded channel and the
//! session worker pulls fixed-size blocks out of it with a blocking read.
//! A full channel drops the chunk and counts an overflow instead of stalling
//! the audio thread.

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::devices::find_device;
use crate::error::SessionError;

/// Chunks buffered between the device callback and the worker
const CHUNK_QUEUE: usize = 64;
/// Longest a single read waits before handing control back to the loop
const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Outcome of one block read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRead {
    /// The block was filled; `overflows` chunks were dropped since the last read
    Ready { overflows: u64 },
    /// Not enough samples yet, try again
    Pending,
    /// The source is exhausted
    Finished,
}

/// Blocking, fixed-size block source
pub trait CaptureSource {
    fn sample_rate(&self) -> u32;

    /// Fill `block` completely, or report why not
    fn read_block(&mut self, block: &mut [f32]) -> Result<BlockRead, SessionError>;
}

/// Live capture from a cpal input device
/// Must stay on the thread that opened it
pub struct CpalCapture {
    _stream: Stream,
    chunks: Receiver<Vec<f32>>,
    errors: Receiver<String>,
    overflows: Arc<AtomicU64>,
    pending: Vec<f32>,
    sample_rate: u32,
}

impl CpalCapture {
    /// Open an input device by index or name substring, or the default one
    pub fn open(search: Option<&str>, sample_rate: u32) -> Result<Self, SessionError> {
        let host = cpal::default_host();
        let device = match search {
            Some(search) => {
                let names = list_input_devices().map_err(SessionError::device)?;
                let index = find_device(&names, search, "Audio input").map_err(SessionError::device)?;
                host.input_devices()
                    .map_err(SessionError::device)?
                    .nth(index)
                    .ok_or_else(|| SessionError::Device("Selected audio device not available".to_string()))?
            }
            None => host
                .default_input_device()
                .ok_or_else(|| SessionError::Device("No input device available".to_string()))?,
        };

        Self::open_device(&device, sample_rate)
    }

    fn open_device(device: &Device, sample_rate: u32) -> Result<Self, SessionError> {
        let default = device.default_input_config().map_err(SessionError::device)?;

        // Prefer the requested rate in the device's native sample format
        let requested = device.supported_input_configs().ok().and_then(|mut ranges| {
            ranges
                .find(|range| {
                    range.sample_format() == default.sample_format()
                        && range.min_sample_rate() <= sample_rate
                        && sample_rate <= range.max_sample_rate()
                })
                .map(|range| range.with_sample_rate(sample_rate))
        });

        let supported = match requested {
            Some(config) => config,
            None => {
                warn!(
                    "Input device does not support {} Hz, using {} Hz",
                    sample_rate,
                    default.sample_rate()
                );
                default
            }
        };

        let name = device
            .description()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|_| "Unknown".to_string());
        info!("Input device: {} ({:?})", name, supported);

        let actual_rate = supported.sample_rate();
        let channels = supported.channels() as usize;
        let config: StreamConfig = supported.config();

        let (chunk_tx, chunks) = bounded(CHUNK_QUEUE);
        let (error_tx, errors) = bounded(4);
        let overflows = Arc::new(AtomicU64::new(0));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                build_stream::<f32>(device, &config, channels, chunk_tx, error_tx, overflows.clone())?
            }
            SampleFormat::I16 => {
                build_stream::<i16>(device, &config, channels, chunk_tx, error_tx, overflows.clone())?
            }
            SampleFormat::I32 => {
                build_stream::<i32>(device, &config, channels, chunk_tx, error_tx, overflows.clone())?
            }
            SampleFormat::U16 => {
                build_stream::<u16>(device, &config, channels, chunk_tx, error_tx, overflows.clone())?
            }
            other => {
                return Err(SessionError::Device(format!("Unsupported sample format {:?}", other)));
            }
        };

        stream.play().map_err(SessionError::device)?;

        Ok(Self {
            _stream: stream,
            chunks,
            errors,
            overflows,
            pending: Vec::new(),
            sample_rate: actual_rate,
        })
    }
}

impl CaptureSource for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_block(&mut self, block: &mut [f32]) -> Result<BlockRead, SessionError> {
        if let Ok(message) = self.errors.try_recv() {
            return Err(SessionError::Device(message));
        }

        while self.pending.len() < block.len() {
            match self.chunks.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(BlockRead::Pending),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SessionError::Device("Audio stream closed".to_string()));
                }
            }
        }

        block.copy_from_slice(&self.pending[..block.len()]);
        self.pending.drain(..block.len());

        Ok(BlockRead::Ready {
            overflows: self.overflows.swap(0, Ordering::Relaxed),
        })
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    chunk_tx: Sender<Vec<f32>>,
    error_tx: Sender<String>,
    overflows: Arc<AtomicU64>,
) -> Result<Stream, SessionError>
where
    T: Sample + cpal::SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = channels.max(1);
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Downmix interleaved frames to mono
                let chunk: Vec<f32> = data
                    .chunks(channels)
                    .map(|frame| {
                        frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / frame.len() as f32
                    })
                    .collect();

                if let Err(TrySendError::Full(_)) = chunk_tx.try_send(chunk) {
                    overflows.fetch_add(1, Ordering::Relaxed);
                }
            },
            move |err| {
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    let _ = error_tx.try_send(err.to_string());
                } else {
                    warn!("Audio stream error: {}", err);
                }
            },
            None,
        )
        .map_err(SessionError::device)?;

    Ok(stream)
}

/// List available audio input devices
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .input_devices()?
        .filter_map(|device| {
            device.description()
                .ok()
                .map(|desc| desc.name().to_string())
        })
        .collect();

    Ok(devices)
}
