//! cpal-backed microphone capture.
//!
//! Samples are converted to 16-bit PCM in the stream callback and pushed
//! into the recorder's chunk sink. Pausing flips an atomic gate checked by
//! the callback, so the device stays open but nothing is buffered.
//! `finalize` wraps the concatenated PCM in a WAV container via hound.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use hound::{SampleFormat as WavFmt, WavSpec, WavWriter};

use super::{AudioPayload, CaptureBackend, ChunkSink};
use crate::error::{Error, Result};

/// An input device as reported by the audio host.
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// List all available audio input devices on the system.
///
/// # Errors
/// Returns an error if no audio input devices are found.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host
        .input_devices()
        .map_err(|e| Error::Device(e.to_string()))?
    {
        if let Ok(name) = device.name() {
            devices.push(InputDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            });
        }
    }

    if devices.is_empty() {
        return Err(Error::Device("no audio input devices found".into()));
    }

    Ok(devices)
}

/// Microphone capture via the system's default audio host.
pub struct CpalBackend {
    device_name: Option<String>,
    stream: Option<Stream>,
    capturing: Arc<AtomicBool>,
    wav_spec: Option<WavSpec>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            device_name: None,
            stream: None,
            capturing: Arc::new(AtomicBool::new(false)),
            wav_spec: None,
        }
    }

    /// Capture from a named device instead of the system default.
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    fn select_device(&self, host: &cpal::Host) -> Result<Device> {
        if let Some(want) = &self.device_name {
            let mut devices = host
                .input_devices()
                .map_err(|e| Error::Device(e.to_string()))?;
            return devices
                .find(|d| d.name().map(|n| &n == want).unwrap_or(false))
                .ok_or_else(|| Error::Device(format!("input device '{want}' not found")));
        }
        host.default_input_device()
            .ok_or_else(|| Error::Device("no input device available".into()))
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        capturing: Arc<AtomicBool>,
        sink: ChunkSink,
    ) -> Result<Stream> {
        let err_fn = |e| {
            crate::verbose!("audio stream error (non-fatal): {e}");
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _| {
                    if capturing.load(Ordering::SeqCst) {
                        sink.push(pcm_chunk(data.iter().copied()));
                    }
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                config,
                move |data: &[u16], _| {
                    if capturing.load(Ordering::SeqCst) {
                        sink.push(pcm_chunk(
                            data.iter().map(|&s| (s as i32 - 32768) as i16),
                        ));
                    }
                },
                err_fn,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _| {
                    if capturing.load(Ordering::SeqCst) {
                        sink.push(pcm_chunk(data.iter().map(|&s| {
                            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                        })));
                    }
                },
                err_fn,
                None,
            ),
            other => {
                return Err(Error::Device(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        };

        stream.map_err(classify_stream_error)
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for CpalBackend {
    fn open(&mut self, sink: ChunkSink) -> Result<()> {
        let host = cpal::default_host();
        let device = self.select_device(&host)?;

        let supported = device
            .default_input_config()
            .map_err(|e| Error::Device(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        self.wav_spec = Some(WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate.0,
            bits_per_sample: 16,
            sample_format: WavFmt::Int,
        });

        let stream = Self::build_stream(
            &device,
            &config,
            sample_format,
            Arc::clone(&self.capturing),
            sink,
        )?;
        stream.play().map_err(|e| Error::Device(e.to_string()))?;

        self.capturing.store(true, Ordering::SeqCst);
        self.stream = Some(stream);
        crate::verbose!(
            "capture open: {} Hz, {} channel(s), {sample_format:?}",
            config.sample_rate.0,
            config.channels
        );
        Ok(())
    }

    fn pause(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.capturing.store(true, Ordering::SeqCst);
    }

    fn close(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        // Dropping the stream releases the device.
        self.stream = None;
        Ok(())
    }

    fn abort(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
        self.stream = None;
    }

    fn finalize(&self, data: Vec<u8>) -> Result<AudioPayload> {
        let spec = self
            .wav_spec
            .ok_or_else(|| Error::Device("finalize called before capture".into()))?;

        let mut cursor = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Device(format!("WAV write failed: {e}")))?;
        for sample in data.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(|e| Error::Device(format!("WAV write failed: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Device(format!("WAV write failed: {e}")))?;

        Ok(AudioPayload {
            bytes: cursor.into_inner(),
            mime_type: "audio/wav",
            file_name: "recording.wav".into(),
        })
    }
}

/// Little-endian 16-bit PCM bytes for one callback's worth of samples.
fn pcm_chunk(samples: impl Iterator<Item = i16>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.size_hint().0 * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

fn classify_stream_error(e: cpal::BuildStreamError) -> Error {
    classify_message(e.to_string())
}

/// Permission denials surface as backend-specific build errors on most
/// hosts, so classification is by message.
fn classify_message(message: String) -> Error {
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") {
        Error::Permission(message)
    } else {
        Error::Device(message)
    }
}
