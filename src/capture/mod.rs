//! Microphone capture behind the [`CaptureHandle`] capability.
//!
//! The controller only sees [`CaptureHandle`]: `begin()` arms the
//! microphone, `end()` disarms it and returns the take as WAV bytes (an
//! empty vec means nothing was captured).
//!
//! [`MicCapture`] implements the capability with `cpal`.  A `cpal::Stream`
//! is not `Send`, so the stream lives on a dedicated worker thread that the
//! handle talks to over an mpsc command channel, mirroring how the hotkey
//! listener isolates its OS thread.  Samples are accumulated at the device's
//! native rate, downmixed to mono, and encoded as 16-bit PCM WAV with
//! `hound` — the transcription endpoint accepts any WAV rate, so no
//! resampling happens here.

use std::io::Cursor;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while arming or draining the microphone.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to encode WAV: {0}")]
    Encode(String),

    #[error("capture worker unavailable: {0}")]
    Worker(String),
}

// ---------------------------------------------------------------------------
// CaptureHandle
// ---------------------------------------------------------------------------

/// Capability consumed by the session controller.
///
/// `begin` and `end` are short, bounded calls (stream setup/teardown); the
/// actual capture duration is bounded by the user holding the chord.
pub trait CaptureHandle: Send + Sync {
    /// Arm the microphone and start accumulating samples.
    fn begin(&self) -> Result<(), CaptureError>;

    /// Disarm the microphone and return the take as WAV bytes.
    ///
    /// An empty vec means nothing was captured (too-short hold, dead mic).
    fn end(&self) -> Result<Vec<u8>, CaptureError>;
}

// ---------------------------------------------------------------------------
// MicCapture
// ---------------------------------------------------------------------------

enum CaptureCmd {
    Begin(mpsc::Sender<Result<(), CaptureError>>),
    End(mpsc::Sender<Result<Vec<u8>, CaptureError>>),
}

/// `cpal`-backed microphone capture.
///
/// Construct once at startup; clone-free sharing via `Arc<dyn CaptureHandle>`.
pub struct MicCapture {
    cmd_tx: mpsc::Sender<CaptureCmd>,
}

impl MicCapture {
    /// Spawn the capture worker thread.
    ///
    /// `device_name` selects an input device by case-insensitive substring
    /// match; `None` (or no match, with a warning) uses the system default.
    /// Device resolution is deferred to each `begin` so an unplugged
    /// microphone surfaces as a per-session [`CaptureError`], not a startup
    /// failure.
    pub fn start(device_name: Option<String>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<CaptureCmd>();

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || capture_worker(cmd_rx, device_name))
            .expect("failed to spawn mic-capture thread");

        Self { cmd_tx }
    }
}

impl CaptureHandle for MicCapture {
    fn begin(&self) -> Result<(), CaptureError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(CaptureCmd::Begin(reply_tx))
            .map_err(|e| CaptureError::Worker(e.to_string()))?;
        reply_rx
            .recv()
            .map_err(|e| CaptureError::Worker(e.to_string()))?
    }

    fn end(&self) -> Result<Vec<u8>, CaptureError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(CaptureCmd::End(reply_tx))
            .map_err(|e| CaptureError::Worker(e.to_string()))?;
        reply_rx
            .recv()
            .map_err(|e| CaptureError::Worker(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Worker thread
// ---------------------------------------------------------------------------

/// State held by the worker while a take is in progress.
struct ActiveTake {
    // The stream must be dropped on this thread to stop the hardware.
    _stream: cpal::Stream,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    channels: u16,
}

fn capture_worker(cmd_rx: mpsc::Receiver<CaptureCmd>, device_name: Option<String>) {
    let mut active: Option<ActiveTake> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            CaptureCmd::Begin(reply) => {
                if active.is_some() {
                    // Controller guards against double-activation; a stray
                    // Begin while armed keeps the current take.
                    let _ = reply.send(Ok(()));
                    continue;
                }
                match open_stream(device_name.as_deref()) {
                    Ok(take) => {
                        active = Some(take);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            CaptureCmd::End(reply) => {
                let result = match active.take() {
                    Some(take) => {
                        let samples = std::mem::take(&mut *take.samples.lock().unwrap());
                        if samples.is_empty() {
                            Ok(Vec::new())
                        } else {
                            encode_wav(&samples, take.sample_rate, take.channels)
                        }
                    }
                    // End without a matching Begin yields an empty take.
                    None => Ok(Vec::new()),
                };
                let _ = reply.send(result);
            }
        }
    }
}

fn open_stream(device_name: Option<&str>) -> Result<ActiveTake, CaptureError> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => find_input_device(&host, name).ok_or(CaptureError::NoDevice),
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
    }?;

    let supported = device.default_input_config()?;
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let samples = Arc::new(Mutex::new(Vec::<f32>::new()));
    let samples_cb = Arc::clone(&samples);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            samples_cb.lock().unwrap().extend_from_slice(data);
        },
        |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        },
        None,
    )?;

    stream.play()?;

    Ok(ActiveTake {
        _stream: stream,
        samples,
        sample_rate,
        channels,
    })
}

/// Pick an input device by case-insensitive substring match on its name.
///
/// Falls back to the default input device (with a warning) when no device
/// matches, like the device resolution of the audio recorder this replaces.
fn find_input_device(host: &cpal::Host, name: &str) -> Option<cpal::Device> {
    let want = name.to_lowercase();

    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if let Ok(dev_name) = device.name() {
                if dev_name.to_lowercase().contains(&want) {
                    return Some(device);
                }
            }
        }
    }

    log::warn!("input device matching {name:?} not found, using default");
    host.default_input_device()
}

// ---------------------------------------------------------------------------
// WAV encoding
// ---------------------------------------------------------------------------

/// Downmix interleaved samples to mono and encode 16-bit PCM WAV.
fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, CaptureError> {
    let mono = downmix_to_mono(samples, channels);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        for s in &mono {
            let clamped = s.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .map_err(|e| CaptureError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Average interleaved channels into a mono signal.
fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_stereo_averages_pairs() {
        let stereo = vec![0.5, -0.5, 1.0, 0.0];
        let mono = downmix_to_mono(&stereo, 2);
        assert_eq!(mono, vec![0.0, 0.5]);
    }

    #[test]
    fn downmix_mono_is_identity() {
        let mono = vec![0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&mono, 1), mono);
    }

    #[test]
    fn encode_wav_produces_riff_header() {
        let samples = vec![0.0_f32; 160];
        let bytes = encode_wav(&samples, 16_000, 1).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(bytes.len(), 44 + 160 * 2);
    }

    #[test]
    fn encode_wav_clamps_out_of_range_samples() {
        let samples = vec![2.0_f32, -2.0];
        let bytes = encode_wav(&samples, 8_000, 1).unwrap();
        assert!(!bytes.is_empty());
    }
}
