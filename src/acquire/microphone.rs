//! Microphone capture using cpal
//!
//! Builds an input stream on a dedicated worker thread (cpal streams are
//! not Send) and pushes interleaved stereo i16 samples. Any native sample
//! format is normalized in the callback; 48 kHz is preferred when the
//! device supports it.

use crate::acquire::traits::{classify_device_error, AcquireError, AudioDeviceInfo, AudioTrack};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Preferred capture rate; devices that cannot do 48 kHz fall back to
/// their default configuration and the actual rate travels on the track.
const PREFERRED_SAMPLE_RATE: u32 = 48_000;

/// Get list of available audio input devices (microphones)
pub fn list_microphones() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                Some(AudioDeviceInfo {
                    id: name.clone(),
                    is_default: Some(&name) == default_name.as_ref(),
                    name,
                })
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate audio inputs: {:?}", e);
            Vec::new()
        }
    }
}

fn pick_config(device: &cpal::Device) -> Option<(StreamConfig, SampleFormat)> {
    // Prefer a config range that covers 48 kHz, native i16 first
    if let Ok(ranges) = device.supported_input_configs() {
        let mut chosen: Option<(StreamConfig, SampleFormat)> = None;
        for range in ranges {
            let min = range.min_sample_rate().0;
            let max = range.max_sample_rate().0;
            if range.channels() >= 1 && min <= PREFERRED_SAMPLE_RATE && max >= PREFERRED_SAMPLE_RATE
            {
                let sc = range.with_sample_rate(cpal::SampleRate(PREFERRED_SAMPLE_RATE));
                let fmt = sc.sample_format();
                chosen = Some((sc.config(), fmt));
                if fmt == SampleFormat::I16 {
                    break;
                }
            }
        }
        if chosen.is_some() {
            return chosen;
        }
    }

    device
        .default_input_config()
        .ok()
        .map(|cfg| (cfg.config(), cfg.sample_format()))
}

/// Normalize one interleaved input buffer to stereo i16
fn normalize_i16(data: &[i16], channels: usize) -> Vec<i16> {
    let frames = data.len() / channels.max(1);
    let mut out = Vec::with_capacity(frames * 2);
    if channels <= 1 {
        for &s in data {
            out.push(s);
            out.push(s);
        }
    } else {
        for f in 0..frames {
            out.push(data[f * channels]);
            out.push(data[f * channels + 1]);
        }
    }
    out
}

fn normalize_f32(data: &[f32], channels: usize) -> Vec<i16> {
    let to_i16 = |x: f32| (x.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
    let converted: Vec<i16> = data.iter().map(|&s| to_i16(s)).collect();
    normalize_i16(&converted, channels)
}

fn normalize_u16(data: &[u16], channels: usize) -> Vec<i16> {
    let to_i16 = |x: u16| (x as i32 - 32_768) as i16;
    let converted: Vec<i16> = data.iter().map(|&s| to_i16(s)).collect();
    normalize_i16(&converted, channels)
}

struct MicMeta {
    sample_rate: u32,
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    tx: Sender<Vec<i16>>,
    live: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let channels = config.channels as usize;
    let err_fn = |err| tracing::warn!("Microphone stream error: {}", err);

    match format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _| {
                if !live.load(Ordering::SeqCst) || data.is_empty() {
                    return;
                }
                let _ = tx.send(normalize_i16(data, channels));
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _| {
                if !live.load(Ordering::SeqCst) || data.is_empty() {
                    return;
                }
                let _ = tx.send(normalize_u16(data, channels));
            },
            err_fn,
            None,
        ),
        _ => device.build_input_stream(
            config,
            move |data: &[f32], _| {
                if !live.load(Ordering::SeqCst) || data.is_empty() {
                    return;
                }
                let _ = tx.send(normalize_f32(data, channels));
            },
            err_fn,
            None,
        ),
    }
}

/// Open the microphone and stream samples until `live` flips false
pub(crate) fn start_microphone_worker(
    device_id: Option<String>,
    live: Arc<AtomicBool>,
) -> Result<(AudioTrack, JoinHandle<()>), AcquireError> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<MicMeta, AcquireError>>();
    let (sample_tx, sample_rx) = mpsc::channel::<Vec<i16>>();
    let live_cb = live.clone();

    let handle = std::thread::spawn(move || {
        let host = cpal::default_host();
        let device = match &device_id {
            Some(id) => host
                .input_devices()
                .ok()
                .and_then(|mut it| it.find(|d| d.name().ok().as_deref() == Some(id.as_str()))),
            None => host.default_input_device(),
        };

        let Some(device) = device else {
            let _ = ready_tx.send(Err(AcquireError::DeviceUnavailable(format!(
                "microphone not found: {}",
                device_id.as_deref().unwrap_or("default")
            ))));
            return;
        };

        let Some((config, format)) = pick_config(&device) else {
            let _ = ready_tx.send(Err(AcquireError::DeviceUnavailable(
                "microphone has no usable input configuration".to_string(),
            )));
            return;
        };

        let sample_rate = config.sample_rate.0;
        let stream = match build_stream(&device, &config, format, sample_tx, live_cb.clone()) {
            Ok(s) => s,
            Err(e) => {
                let _ = ready_tx.send(Err(classify_device_error("microphone", e.to_string())));
                return;
            }
        };
        if let Err(e) = stream.play() {
            let _ = ready_tx.send(Err(classify_device_error("microphone", e.to_string())));
            return;
        }

        tracing::info!(
            "Microphone opened: {} Hz, {:?} ({} ch -> stereo i16)",
            sample_rate,
            format,
            config.channels
        );
        if ready_tx.send(Ok(MicMeta { sample_rate })).is_err() {
            return;
        }

        // The stream delivers samples from its own audio thread; this
        // thread only keeps it alive until release.
        while live_cb.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(50));
        }
        drop(stream);
        tracing::info!("Microphone worker stopped");
    });

    let meta = ready_rx.recv_timeout(OPEN_TIMEOUT).map_err(|_| {
        AcquireError::DeviceUnavailable("microphone worker did not start".to_string())
    })??;

    Ok((
        AudioTrack {
            samples: sample_rx,
            sample_rate: meta.sample_rate,
            channels: 2,
        },
        handle,
    ))
}
