//! Realtime audio output

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("No audio output devices found")]
    NoDevices,
    #[error("Failed to get default output config: {0}")]
    ConfigError(String),
    #[error("Failed to build output stream: {0}")]
    StreamError(String),
    #[error("Playback failed: {0}")]
    PlaybackError(String),
}

/// Name, sample rate and channel count of the default output device
#[derive(Debug, Clone)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

fn default_device() -> Result<(cpal::Device, cpal::SupportedStreamConfig), AudioOutputError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioOutputError::NoDevices)?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioOutputError::ConfigError(e.to_string()))?;
    Ok((device, config))
}

pub fn default_output_device_info() -> Result<OutputDeviceInfo, AudioOutputError> {
    let (device, config) = default_device()?;
    Ok(OutputDeviceInfo {
        name: device.name().unwrap_or_default(),
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    })
}

/// Output stream that pulls interleaved f32 frames from a callback
pub struct RealtimeOutputStream {
    stop_flag: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl RealtimeOutputStream {
    /// Open the default device; `sample_callback(buffer, sample_rate, channels)`
    /// fills each interleaved buffer
    pub fn start<F>(sample_callback: F) -> Result<Self, AudioOutputError>
    where
        F: FnMut(&mut [f32], u32, u16) + Send + 'static,
    {
        let (device, supported_config) = default_device()?;

        if supported_config.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioOutputError::ConfigError(format!(
                "unsupported sample format {:?}",
                supported_config.sample_format()
            )));
        }

        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let config: StreamConfig = supported_config.into();
        let callback = Arc::new(Mutex::new(sample_callback));

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if stop_clone.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    let Ok(mut cb) = callback.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    cb(data, sample_rate, channels);
                },
                move |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioOutputError::PlaybackError(e.to_string()))?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "Started realtime output stream"
        );

        Ok(Self { stop_flag, sample_rate, channels, _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Output silence from now on; the device stays open until drop
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Drop for RealtimeOutputStream {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}
