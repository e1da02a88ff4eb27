//! Audio outputs: real-time playback through cpal, or an offline sink

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

use super::graph::AudioGraph;
use super::EngineError;

/// A sink that pulls samples from the graph
pub trait AudioOutput {
    /// Attach to the graph. The output starts suspended.
    fn open(&mut self, graph: Arc<Mutex<AudioGraph>>) -> Result<(), EngineError>;

    /// Start (or restart) pulling samples
    fn resume(&mut self) -> Result<(), EngineError>;

    /// Stop pulling samples; the graph clock stands still
    fn suspend(&mut self) -> Result<(), EngineError>;

    /// Release the device
    fn close(&mut self);

    fn is_running(&self) -> bool;
}

/// Real-time output on a cpal device
pub struct CpalOutput {
    device_name: Option<String>,
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Output on the named device, or the host default when `None`
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn find_device(&self, host: &Host) -> Result<Device, EngineError> {
        if let Some(wanted) = &self.device_name {
            let devices = host
                .output_devices()
                .map_err(|e| EngineError::Unavailable(e.to_string()))?;
            for device in devices {
                if device.name().is_ok_and(|name| name == *wanted) {
                    return Ok(device);
                }
            }
            return Err(EngineError::Unavailable(format!(
                "output device '{}' not found",
                wanted
            )));
        }

        host.default_output_device()
            .ok_or_else(|| EngineError::Unavailable("no output device available".to_string()))
    }

    fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
        &self,
        device: &Device,
        config: &StreamConfig,
        graph: Arc<Mutex<AudioGraph>>,
    ) -> Result<Stream, EngineError> {
        let channels = config.channels as usize;
        let running = Arc::clone(&self.running);
        let mut scratch: Vec<f32> = Vec::new();

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::SeqCst) {
                        data.fill(T::from_sample(0.0f32));
                        return;
                    }

                    // Contended lock: emit silence rather than block the callback
                    let Ok(mut graph) = graph.try_lock() else {
                        data.fill(T::from_sample(0.0f32));
                        return;
                    };

                    scratch.resize(data.len(), 0.0);
                    graph.render_interleaved(&mut scratch, channels);
                    for (out, sample) in data.iter_mut().zip(&scratch) {
                        *out = T::from_sample(*sample);
                    }
                },
                |err| {
                    error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        Ok(stream)
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self, graph: Arc<Mutex<AudioGraph>>) -> Result<(), EngineError> {
        let host = cpal::default_host();
        let device = self.find_device(&host)?;

        let config = device
            .default_output_config()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.into();

        graph
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_sample_rate(stream_config.sample_rate.0);

        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(&device, &stream_config, graph)?,
            SampleFormat::I16 => self.build_stream::<i16>(&device, &stream_config, graph)?,
            SampleFormat::U16 => self.build_stream::<u16>(&device, &stream_config, graph)?,
            other => return Err(EngineError::UnsupportedFormat(format!("{:?}", other))),
        };

        // Some hosts start streams on build
        if let Err(e) = stream.pause() {
            debug!("could not pause new stream: {}", e);
        }
        self.running.store(false, Ordering::SeqCst);
        self.stream = Some(stream);

        debug!(
            device = %device.name().unwrap_or_default(),
            sample_rate = stream_config.sample_rate.0,
            channels = stream_config.channels,
            "output opened"
        );
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| EngineError::Unavailable("output is not open".to_string()))?;
        stream
            .play()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), EngineError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stream = None;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Output with no device; the caller drives the clock through
/// [`ToneEngine::render`](super::ToneEngine::render)
#[derive(Debug, Default)]
pub struct OfflineOutput {
    open: bool,
    running: bool,
}

impl OfflineOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioOutput for OfflineOutput {
    fn open(&mut self, _graph: Arc<Mutex<AudioGraph>>) -> Result<(), EngineError> {
        self.open = true;
        self.running = false;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        if !self.open {
            return Err(EngineError::Unavailable("output is not open".to_string()));
        }
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), EngineError> {
        self.running = false;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

/// List all available output devices
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}
