//! WAV file recorder
//!
//! Captures engine output to mono 32-bit float WAV files.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::ToneEngine;

/// WAV file recorder
pub struct Recorder {
    writer: WavWriter<BufWriter<File>>,
    sample_rate: u32,
    samples_written: u64,
}

impl Recorder {
    pub fn new(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer,
            sample_rate,
            samples_written: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Duration recorded so far in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples_written as f64 / self.sample_rate as f64
    }

    pub fn write_buffer(&mut self, buffer: &[f32]) -> Result<()> {
        for &sample in buffer {
            self.writer
                .write_sample(sample)
                .context("failed to write sample")?;
        }
        self.samples_written += buffer.len() as u64;
        Ok(())
    }

    /// Render `seconds` of engine output into the file in blocks of
    /// `block_size` frames.
    ///
    /// `on_block` is called after each block with the seconds captured so far.
    pub fn capture(
        &mut self,
        engine: &mut ToneEngine,
        seconds: f64,
        block_size: usize,
        mut on_block: impl FnMut(f64),
    ) -> Result<()> {
        let mut remaining = (seconds * self.sample_rate as f64).round() as usize;
        let mut block = vec![0.0f32; block_size.max(1)];

        while remaining > 0 {
            let n = remaining.min(block.len());
            engine.render(&mut block[..n]);
            self.write_buffer(&block[..n])?;
            remaining -= n;
            on_block(self.duration_secs());
        }
        Ok(())
    }

    /// Finalize the WAV file.
    ///
    /// This must be called to write a correct header.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize().context("failed to finalize WAV file")
    }
}
