//! Phase-accumulator oscillator with a scheduled start and stop

use std::f64::consts::PI;

/// Waveform types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Triangle,
}

/// A basic oscillator that generates waveforms between its start and stop times
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f64,
    frequency: f64,
    sample_rate: f64,
    start_time: f64,
    stop_time: Option<f64>,
}

impl Oscillator {
    /// Create a new oscillator that starts sounding at `start_time` seconds
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: f64, start_time: f64) -> Self {
        Self {
            waveform,
            phase: 0.0,
            frequency,
            sample_rate,
            start_time,
            stop_time: None,
        }
    }

    /// Get the current frequency
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Scheduled stop time, if any
    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    /// Schedule the oscillator to stop at `when`.
    ///
    /// Returns `false` when the oscillator had already stopped by `now`;
    /// the existing stop is kept in that case.
    pub fn stop(&mut self, when: f64, now: f64) -> bool {
        match self.stop_time {
            Some(stop) if stop <= now => false,
            _ => {
                self.stop_time = Some(when.max(self.start_time));
                true
            }
        }
    }

    /// Whether the oscillator produces output at time `t`
    pub fn is_sounding(&self, t: f64) -> bool {
        t >= self.start_time && self.stop_time.map_or(true, |stop| t < stop)
    }

    /// Whether the oscillator has stopped for good at time `t`
    pub fn has_stopped(&self, t: f64) -> bool {
        self.stop_time.is_some_and(|stop| t >= stop)
    }

    /// Generate the sample for time `t`, advancing phase only while sounding
    pub fn generate(&mut self, t: f64) -> f64 {
        if !self.is_sounding(t) {
            return 0.0;
        }

        let sample = match self.waveform {
            Waveform::Sine => self.sine(),
            Waveform::Triangle => self.triangle(),
        };

        self.phase += self.frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }

    fn sine(&self) -> f64 {
        (self.phase * 2.0 * PI).sin()
    }

    fn triangle(&self) -> f64 {
        let p = self.phase;
        if p < 0.25 {
            4.0 * p
        } else if p < 0.75 {
            2.0 - 4.0 * p
        } else {
            4.0 * p - 4.0
        }
    }
}
