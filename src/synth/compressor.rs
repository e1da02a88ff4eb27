//! Dynamics compressor for the master bus
//!
//! Feed-forward design: a peak envelope follower drives a soft-knee gain
//! computer. Summing many voices raises the detected level, and the gain
//! computer pulls it back down so polyphony does not scale loudness.

/// Compressor settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    /// Threshold in dB
    pub threshold: f64,
    /// Knee width in dB (0 = hard knee)
    pub knee: f64,
    /// Compression ratio (12.0 = 12:1)
    pub ratio: f64,
    /// Attack time in seconds
    pub attack: f64,
    /// Release time in seconds
    pub release: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold: -24.0,
            knee: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

/// A mono dynamics compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: CompressorSettings,
    attack_coef: f64,
    release_coef: f64,
    envelope: f64,
}

impl Compressor {
    pub fn new(settings: CompressorSettings, sample_rate: f64) -> Self {
        Self {
            settings,
            attack_coef: (-1.0 / (settings.attack * sample_rate)).exp(),
            release_coef: (-1.0 / (settings.release * sample_rate)).exp(),
            envelope: 0.0,
        }
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 0.0 {
            -120.0
        } else {
            20.0 * linear.log10()
        }
    }

    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Gain change in dB (zero or negative) for an input level in dB
    pub fn gain_reduction_db(&self, input_db: f64) -> f64 {
        let CompressorSettings {
            threshold,
            knee,
            ratio,
            ..
        } = self.settings;
        let slope = 1.0 / ratio - 1.0;

        if knee <= 0.0 {
            return if input_db <= threshold {
                0.0
            } else {
                (input_db - threshold) * slope
            };
        }

        let knee_start = threshold - knee / 2.0;
        let knee_end = threshold + knee / 2.0;

        if input_db <= knee_start {
            0.0
        } else if input_db >= knee_end {
            (input_db - threshold) * slope
        } else {
            // Quadratic blend, continuous with both straight segments
            let x = input_db - knee_start;
            slope * x * x / (2.0 * knee)
        }
    }

    /// Process one sample
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let level = input.abs();
        let coef = if level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * level;

        let reduction = self.gain_reduction_db(Self::linear_to_db(self.envelope));
        input * Self::db_to_linear(reduction)
    }

    /// Current gain reduction in dB (positive number, for metering)
    pub fn current_reduction(&self) -> f64 {
        -self.gain_reduction_db(Self::linear_to_db(self.envelope))
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressor() -> Compressor {
        Compressor::new(CompressorSettings::default(), 44100.0)
    }

    #[test]
    fn test_no_reduction_below_knee() {
        let comp = compressor();
        // Knee spans -39 dB to -9 dB
        assert_eq!(comp.gain_reduction_db(-45.0), 0.0);
        assert_eq!(comp.gain_reduction_db(-39.0), 0.0);
    }

    #[test]
    fn test_full_ratio_above_knee() {
        let comp = compressor();
        let reduction = comp.gain_reduction_db(0.0);
        // 24 dB over threshold at 12:1 leaves 2 dB over
        assert!((reduction - (-22.0)).abs() < 1e-9);
    }

    #[test]
    fn test_knee_is_continuous() {
        let comp = compressor();
        let below = comp.gain_reduction_db(-9.0 - 1e-9);
        let above = comp.gain_reduction_db(-9.0 + 1e-9);
        assert!((below - above).abs() < 1e-6);
    }

    #[test]
    fn test_quiet_signal_passes() {
        let mut comp = compressor();
        let mut out = 0.0;
        for _ in 0..2000 {
            out = comp.process(0.005); // about -46 dB
        }
        assert!((out - 0.005).abs() < 1e-6);
    }

    #[test]
    fn test_loud_signal_is_reduced() {
        let mut comp = compressor();
        let mut out = 0.0;
        for _ in 0..5000 {
            out = comp.process(1.0);
        }
        assert!(out < 0.2, "expected heavy reduction, got {}", out);
        assert!(comp.current_reduction() > 15.0);
    }

    #[test]
    fn test_output_grows_slower_than_input() {
        let settle = |level: f64| {
            let mut comp = compressor();
            let mut out = 0.0;
            for _ in 0..10000 {
                out = comp.process(level);
            }
            out
        };

        let one = settle(0.1);
        let eight = settle(0.8);
        assert!(eight / one < 3.0, "ratio {}", eight / one);
    }

    #[test]
    fn test_reset() {
        let mut comp = compressor();
        for _ in 0..1000 {
            comp.process(1.0);
        }
        comp.reset();
        assert_eq!(comp.current_reduction(), 0.0);
    }
}
