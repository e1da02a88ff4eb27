//! ADSR envelope as a scheduled gain automation
//!
//! The envelope is a timeline of scheduled gain events, evaluated at any
//! clock time. Attack, decay, sustain and release are ramps on that
//! timeline, so a release or a retrigger fade can cut in at any point by
//! cancelling the remaining events and ramping from the current level.

/// Smallest level an exponential ramp can target; "near silence"
pub const SILENCE: f64 = 0.001;

/// Timing and level constants for the piano envelope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeShape {
    /// Linear rise from 0 to `peak` (seconds)
    pub attack: f64,
    /// Exponential fall from `peak` to `sustain_level` (seconds)
    pub decay: f64,
    /// Hold window before the release starts (seconds)
    pub sustain: f64,
    /// Exponential fall from `sustain_level` to [`SILENCE`] (seconds)
    pub release: f64,
    pub peak: f64,
    pub sustain_level: f64,
}

impl EnvelopeShape {
    /// Total programmed duration of attack, decay, sustain and release
    pub fn total_duration(&self) -> f64 {
        self.attack + self.decay + self.sustain + self.release
    }
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.8,
            release: 1.0,
            peak: 0.25,
            sustain_level: 0.12,
        }
    }
}

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
}

impl EnvelopeShape {
    /// Stage of the programmed curve `elapsed` seconds after the trigger
    pub fn stage_at(&self, elapsed: f64) -> EnvelopeStage {
        if elapsed < self.attack {
            EnvelopeStage::Attack
        } else if elapsed < self.attack + self.decay {
            EnvelopeStage::Decay
        } else if elapsed < self.attack + self.decay + self.sustain {
            EnvelopeStage::Sustain
        } else {
            EnvelopeStage::Release
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Set { time: f64, value: f64 },
    Linear { time: f64, value: f64 },
    Exponential { time: f64, value: f64 },
}

impl Event {
    fn time(&self) -> f64 {
        match *self {
            Event::Set { time, .. } | Event::Linear { time, .. } | Event::Exponential { time, .. } => time,
        }
    }
}

/// A gain value driven by scheduled events
#[derive(Debug, Clone)]
pub struct Envelope {
    default_value: f64,
    events: Vec<Event>,
}

impl Envelope {
    /// Create an automation that holds `default_value` until events are scheduled
    pub fn new(default_value: f64) -> Self {
        Self {
            default_value,
            events: Vec::new(),
        }
    }

    /// Program the full piano curve starting at `t0`
    pub fn triggered(shape: &EnvelopeShape, t0: f64) -> Self {
        let mut env = Self::new(0.0);
        env.set_value_at(0.0, t0);
        env.linear_ramp_to(shape.peak, t0 + shape.attack);
        env.exponential_ramp_to(shape.sustain_level, t0 + shape.attack + shape.decay);
        env.set_value_at(shape.sustain_level, t0 + shape.attack + shape.decay + shape.sustain);
        env.exponential_ramp_to(SILENCE, t0 + shape.total_duration());
        env
    }

    fn insert(&mut self, event: Event) {
        // Events at equal times keep insertion order
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }

    /// Jump to `value` at `time`
    pub fn set_value_at(&mut self, value: f64, time: f64) {
        self.insert(Event::Set { time, value });
    }

    /// Ramp linearly from the previous event to `value`, arriving at `time`
    pub fn linear_ramp_to(&mut self, value: f64, time: f64) {
        self.insert(Event::Linear { time, value });
    }

    /// Ramp exponentially from the previous event to `value`, arriving at `time`
    pub fn exponential_ramp_to(&mut self, value: f64, time: f64) {
        self.insert(Event::Exponential { time, value });
    }

    /// Drop every event scheduled at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Cancel what remains at `now` and ramp exponentially to silence over `fade`
    pub fn fade_out(&mut self, now: f64, fade: f64) {
        let current = self.value_at(now);
        self.cancel_scheduled_values(now);
        self.set_value_at(current, now);
        self.exponential_ramp_to(SILENCE, now + fade);
    }

    /// Time the last scheduled event completes
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(Event::time)
    }

    /// Target value of the last scheduled event
    pub fn final_value(&self) -> f64 {
        match self.events.last() {
            Some(Event::Set { value, .. })
            | Some(Event::Linear { value, .. })
            | Some(Event::Exponential { value, .. }) => *value,
            None => self.default_value,
        }
    }

    /// Evaluate the automation at time `t`
    pub fn value_at(&self, t: f64) -> f64 {
        let mut prev_time = 0.0;
        let mut prev_value = self.default_value;

        for event in &self.events {
            match *event {
                Event::Set { time, value } => {
                    if t < time {
                        return prev_value;
                    }
                    prev_time = time;
                    prev_value = value;
                }
                Event::Linear { time, value } => {
                    if t < time {
                        let span = time - prev_time;
                        if span <= 0.0 {
                            return value;
                        }
                        let progress = ((t - prev_time) / span).clamp(0.0, 1.0);
                        return prev_value + (value - prev_value) * progress;
                    }
                    prev_time = time;
                    prev_value = value;
                }
                Event::Exponential { time, value } => {
                    if t < time {
                        let span = time - prev_time;
                        // No exponential path through zero or across signs: hold
                        if span <= 0.0 || prev_value * value <= 0.0 {
                            return prev_value;
                        }
                        let progress = ((t - prev_time) / span).clamp(0.0, 1.0);
                        return prev_value * (value / prev_value).powf(progress);
                    }
                    prev_time = time;
                    prev_value = value;
                }
            }
        }

        prev_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_shape_total_duration() {
        let shape = EnvelopeShape::default();
        assert!(close(shape.total_duration(), 1.91));
    }

    #[test]
    fn test_attack_is_linear() {
        let shape = EnvelopeShape::default();
        let env = Envelope::triggered(&shape, 1.0);

        assert_eq!(env.value_at(0.5), 0.0);
        assert!(close(env.value_at(1.0), 0.0));
        assert!(close(env.value_at(1.005), 0.125));
        assert!(close(env.value_at(1.01), 0.25));
    }

    #[test]
    fn test_decay_is_exponential() {
        let shape = EnvelopeShape::default();
        let env = Envelope::triggered(&shape, 0.0);

        // Halfway through the decay is the geometric mean of peak and sustain
        let mid = env.value_at(0.01 + 0.05);
        assert!(close(mid, (0.25f64 * 0.12).sqrt()));
        assert!(close(env.value_at(0.11), 0.12));
    }

    #[test]
    fn test_sustain_holds() {
        let shape = EnvelopeShape::default();
        let env = Envelope::triggered(&shape, 0.0);

        assert!(close(env.value_at(0.3), 0.12));
        assert!(close(env.value_at(0.9), 0.12));
    }

    #[test]
    fn test_release_reaches_silence() {
        let shape = EnvelopeShape::default();
        let env = Envelope::triggered(&shape, 0.0);

        let during = env.value_at(1.5);
        assert!(during < 0.12 && during > SILENCE);
        assert!(close(env.value_at(1.91), SILENCE));
        assert!(close(env.value_at(5.0), SILENCE));
        assert!(close(env.end_time().unwrap(), 1.91));
    }

    #[test]
    fn test_stage_at() {
        let shape = EnvelopeShape::default();
        assert_eq!(shape.stage_at(0.005), EnvelopeStage::Attack);
        assert_eq!(shape.stage_at(0.05), EnvelopeStage::Decay);
        assert_eq!(shape.stage_at(0.5), EnvelopeStage::Sustain);
        assert_eq!(shape.stage_at(1.2), EnvelopeStage::Release);
    }

    #[test]
    fn test_cancel_scheduled_values() {
        let shape = EnvelopeShape::default();
        let mut env = Envelope::triggered(&shape, 0.0);

        env.cancel_scheduled_values(0.05);
        // Only the start and the attack ramp remain; the level holds at peak
        assert!(close(env.value_at(1.0), 0.25));
    }

    #[test]
    fn test_fade_out_from_current_level() {
        let shape = EnvelopeShape::default();
        let mut env = Envelope::triggered(&shape, 0.0);

        let before = env.value_at(0.5);
        env.fade_out(0.5, 0.5);

        assert!(close(env.value_at(0.5), before));
        assert!(env.value_at(0.75) < before);
        assert!(close(env.value_at(1.0), SILENCE));
        assert_eq!(env.final_value(), SILENCE);
        assert_eq!(env.end_time(), Some(1.0));
    }

    #[test]
    fn test_exponential_from_zero_holds() {
        let mut env = Envelope::new(0.0);
        env.set_value_at(0.0, 0.0);
        env.exponential_ramp_to(1.0, 1.0);

        assert_eq!(env.value_at(0.5), 0.0);
        assert_eq!(env.value_at(1.0), 1.0);
    }

    #[test]
    fn test_default_value_without_events() {
        let env = Envelope::new(0.7);
        assert_eq!(env.value_at(3.0), 0.7);
        assert_eq!(env.final_value(), 0.7);
        assert_eq!(env.end_time(), None);
    }
}
