//! The readout history shown in the trend plots.

/// One poll result, stamped with seconds since the session started.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Sample {
    pub elapsed_s: f64,
    pub voltage: f32,
    pub current: f32,
}

/// Append-only history of samples. It is never trimmed, the session is expected to end first.
#[derive(Debug, Default, Clone)]
pub struct TimeSeries {
    samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// `[seconds, volts]` pairs for plotting.
    pub fn voltage_points(&self) -> Vec<[f64; 2]> {
        self.points(|s| s.voltage)
    }

    /// `[seconds, amps]` pairs for plotting.
    pub fn current_points(&self) -> Vec<[f64; 2]> {
        self.points(|s| s.current)
    }

    fn points(&self, value: impl Fn(&Sample) -> f32) -> Vec<[f64; 2]> {
        self.samples
            .iter()
            .map(|s| [s.elapsed_s, f64::from(value(s))])
            .collect()
    }
}
