/// Bounded sample history and trend classification
use serde::Serialize;
use std::collections::VecDeque;

use crate::constants::{SAMPLE_WINDOW, TREND_DEADBAND};

/// One numeric reading as shown on a chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub time: String,
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// `Up`/`Down` only when `latest` moves more than the deadband away from
    /// `previous`
    pub fn classify(previous: f64, latest: f64) -> Self {
        if latest > previous * (1.0 + TREND_DEADBAND) {
            Trend::Up
        } else if latest < previous * (1.0 - TREND_DEADBAND) {
            Trend::Down
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ring of the most recent samples; appends at the tail, evicts from the head
#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Drop history and start over from `sample`
    pub fn reset_to(&mut self, sample: Sample) {
        self.samples.clear();
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn trend(&self) -> Trend {
        let len = self.samples.len();
        if len < 2 {
            return Trend::Stable;
        }
        Trend::classify(self.samples[len - 2].value, self.samples[len - 1].value)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(SAMPLE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: f64) -> Sample {
        Sample {
            time: "12:00:00".to_string(),
            value,
            label: "cpu".to_string(),
        }
    }

    #[test]
    fn test_trend_deadband() {
        assert_eq!(Trend::classify(100.0, 106.0), Trend::Up);
        assert_eq!(Trend::classify(100.0, 94.0), Trend::Down);
        assert_eq!(Trend::classify(100.0, 101.0), Trend::Stable);
        assert_eq!(Trend::classify(100.0, 105.0), Trend::Stable);
        assert_eq!(Trend::classify(100.0, 95.0), Trend::Stable);
        assert_eq!(Trend::classify(0.0, 0.0), Trend::Stable);
        assert_eq!(Trend::classify(0.0, 1.0), Trend::Up);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = SampleWindow::default();
        for i in 0..24 {
            window.push(sample(i as f64));
        }
        assert_eq!(window.len(), 24);

        window.push(sample(24.0));
        assert_eq!(window.len(), 24);
        let values: Vec<f64> = window.to_vec().iter().map(|s| s.value).collect();
        assert_eq!(values.first(), Some(&1.0));
        assert_eq!(values.last(), Some(&24.0));

        for i in 25..100 {
            window.push(sample(i as f64));
            assert!(window.len() <= 24);
        }
    }

    #[test]
    fn test_window_trend() {
        let mut window = SampleWindow::new(3);
        assert_eq!(window.trend(), Trend::Stable);

        window.push(sample(100.0));
        assert_eq!(window.trend(), Trend::Stable);

        window.push(sample(106.0));
        assert_eq!(window.trend(), Trend::Up);

        window.push(sample(94.0));
        assert_eq!(window.trend(), Trend::Down);

        window.reset_to(sample(50.0));
        assert_eq!(window.len(), 1);
        assert_eq!(window.trend(), Trend::Stable);
        assert_eq!(window.latest().map(|s| s.value), Some(50.0));
    }
}
