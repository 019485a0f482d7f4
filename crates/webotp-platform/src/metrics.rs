use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

/// Destination of enumerated histogram samples.
pub trait MetricsSink: Send + Sync {
    /// Record `sample` in histogram `name` with exclusive upper bound `boundary`.
    fn record_enumerated(&self, name: &str, sample: usize, boundary: usize);
}

/// Sink that writes samples to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record_enumerated(&self, name: &str, sample: usize, boundary: usize) {
        info!(histogram = name, sample, boundary, "histogram sample");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramSample {
    pub name: String,
    pub sample: usize,
    pub boundary: usize,
}

/// Sink keeping samples in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricsSink {
    samples: Arc<RwLock<Vec<HistogramSample>>>,
}

impl InMemoryMetricsSink {
    pub fn samples(&self) -> Vec<HistogramSample> {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded sample values of histogram `name`, in order.
    pub fn samples_for(&self, name: &str) -> Vec<usize> {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.sample)
            .collect()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record_enumerated(&self, name: &str, sample: usize, boundary: usize) {
        self.samples
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(HistogramSample {
                name: name.to_owned(),
                sample,
                boundary,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_shares_samples_between_clones() {
        let sink = InMemoryMetricsSink::default();
        let clone = sink.clone();

        clone.record_enumerated("Blink.Sms.BackendAvailability", 2, 4);
        clone.record_enumerated("Other", 1, 3);

        assert_eq!(
            sink.samples()[0],
            HistogramSample {
                name: "Blink.Sms.BackendAvailability".into(),
                sample: 2,
                boundary: 4,
            }
        );
        assert_eq!(sink.samples_for("Blink.Sms.BackendAvailability"), vec![2]);
    }
}
