//! AMF Metrics
//!
//! Labelled counters for the de-registration procedure and their
//! Prometheus text export.

use std::collections::BTreeMap;
use std::sync::RwLock;

// ============================================================================
// Counter names and labels
// ============================================================================

/// De-registration requests accepted for processing
pub const UE_DEREGISTRATION: &str = "ue_deregistration";
/// De-registration outcomes
pub const UE_DEREGISTER: &str = "ue_deregister";

pub const LABEL_AMF_CAUSE: &str = "amf_cause";
pub const LABEL_RESULT: &str = "result";
pub const LABEL_ACTION: &str = "action";

pub const CAUSE_UE_INITIATED: &str = "ue_initiated";
pub const RESULT_SUCCESS: &str = "success";
pub const ACTION_ACCEPT_SENT: &str = "deregister_accept_sent";
pub const ACTION_ACCEPT_NOT_SENT: &str = "deregistration_accept_not_sent";

/// Get counter description
pub fn description(name: &str) -> &'static str {
    match name {
        UE_DEREGISTRATION => "Number of de-registration requests handled by the AMF",
        UE_DEREGISTER => "Number of completed de-registrations by outcome",
        _ => "AMF counter",
    }
}

// ============================================================================
// Counter sink
// ============================================================================

/// Fire and forget counter increments
///
/// Called with the UE table locked; implementations must not block.
pub trait CounterSink: Send + Sync {
    fn increment(&self, name: &str, value: u64, labels: &[(&str, &str)]);
}

type CounterKey = (String, Vec<(String, String)>);

fn counter_key(name: &str, labels: &[(&str, &str)]) -> CounterKey {
    let mut labels: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    labels.sort();
    (name.to_string(), labels)
}

// ============================================================================
// AMF Metrics
// ============================================================================

/// In-memory labelled counters
#[derive(Debug, Default)]
pub struct AmfMetrics {
    counters: RwLock<BTreeMap<CounterKey, u64>>,
}

impl AmfMetrics {
    /// Create a new metrics manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a counter value; label order does not matter
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters
            .read()
            .ok()
            .and_then(|m| m.get(&counter_key(name, labels)).copied())
            .unwrap_or(0)
    }

    /// Sum of a counter over all label sets
    pub fn total(&self, name: &str) -> u64 {
        self.counters
            .read()
            .map(|m| m.iter().filter(|((n, _), _)| n == name).map(|(_, v)| *v).sum())
            .unwrap_or(0)
    }

    /// Reset all metrics
    pub fn reset(&self) {
        if let Ok(mut counters) = self.counters.write() {
            counters.clear();
        }
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();
        let Ok(counters) = self.counters.read() else {
            return output;
        };

        let mut last_name: Option<&str> = None;
        for ((name, labels), value) in counters.iter() {
            if last_name != Some(name.as_str()) {
                output.push_str(&format!("# HELP {} {}\n", name, description(name)));
                output.push_str(&format!("# TYPE {} counter\n", name));
                last_name = Some(name.as_str());
            }
            let labels = labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect::<Vec<_>>()
                .join(",");
            if labels.is_empty() {
                output.push_str(&format!("{} {}\n", name, value));
            } else {
                output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
            }
        }

        output
    }
}

impl CounterSink for AmfMetrics {
    fn increment(&self, name: &str, value: u64, labels: &[(&str, &str)]) {
        if let Ok(mut counters) = self.counters.write() {
            let entry = counters.entry(counter_key(name, labels)).or_insert(0);
            *entry = entry.saturating_add(value);
        }
    }
}
