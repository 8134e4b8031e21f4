use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a phase drives work at the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    /// Continuous submission under a target rate.
    Throughput,
    /// Serial, one-shot execution of the fixed query list, each query
    /// run cold and then hot.
    Latency,
}

/// Target submission rate for a throughput phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rate {
    /// Submit as fast as the workers drain the queue.
    Unlimited(UnlimitedTag),
    /// Target transactions per second.
    Limited(u64),
}

/// Serde helper so `"unlimited"` deserializes as [`Rate::Unlimited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlimitedTag {
    Unlimited,
}

impl Rate {
    pub fn unlimited() -> Self {
        Rate::Unlimited(UnlimitedTag::Unlimited)
    }

    pub fn is_unlimited(self) -> bool {
        matches!(self, Rate::Unlimited(_))
    }

    /// Interval between submissions, `None` when unlimited or zero.
    pub fn submit_interval(self) -> Option<Duration> {
        match self {
            Rate::Unlimited(_) => None,
            Rate::Limited(0) => None,
            Rate::Limited(tps) => Some(Duration::from_nanos(1_000_000_000 / tps)),
        }
    }
}

/// A contiguous interval of the run with a fixed transaction mix, rate
/// and semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    /// 1-based position in the schedule, assigned by the config loader.
    #[serde(default)]
    pub id: u32,
    pub kind: PhaseKind,
    #[serde(default = "Rate::unlimited")]
    pub rate: Rate,
    /// Mix weights, indexed by transaction type id minus one.
    pub weights: Vec<u32>,
    /// Wall-clock length of a throughput phase. Latency phases end when
    /// their query list is exhausted instead.
    #[serde(default)]
    pub duration_secs: u64,
}

impl Phase {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn is_latency_run(&self) -> bool {
        self.kind == PhaseKind::Latency
    }

    /// Type ids with a nonzero weight, in catalog order. This is the
    /// serial query list of a latency phase.
    pub fn active_type_ids(&self) -> Vec<usize> {
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0)
            .map(|(idx, _)| idx + 1)
            .collect()
    }

    pub fn total_weight(&self) -> u64 {
        self.weights.iter().map(|w| u64::from(*w)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_ids_skip_zero_weights() {
        let phase = Phase {
            id: 1,
            kind: PhaseKind::Latency,
            rate: Rate::unlimited(),
            weights: vec![0, 5, 0, 1],
            duration_secs: 0,
        };
        assert_eq!(phase.active_type_ids(), vec![2, 4]);
        assert_eq!(phase.total_weight(), 6);
    }

    #[test]
    fn limited_rate_interval() {
        assert_eq!(
            Rate::Limited(1000).submit_interval(),
            Some(Duration::from_micros(1000))
        );
        assert_eq!(Rate::unlimited().submit_interval(), None);
        assert_eq!(Rate::Limited(0).submit_interval(), None);
    }

    #[test]
    fn rate_deserializes_from_number_or_tag() {
        let limited: Rate = serde_json::from_str("200").unwrap();
        assert_eq!(limited, Rate::Limited(200));
        let unlimited: Rate = serde_json::from_str("\"unlimited\"").unwrap();
        assert!(unlimited.is_unlimited());
    }
}
