//! Run-length policy for the ingestion loop.

use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Run until the source ends
    #[default]
    Unbounded,
    /// Stop once this many transactions produced at least one stored swap
    MaxSuccesses(u64),
    /// Stop after running for this long
    Deadline(Duration),
}

impl TerminationPolicy {
    /// Whether the run should stop given progress so far
    pub fn is_reached(&self, successes: u64, elapsed: Duration) -> bool {
        match self {
            TerminationPolicy::Unbounded => false,
            TerminationPolicy::MaxSuccesses(max) => successes >= *max,
            TerminationPolicy::Deadline(limit) => elapsed >= *limit,
        }
    }

    /// Time remaining before the deadline, if there is one
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        match self {
            TerminationPolicy::Deadline(limit) => Some(limit.saturating_sub(elapsed)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_stops() {
        let policy = TerminationPolicy::Unbounded;
        assert!(!policy.is_reached(u64::MAX, Duration::from_secs(86_400)));
        assert_eq!(policy.remaining(Duration::ZERO), None);
    }

    #[test]
    fn test_max_successes() {
        let policy = TerminationPolicy::MaxSuccesses(2);
        assert!(!policy.is_reached(1, Duration::from_secs(999)));
        assert!(policy.is_reached(2, Duration::ZERO));
        assert!(policy.is_reached(3, Duration::ZERO));
    }

    #[test]
    fn test_deadline() {
        let policy = TerminationPolicy::Deadline(Duration::from_secs(10));
        assert!(!policy.is_reached(100, Duration::from_secs(9)));
        assert!(policy.is_reached(0, Duration::from_secs(10)));
        assert_eq!(policy.remaining(Duration::from_secs(4)), Some(Duration::from_secs(6)));
        assert_eq!(policy.remaining(Duration::from_secs(40)), Some(Duration::ZERO));
    }

    #[test]
    fn test_default_is_unbounded() {
        assert_eq!(TerminationPolicy::default(), TerminationPolicy::Unbounded);
    }
}
