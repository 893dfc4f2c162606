//! Admission limits for a run.
//!
//! Bounds what a single invocation may consume:
//! - Input size
//! - Number of claim branches running at once
//! - Total run time

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Limits applied to every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLimits {
    /// Maximum input size in bytes (default: 100KB)
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,

    /// Maximum number of claim branches in flight (default: 8)
    #[serde(default = "default_max_concurrent_branches")]
    pub max_concurrent_branches: usize,

    /// Total run timeout in seconds (default: 600 = 10 min)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
}

fn default_max_input_bytes() -> usize {
    100_000
}
fn default_max_concurrent_branches() -> usize {
    8
}
fn default_run_timeout() -> u64 {
    600
} // 10 min

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: default_max_input_bytes(),
            max_concurrent_branches: default_max_concurrent_branches(),
            run_timeout_seconds: default_run_timeout(),
        }
    }
}

impl RunLimits {
    /// Check that every limit is usable (nonzero concurrency and timeout)
    pub fn validate(&self) -> Result<(), LimitViolation> {
        if self.max_concurrent_branches == 0 {
            return Err(LimitViolation::ZeroLimit {
                key: "max_concurrent_branches",
            });
        }
        if self.run_timeout_seconds == 0 {
            return Err(LimitViolation::ZeroLimit {
                key: "run_timeout_seconds",
            });
        }
        Ok(())
    }

    /// Validate input text before a run starts
    pub fn validate_input(&self, input: &str) -> Result<(), LimitViolation> {
        let size = input.len();
        if size > self.max_input_bytes {
            return Err(LimitViolation::MaxInputBytes {
                actual: size,
                limit: self.max_input_bytes,
            });
        }

        Ok(())
    }

    /// Total run timeout
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

/// Limit violation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LimitViolation {
    #[error("Limit {key} must be at least 1")]
    ZeroLimit { key: &'static str },

    #[error("Maximum input bytes exceeded: {actual} > {limit}")]
    MaxInputBytes { actual: usize, limit: usize },

    #[error("Run timeout: exceeded {limit_seconds}s")]
    RunTimeout { limit_seconds: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = RunLimits::default();
        assert_eq!(limits.max_input_bytes, 100_000);
        assert_eq!(limits.max_concurrent_branches, 8);
        assert_eq!(limits.run_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_input_validation() {
        let limits = RunLimits {
            max_input_bytes: 100,
            ..Default::default()
        };

        assert!(limits.validate_input("short").is_ok());
        assert!(limits.validate_input("").is_ok());
        assert!(limits.validate_input("   \n").is_ok());

        let long_input = "x".repeat(200);
        let result = limits.validate_input(&long_input);
        assert!(matches!(result, Err(LimitViolation::MaxInputBytes { .. })));
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert!(RunLimits::default().validate().is_ok());

        let limits = RunLimits {
            max_concurrent_branches: 0,
            ..Default::default()
        };
        assert_eq!(
            limits.validate(),
            Err(LimitViolation::ZeroLimit {
                key: "max_concurrent_branches"
            })
        );

        let limits = RunLimits {
            run_timeout_seconds: 0,
            ..Default::default()
        };
        assert_eq!(
            limits.validate(),
            Err(LimitViolation::ZeroLimit {
                key: "run_timeout_seconds"
            })
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let limits: RunLimits = serde_yaml::from_str("max_concurrent_branches: 2").unwrap();
        assert_eq!(limits.max_concurrent_branches, 2);
        assert_eq!(limits.max_input_bytes, 100_000);
    }
}
