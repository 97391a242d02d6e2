//! Scenario-driven latency and fault injection around route handlers.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use super::random_source::RandomSource;
use crate::domain::MockResponse;

pub const FAULT_STATUSES: [u16; 6] = [400, 401, 403, 404, 500, 503];
pub const DEFAULT_FAULT_PROBABILITY: f64 = 0.3;
pub const DEFAULT_LATENCY_BASE_MS: u64 = 1000;
pub const DEFAULT_LATENCY_JITTER_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    #[default]
    HappyPath,
    Slow,
    ErrorHeavy,
    SadPath,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HappyPath => "happy-path",
            Self::Slow => "slow",
            Self::ErrorHeavy => "error-heavy",
            Self::SadPath => "sad-path",
        }
    }

    pub fn injects_latency(&self) -> bool {
        matches!(self, Self::Slow | Self::SadPath)
    }

    pub fn injects_faults(&self) -> bool {
        matches!(self, Self::ErrorHeavy | Self::SadPath)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "happy-path" => Ok(Self::HappyPath),
            "slow" => Ok(Self::Slow),
            "error-heavy" => Ok(Self::ErrorHeavy),
            "sad-path" => Ok(Self::SadPath),
            other => Err(format!(
                "unknown scenario '{}' (expected happy-path, slow, error-heavy or sad-path)",
                other
            )),
        }
    }
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDecision {
    pub delay: Option<Duration>,
    /// Short-circuit response; the wrapped handler must not run when set.
    pub fault: Option<MockResponse>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioPolicy {
    pub scenario: Scenario,
    pub fault_probability: f64,
    pub latency_base: Duration,
    pub latency_jitter: Duration,
}

impl ScenarioPolicy {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            fault_probability: DEFAULT_FAULT_PROBABILITY,
            latency_base: Duration::from_millis(DEFAULT_LATENCY_BASE_MS),
            latency_jitter: Duration::from_millis(DEFAULT_LATENCY_JITTER_MS),
        }
    }

    /// Draw the latency (if any) first, then the fault decision.
    pub fn evaluate(&self, rng: &mut RandomSource) -> ScenarioDecision {
        let delay = self
            .scenario
            .injects_latency()
            .then(|| self.latency_base + self.latency_jitter.mul_f64(rng.next_f64()));

        let fault = if self.scenario.injects_faults() && rng.chance(self.fault_probability) {
            let index = ((rng.next_f64() * FAULT_STATUSES.len() as f64) as usize)
                .min(FAULT_STATUSES.len() - 1);
            let status = FAULT_STATUSES[index];
            warn!(scenario = %self.scenario, status, "Injecting synthetic fault");
            Some(self.fault_response(status))
        } else {
            None
        };

        ScenarioDecision { delay, fault }
    }

    /// Sleep for the injected latency, then return the fault if one fired.
    /// Dropping the future cancels the wait.
    pub async fn apply(&self, decision: ScenarioDecision) -> Option<MockResponse> {
        if let Some(delay) = decision.delay {
            tokio::time::sleep(delay).await;
        }
        decision.fault
    }

    fn fault_response(&self, status: u16) -> MockResponse {
        MockResponse::new(
            status,
            Some(json!({
                "error": {
                    "status": status,
                    "kind": "scenario",
                    "message": format!("Injected by scenario '{}'", self.scenario),
                    "scenario": self.scenario.as_str(),
                    "injected": true,
                }
            })),
        )
    }
}

impl Default for ScenarioPolicy {
    fn default() -> Self {
        Self::new(Scenario::HappyPath)
    }
}
