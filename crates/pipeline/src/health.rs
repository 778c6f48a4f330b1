//! Stage health monitor
//!
//! Each stage records the outcome of every attempt in a sliding time window.
//! Once the window holds enough samples and the failure ratio reaches the
//! threshold, the stage pauses for a fixed period and an `Alert` goes out.
//! The stage resumes by itself when the period is over; a failing stage never
//! stops the pipeline.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tally_config::HealthConfig;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Pause policy
#[derive(Debug, Clone, PartialEq)]
pub struct HealthPolicy {
    pub enabled: bool,
    /// Outcomes older than this are forgotten
    pub window: Duration,
    /// Outcomes needed before the ratio is trusted
    pub min_samples: usize,
    /// Failure ratio (0-1) that pauses the stage
    pub error_rate_threshold: f64,
    /// How long a tripped stage stays paused
    pub pause: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(10),
            min_samples: 10,
            error_rate_threshold: 0.5,
            pause: Duration::from_secs(5),
        }
    }
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            enabled: config.enabled,
            window: config.window,
            min_samples: config.min_samples,
            error_rate_threshold: config.error_rate_threshold,
            pause: config.pause,
        }
    }
}

impl HealthPolicy {
    /// Policy that never pauses
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Health notification broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// A stage crossed its error threshold and stopped taking work
    StagePaused {
        stage: &'static str,
        error_rate: f64,
        samples: usize,
        pause: Duration,
    },
    /// A paused stage is taking work again
    StageResumed { stage: &'static str },
}

impl Alert {
    /// Stage the alert is about
    pub fn stage(&self) -> &'static str {
        match self {
            Self::StagePaused { stage, .. } | Self::StageResumed { stage } => stage,
        }
    }
}

/// Whether a stage may take work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    /// Paused for the remaining duration
    Paused(Duration),
}

#[derive(Debug, Default)]
struct Window {
    outcomes: VecDeque<(Instant, bool)>,
    paused_until: Option<Instant>,
}

impl Window {
    fn evict(&mut self, now: Instant, window: Duration) {
        while let Some(&(at, _)) = self.outcomes.front() {
            if now.duration_since(at) < window {
                break;
            }
            self.outcomes.pop_front();
        }
    }

    fn failure_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|(_, ok)| !ok).count();
        failures as f64 / self.outcomes.len() as f64
    }
}

/// Sliding-window health tracker for one stage
#[derive(Debug)]
pub struct HealthMonitor {
    stage: &'static str,
    policy: HealthPolicy,
    window: Mutex<Window>,
    alerts: broadcast::Sender<Alert>,
}

impl HealthMonitor {
    pub fn new(stage: &'static str, policy: HealthPolicy, alerts: broadcast::Sender<Alert>) -> Self {
        Self {
            stage,
            policy,
            window: Mutex::new(Window::default()),
            alerts,
        }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Record a successful attempt
    #[inline]
    pub fn record_success(&self) {
        self.record(true);
    }

    /// Record a failed attempt, returning true if it paused the stage
    #[inline]
    pub fn record_failure(&self) -> bool {
        self.record(false)
    }

    fn record(&self, ok: bool) -> bool {
        if !self.policy.enabled {
            return false;
        }

        let now = Instant::now();
        let (error_rate, samples) = {
            let mut window = self.window.lock();
            if window.paused_until.is_some() {
                return false;
            }

            window.evict(now, self.policy.window);
            window.outcomes.push_back((now, ok));

            let samples = window.outcomes.len();
            let error_rate = window.failure_ratio();
            if ok
                || samples < self.policy.min_samples
                || error_rate < self.policy.error_rate_threshold
            {
                return false;
            }

            window.outcomes.clear();
            window.paused_until = Some(now + self.policy.pause);
            (error_rate, samples)
        };

        tracing::warn!(
            stage = self.stage,
            error_rate,
            samples,
            pause_ms = self.policy.pause.as_millis() as u64,
            "stage paused: error rate above threshold"
        );
        let _ = self.alerts.send(Alert::StagePaused {
            stage: self.stage,
            error_rate,
            samples,
            pause: self.policy.pause,
        });
        true
    }

    /// Current state; an expired pause is lifted here
    pub fn poll(&self) -> HealthState {
        let now = Instant::now();
        {
            let mut window = self.window.lock();
            match window.paused_until {
                None => return HealthState::Healthy,
                Some(until) if until > now => return HealthState::Paused(until - now),
                Some(_) => window.paused_until = None,
            }
        }

        tracing::info!(stage = self.stage, "stage resumed");
        let _ = self.alerts.send(Alert::StageResumed { stage: self.stage });
        HealthState::Healthy
    }

    /// Whether the stage is currently paused
    pub fn is_paused(&self) -> bool {
        matches!(self.poll(), HealthState::Paused(_))
    }
}

#[cfg(test)]
#[path = "health_test.rs"]
mod tests;
