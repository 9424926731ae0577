use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use zapcore::{StepContext, StepError};

/// How a simulated call ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Fail with probability `failure_rate`.
    Random,
    Succeed,
    Fail(String),
}

/// Stand-in for a real API call: a randomized delay followed by an outcome.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub min_latency: Duration,
    pub max_latency: Duration,
    /// Probability in `0.0..=1.0` that a `Random` outcome fails.
    pub failure_rate: f64,
    pub outcome: Outcome,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(500),
            max_latency: Duration::from_millis(1500),
            failure_rate: 0.0,
            outcome: Outcome::Random,
        }
    }
}

impl Simulation {
    /// No delay, always succeeds.
    pub fn instant() -> Self {
        Self {
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            failure_rate: 0.0,
            outcome: Outcome::Succeed,
        }
    }

    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency = min;
        self.max_latency = max.max(min);
        self
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
        self.outcome = Outcome::Random;
        self
    }

    pub fn succeeding(mut self) -> Self {
        self.outcome = Outcome::Succeed;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.outcome = Outcome::Fail(message.into());
        self
    }

    fn sample_latency(&self) -> Duration {
        let min = self.min_latency.as_millis() as u64;
        let max = self.max_latency.as_millis() as u64;
        if max <= min {
            return self.min_latency;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn roll_failure(&self) -> bool {
        self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate.clamp(0.0, 1.0))
    }

    /// Wait out the simulated latency, then settle. Stops early with
    /// `Cancelled` if the run is stopped.
    pub async fn call(&self, ctx: &StepContext) -> Result<(), StepError> {
        let latency = self.sample_latency();
        ctx.events.info(format!(
            "Calling {} ({}ms)",
            ctx.step.app_id,
            latency.as_millis()
        ));

        tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(StepError::Cancelled),
            _ = sleep(latency) => {}
        }

        match &self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail(message) => Err(StepError::failed(message.clone())),
            Outcome::Random if self.roll_failure() => Err(StepError::failed(format!(
                "{} request failed",
                ctx.step.display_name()
            ))),
            Outcome::Random => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_stays_in_range() {
        let sim = Simulation::default()
            .with_latency(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..50 {
            let latency = sim.sample_latency();
            assert!(latency >= Duration::from_millis(10));
            assert!(latency <= Duration::from_millis(20));
        }
    }

    #[test]
    fn failure_rate_is_clamped() {
        assert_eq!(Simulation::default().with_failure_rate(3.0).failure_rate, 1.0);
        assert_eq!(Simulation::default().with_failure_rate(f64::NAN).failure_rate, 0.0);
        assert!(!Simulation::default().roll_failure());
        assert!(Simulation::default().with_failure_rate(1.0).roll_failure());
    }
}
