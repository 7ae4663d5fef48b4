//! Round-based training simulator.
//!
//! Drives `GlobalStatus` from round 0 to `total_rounds`, one round per
//! tick of a single repeating timer. Accuracy gains and loss drops are
//! bounded random draws; the optimizer label flips at `switch_round`.
//!
//! States: Idle → Running (start) → Complete (final round). Running → Idle
//! on cancel, Complete → Idle on reset.

use fedpharm_common::{ChartDataPoint, FedPharmError, GlobalStatus, Optimizer, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::log::LogBuffer;
use crate::rng::RandomSource;
use crate::scheduler::{Scheduler, TimerHandle};

/// Timer payload for one simulation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTick;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorState {
    Idle,
    Running,
    Complete,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Apply differential-privacy noise (damps every accuracy gain).
    pub privacy_noise: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Tick arrived while not running.
    Ignored,
    Advanced(ChartDataPoint),
    /// The run completed on this tick. `point` is the final round when it
    /// was computed on the same tick.
    Finished { point: Option<ChartDataPoint>, final_accuracy: f64 },
}

#[derive(Debug)]
pub struct RoundSimulator {
    config: SimulationConfig,
    state: SimulatorState,
    status: GlobalStatus,
    chart: Vec<ChartDataPoint>,
    privacy_noise: bool,
    timer: Option<TimerHandle>,
}

impl RoundSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            state: SimulatorState::Idle,
            status: GlobalStatus::default(),
            chart: Vec::new(),
            privacy_noise: false,
            timer: None,
        }
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SimulatorState::Running
    }

    pub fn is_complete(&self) -> bool {
        self.state == SimulatorState::Complete
    }

    pub fn status(&self) -> &GlobalStatus {
        &self.status
    }

    pub fn chart(&self) -> &[ChartDataPoint] {
        &self.chart
    }

    pub fn privacy_noise(&self) -> bool {
        self.privacy_noise
    }

    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn initial_status(&self) -> GlobalStatus {
        GlobalStatus {
            accuracy: self.config.initial_accuracy,
            loss: self.config.initial_loss,
            round: 0,
            active_optimizer: Optimizer::FedAdagrad,
        }
    }

    /// Begin a run. Readiness is the caller's concern; this only guards
    /// against double starts.
    pub fn start<S: Scheduler<RoundTick>>(
        &mut self,
        options: RunOptions,
        scheduler: &mut S,
        log: &mut LogBuffer,
    ) -> Result<()> {
        match self.state {
            SimulatorState::Running => {
                return Err(FedPharmError::InvalidTransition("training is already running".into()))
            }
            SimulatorState::Complete => {
                return Err(FedPharmError::InvalidTransition(
                    "training already complete; reset before starting again".into(),
                ))
            }
            SimulatorState::Idle => {}
        }

        if let Some(stale) = self.timer.take() {
            scheduler.cancel(stale);
        }

        self.privacy_noise = options.privacy_noise;
        self.status = self.initial_status();
        self.chart.clear();
        self.state = SimulatorState::Running;

        log.info("Federated training process initiated.");
        if self.privacy_noise {
            log.warn("Differential Privacy (ε=0.1) enabled. Applying noise to gradient updates.");
        }

        self.timer = Some(scheduler.schedule_repeating(self.config.tick_interval(), RoundTick));
        info!(
            total_rounds = self.config.total_rounds,
            switch_round = self.config.switch_round,
            privacy_noise = self.privacy_noise,
            "Training run started"
        );
        Ok(())
    }

    /// Advance one round.
    pub fn tick<S: Scheduler<RoundTick>>(
        &mut self,
        rng: &mut dyn RandomSource,
        scheduler: &mut S,
        log: &mut LogBuffer,
    ) -> TickOutcome {
        if self.state != SimulatorState::Running {
            return TickOutcome::Ignored;
        }

        let prev = self.status;
        let current_round = prev.round + 1;
        if current_round > self.config.total_rounds {
            return self.finish(scheduler, log, None);
        }

        let active_optimizer = if current_round >= self.config.switch_round {
            Optimizer::FedAdam
        } else {
            Optimizer::FedAdagrad
        };
        let noise = if self.privacy_noise { self.config.privacy_noise_multiplier } else { 1.0 };
        let accuracy_gain = base_gain(active_optimizer, rng) * noise;
        let loss_factor = if prev.loss > 0.5 { 1.0 } else { 0.3 };
        let loss_drop = rng.uniform(0.05, 0.15) * loss_factor;

        let accuracy = (prev.accuracy + accuracy_gain).min(self.config.max_accuracy);
        let loss = (prev.loss - loss_drop).max(self.config.min_loss);

        self.status = GlobalStatus { accuracy, loss, round: current_round, active_optimizer };
        let point = ChartDataPoint { round: current_round, accuracy, loss, optimizer: active_optimizer };
        self.chart.push(point);
        debug!(round = current_round, accuracy, loss, optimizer = %active_optimizer, "Round aggregated");

        log.info(format!(
            "Round {current_round}: Aggregating models. Global model accuracy improving by {:.2}%",
            accuracy - prev.accuracy
        ));
        if current_round == self.config.switch_round {
            log.warn(format!(
                "Switching optimizer to {} for improved convergence.",
                Optimizer::FedAdam
            ));
        }

        if current_round == self.config.total_rounds {
            return self.finish(scheduler, log, Some(point));
        }
        TickOutcome::Advanced(point)
    }

    /// Stop a run early. Status and chart are kept as they are.
    pub fn cancel<S: Scheduler<RoundTick>>(&mut self, scheduler: &mut S, log: &mut LogBuffer) -> Result<()> {
        if self.state != SimulatorState::Running {
            return Err(FedPharmError::InvalidTransition("no training run in progress".into()));
        }
        if let Some(h) = self.timer.take() {
            scheduler.cancel(h);
        }
        self.state = SimulatorState::Idle;
        log.warn(format!("Federated training cancelled at round {}.", self.status.round));
        Ok(())
    }

    /// Return to Idle so another run can be started. Clears the previous
    /// run's status and chart.
    pub fn reset<S: Scheduler<RoundTick>>(&mut self, scheduler: &mut S) -> Result<()> {
        if self.state == SimulatorState::Running {
            return Err(FedPharmError::InvalidTransition(
                "cannot reset while training is running; cancel first".into(),
            ));
        }
        if let Some(h) = self.timer.take() {
            scheduler.cancel(h);
        }
        self.state = SimulatorState::Idle;
        self.status = GlobalStatus::default();
        self.chart.clear();
        Ok(())
    }

    fn finish<S: Scheduler<RoundTick>>(
        &mut self,
        scheduler: &mut S,
        log: &mut LogBuffer,
        point: Option<ChartDataPoint>,
    ) -> TickOutcome {
        if let Some(h) = self.timer.take() {
            scheduler.cancel(h);
        }
        self.state = SimulatorState::Complete;
        let final_accuracy = self.status.accuracy;
        log.success(format!("Federated training complete! Final accuracy: {final_accuracy:.2}%"));
        info!(rounds = self.status.round, final_accuracy, "Training run complete");
        TickOutcome::Finished { point, final_accuracy }
    }
}

/// FedAdam rounds draw from a higher band than FedAdagrad rounds.
fn base_gain(optimizer: Optimizer, rng: &mut dyn RandomSource) -> f64 {
    match optimizer {
        Optimizer::FedAdagrad => rng.uniform(1.0, 3.5),
        Optimizer::FedAdam => rng.uniform(1.5, 4.5),
    }
}
