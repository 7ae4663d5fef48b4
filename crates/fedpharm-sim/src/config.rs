//! Tunables for the simulation core.
//! Every field has a serde default so a partial `[simulation]` table is enough.

use std::time::Duration;

use fedpharm_common::{FedPharmError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
}

impl SessionConfig {
    /// Reject combinations the state machines cannot honour.
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.upload.validate()?;
        self.activity.validate()
    }
}

// ── Round simulator ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_total_rounds")]
    pub total_rounds: u32,
    #[serde(default = "default_switch_round")]
    pub switch_round: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_initial_accuracy")]
    pub initial_accuracy: f64,
    #[serde(default = "default_initial_loss")]
    pub initial_loss: f64,
    #[serde(default = "default_max_accuracy")]
    pub max_accuracy: f64,
    #[serde(default = "default_min_loss")]
    pub min_loss: f64,
    #[serde(default = "default_privacy_noise_multiplier")]
    pub privacy_noise_multiplier: f64,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_total_rounds()             -> u32   { 20 }
fn default_switch_round()             -> u32   { 10 }
fn default_tick_interval_ms()         -> u64   { 1800 }
fn default_initial_accuracy()         -> f64   { 35.0 }
fn default_initial_loss()             -> f64   { 2.3 }
fn default_max_accuracy()             -> f64   { 98.0 }
fn default_min_loss()                 -> f64   { 0.1 }
fn default_privacy_noise_multiplier() -> f64   { 0.75 }
fn default_log_capacity()             -> usize { 101 }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            total_rounds: default_total_rounds(),
            switch_round: default_switch_round(),
            tick_interval_ms: default_tick_interval_ms(),
            initial_accuracy: default_initial_accuracy(),
            initial_loss: default_initial_loss(),
            max_accuracy: default_max_accuracy(),
            min_loss: default_min_loss(),
            privacy_noise_multiplier: default_privacy_noise_multiplier(),
            log_capacity: default_log_capacity(),
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=self.total_rounds).contains(&self.switch_round) {
            return Err(FedPharmError::Config(format!(
                "switch_round ({}) must be in 1..={}",
                self.switch_round, self.total_rounds
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(FedPharmError::Config("tick_interval_ms must be positive".into()));
        }
        if !(0.0..=100.0).contains(&self.max_accuracy) || self.initial_accuracy > self.max_accuracy {
            return Err(FedPharmError::Config(
                "accuracy bounds must satisfy initial <= max <= 100".into(),
            ));
        }
        if self.min_loss < 0.0 || self.initial_loss < self.min_loss {
            return Err(FedPharmError::Config(
                "loss bounds must satisfy 0 <= min <= initial".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.privacy_noise_multiplier) || self.privacy_noise_multiplier == 0.0 {
            return Err(FedPharmError::Config(
                "privacy_noise_multiplier must be in (0, 1]".into(),
            ));
        }
        if self.log_capacity == 0 {
            return Err(FedPharmError::Config("log_capacity must be positive".into()));
        }
        Ok(())
    }
}

// ── Upload wizard ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceCheckConfig {
    pub name: String,
    pub threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    #[serde(default = "default_submit_delay_ms")]
    pub submit_delay_ms: u64,
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_complete_delay_ms")]
    pub complete_delay_ms: u64,
    #[serde(default = "default_compliance_checks")]
    pub compliance_checks: Vec<ComplianceCheckConfig>,
}

fn default_accepted_extensions() -> Vec<String> {
    vec![".bin".to_string(), ".model".to_string(), ".h5".to_string()]
}
fn default_submit_delay_ms()      -> u64 { 400 }
fn default_progress_step()        -> u8  { 10 }
fn default_progress_interval_ms() -> u64 { 150 }
fn default_complete_delay_ms()    -> u64 { 500 }

fn default_compliance_checks() -> Vec<ComplianceCheckConfig> {
    [("HIPAA", 30), ("GDPR", 60), ("WHO Bioethics", 90)]
        .into_iter()
        .map(|(name, threshold)| ComplianceCheckConfig { name: name.to_string(), threshold })
        .collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: default_accepted_extensions(),
            submit_delay_ms: default_submit_delay_ms(),
            progress_step: default_progress_step(),
            progress_interval_ms: default_progress_interval_ms(),
            complete_delay_ms: default_complete_delay_ms(),
            compliance_checks: default_compliance_checks(),
        }
    }
}

impl UploadConfig {
    pub fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn complete_delay(&self) -> Duration {
        Duration::from_millis(self.complete_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.accepted_extensions.is_empty() {
            return Err(FedPharmError::Config("accepted_extensions must not be empty".into()));
        }
        if self.progress_step == 0 || self.progress_step > 100 {
            return Err(FedPharmError::Config("progress_step must be in 1..=100".into()));
        }
        if self.progress_interval_ms == 0 {
            return Err(FedPharmError::Config("progress_interval_ms must be positive".into()));
        }
        let increasing = self
            .compliance_checks
            .windows(2)
            .all(|w| w[0].threshold < w[1].threshold);
        if !increasing || self.compliance_checks.iter().any(|c| c.threshold > 100) {
            return Err(FedPharmError::Config(
                "compliance thresholds must be strictly increasing and at most 100".into(),
            ));
        }
        Ok(())
    }
}

// ── Simulated collaborator activity ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_join_delay_ms")]
    pub collaborator_join_delay_ms: u64,
    #[serde(default = "default_typing_poll_ms")]
    pub typing_poll_ms: u64,
    #[serde(default = "default_typing_probability")]
    pub typing_probability: f64,
    #[serde(default = "default_typing_min_ms")]
    pub typing_min_ms: u64,
    #[serde(default = "default_typing_jitter_ms")]
    pub typing_jitter_ms: u64,
}

fn bool_true()                  -> bool { true }
fn default_join_delay_ms()      -> u64  { 15_000 }
fn default_typing_poll_ms()     -> u64  { 4_000 }
fn default_typing_probability() -> f64  { 0.3 }
fn default_typing_min_ms()      -> u64  { 2_000 }
fn default_typing_jitter_ms()   -> u64  { 3_000 }

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enabled: bool_true(),
            collaborator_join_delay_ms: default_join_delay_ms(),
            typing_poll_ms: default_typing_poll_ms(),
            typing_probability: default_typing_probability(),
            typing_min_ms: default_typing_min_ms(),
            typing_jitter_ms: default_typing_jitter_ms(),
        }
    }
}

impl ActivityConfig {
    /// Activity simulation switched off; used by deterministic tests.
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.typing_probability) {
            return Err(FedPharmError::Config("typing_probability must be in [0, 1]".into()));
        }
        if self.enabled && self.typing_poll_ms == 0 {
            return Err(FedPharmError::Config("typing_poll_ms must be positive".into()));
        }
        Ok(())
    }
}
