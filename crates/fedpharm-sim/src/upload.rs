//! Per-participant upload wizard.
//!
//! SelectingFile → Submitting (submit) → Uploading (after submit delay) →
//! UploadComplete (progress reached 100, after complete delay) → Confirmed.
//! Uploading → SelectingFile on cancel, keeping the selected artifact.
//!
//! A wizard owns at most one timer at a time; every transition that replaces
//! or abandons it cancels the previous handle first.

use fedpharm_common::{
    FedPharmError, ModelArtifact, Optimizer, ParticipantId, ParticipantUploadState, Result,
    SubmissionType,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audit::ContributionAudit;
use crate::config::UploadConfig;
use crate::rng::RandomSource;
use crate::scheduler::{Scheduler, TimerHandle};

/// Timer payloads owned by a wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    BeginUpload,
    Progress,
    Finish,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    SelectingFile,
    Submitting,
    Uploading,
    UploadComplete,
    Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubmissionForm {
    pub optimizer: Optimizer,
    pub submission_type: SubmissionType,
    pub version: String,
}

impl Default for SubmissionForm {
    fn default() -> Self {
        Self {
            optimizer: Optimizer::FedAdam,
            submission_type: SubmissionType::FullModel,
            version: "v1.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceCheck {
    pub name: String,
    pub threshold: u8,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Ignored,
    UploadStarted,
    Progressed { progress: u8, newly_passed: Vec<String> },
    UploadComplete,
}

/// Serializable view for presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardView {
    pub participant: ParticipantId,
    pub phase: WizardPhase,
    pub artifact: Option<ModelArtifact>,
    pub validation_error: Option<String>,
    pub form: SubmissionForm,
    pub progress: u8,
    pub compliance: Vec<ComplianceCheck>,
}

#[derive(Debug)]
pub struct UploadWizard {
    participant: ParticipantId,
    config: UploadConfig,
    phase: WizardPhase,
    artifact: Option<ModelArtifact>,
    validation_error: Option<String>,
    form: SubmissionForm,
    progress: u8,
    checks: Vec<ComplianceCheck>,
    timer: Option<TimerHandle>,
}

impl UploadWizard {
    pub fn new(participant: ParticipantId, config: UploadConfig) -> Self {
        let checks = fresh_checks(&config);
        Self {
            participant,
            config,
            phase: WizardPhase::SelectingFile,
            artifact: None,
            validation_error: None,
            form: SubmissionForm::default(),
            progress: 0,
            checks,
            timer: None,
        }
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn artifact(&self) -> Option<&ModelArtifact> {
        self.artifact.as_ref()
    }

    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    pub fn compliance(&self) -> &[ComplianceCheck] {
        &self.checks
    }

    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    pub fn view(&self) -> WizardView {
        WizardView {
            participant: self.participant,
            phase: self.phase,
            artifact: self.artifact.clone(),
            validation_error: self.validation_error.clone(),
            form: self.form.clone(),
            progress: self.progress,
            compliance: self.checks.clone(),
        }
    }

    /// Validate and store the artifact. A rejected artifact clears any
    /// previous selection.
    pub fn select_file(&mut self, artifact: ModelArtifact) -> Result<()> {
        self.require(WizardPhase::SelectingFile, "select a file")?;

        let accepted = artifact
            .extension()
            .map(|ext| self.config.accepted_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
            .unwrap_or(false);

        if !accepted {
            let err = FedPharmError::InvalidArtifact { allowed: self.config.accepted_extensions.join(", ") };
            self.validation_error = Some(err.to_string());
            self.artifact = None;
            debug!(participant = %self.participant, file = %artifact.name, "Artifact rejected");
            return Err(err);
        }

        self.validation_error = None;
        self.artifact = Some(artifact);
        Ok(())
    }

    pub fn submit<S: Scheduler<UploadStep>>(&mut self, form: SubmissionForm, scheduler: &mut S) -> Result<()> {
        self.require(WizardPhase::SelectingFile, "submit")?;
        if self.artifact.is_none() {
            let err = FedPharmError::MissingArtifact;
            self.validation_error = Some(err.to_string());
            return Err(err);
        }
        if let Some(pending) = &self.validation_error {
            return Err(FedPharmError::InvalidTransition(pending.clone()));
        }

        self.form = form;
        self.phase = WizardPhase::Submitting;
        self.replace_timer(scheduler, |s, cfg| s.schedule_once(cfg.submit_delay(), UploadStep::BeginUpload));
        info!(participant = %self.participant, version = %self.form.version, "Upload submitted");
        Ok(())
    }

    /// Handle a fired timer belonging to this wizard.
    pub fn on_step<S: Scheduler<UploadStep>>(&mut self, step: UploadStep, scheduler: &mut S) -> StepOutcome {
        match (step, self.phase) {
            (UploadStep::BeginUpload, WizardPhase::Submitting) => {
                self.timer = None;
                self.phase = WizardPhase::Uploading;
                self.progress = 0;
                self.checks = fresh_checks(&self.config);
                self.replace_timer(scheduler, |s, cfg| {
                    s.schedule_repeating(cfg.progress_interval(), UploadStep::Progress)
                });
                StepOutcome::UploadStarted
            }
            (UploadStep::Progress, WizardPhase::Uploading) if self.progress < 100 => {
                self.progress = self.progress.saturating_add(self.config.progress_step).min(100);
                let progress = self.progress;
                let newly_passed: Vec<String> = self
                    .checks
                    .iter_mut()
                    .filter(|c| !c.passed && progress >= c.threshold)
                    .map(|c| {
                        c.passed = true;
                        c.name.clone()
                    })
                    .collect();

                if progress >= 100 {
                    self.replace_timer(scheduler, |s, cfg| s.schedule_once(cfg.complete_delay(), UploadStep::Finish));
                }
                StepOutcome::Progressed { progress, newly_passed }
            }
            (UploadStep::Finish, WizardPhase::Uploading) if self.progress >= 100 => {
                self.timer = None;
                self.phase = WizardPhase::UploadComplete;
                info!(participant = %self.participant, "Upload complete, awaiting confirmation");
                StepOutcome::UploadComplete
            }
            (step, phase) => {
                debug!(participant = %self.participant, ?step, ?phase, "Stale upload step ignored");
                StepOutcome::Ignored
            }
        }
    }

    /// Abort an in-flight upload. The artifact stays selected.
    pub fn cancel_upload<S: Scheduler<UploadStep>>(&mut self, scheduler: &mut S) -> Result<()> {
        self.require(WizardPhase::Uploading, "cancel the upload")?;
        self.clear_timer(scheduler);
        self.progress = 0;
        self.checks = fresh_checks(&self.config);
        self.phase = WizardPhase::SelectingFile;
        info!(participant = %self.participant, "Upload cancelled");
        Ok(())
    }

    /// Finalize the contribution into `state`. Terminal for this wizard.
    pub fn confirm(
        &mut self,
        state: &mut ParticipantUploadState,
        rng: &mut dyn RandomSource,
    ) -> Result<ContributionAudit> {
        self.require(WizardPhase::UploadComplete, "confirm")?;
        let artifact = self
            .artifact
            .clone()
            .ok_or(FedPharmError::MissingArtifact)?;

        let audit = ContributionAudit::new(self.participant, &artifact, &self.form.version, rng);

        state.file = Some(artifact);
        state.optimizer = self.form.optimizer;
        state.submission_type = self.form.submission_type;
        state.version = self.form.version.clone();
        state.is_uploaded = true;
        state.audit_tx_id = Some(audit.tx_id.clone());
        state.is_compliant = self.checks.iter().all(|c| c.passed);

        self.phase = WizardPhase::Confirmed;
        info!(participant = %self.participant, tx_id = %audit.tx_id, "Contribution confirmed");
        Ok(audit)
    }

    /// Close the wizard without confirming: drop any pending timer and start
    /// over. A confirmed wizard stays confirmed.
    pub fn close<S: Scheduler<UploadStep>>(&mut self, scheduler: &mut S) {
        if self.phase == WizardPhase::Confirmed {
            return;
        }
        self.clear_timer(scheduler);
        self.phase = WizardPhase::SelectingFile;
        self.artifact = None;
        self.validation_error = None;
        self.form = SubmissionForm::default();
        self.progress = 0;
        self.checks = fresh_checks(&self.config);
    }

    fn require(&self, phase: WizardPhase, action: &str) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(FedPharmError::InvalidTransition(format!(
                "{}: cannot {action} while {:?}",
                self.participant, self.phase
            )))
        }
    }

    fn clear_timer<S: Scheduler<UploadStep>>(&mut self, scheduler: &mut S) {
        if let Some(h) = self.timer.take() {
            scheduler.cancel(h);
        }
    }

    fn replace_timer<S, F>(&mut self, scheduler: &mut S, arm: F)
    where
        S: Scheduler<UploadStep>,
        F: FnOnce(&mut S, &UploadConfig) -> TimerHandle,
    {
        self.clear_timer(scheduler);
        self.timer = Some(arm(scheduler, &self.config));
    }
}

fn fresh_checks(config: &UploadConfig) -> Vec<ComplianceCheck> {
    config
        .compliance_checks
        .iter()
        .map(|c| ComplianceCheck { name: c.name.clone(), threshold: c.threshold, passed: false })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SequenceSource;
    use crate::scheduler::TimerQueue;
    use std::time::Duration;

    fn wizard() -> (UploadWizard, TimerQueue<UploadStep>) {
        (UploadWizard::new(ParticipantId::Hospital, UploadConfig::default()), TimerQueue::new())
    }

    fn run_for(w: &mut UploadWizard, q: &mut TimerQueue<UploadStep>, ms: u64) -> Vec<StepOutcome> {
        let target = q.now() + Duration::from_millis(ms);
        let mut out = Vec::new();
        while let Some((_, step)) = q.pop_due(target) {
            out.push(w.on_step(step, q));
        }
        q.advance_clock(target);
        out
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        let (mut w, _) = wizard();
        let err = w.select_file(ModelArtifact::new("weights.pt", 5)).unwrap_err();
        assert!(err.is_validation());
        assert!(w.artifact().is_none());
        assert!(w.validation_error().unwrap().contains(".bin, .model, .h5"));

        w.select_file(ModelArtifact::new("weights.MODEL", 5)).unwrap();
        assert!(w.validation_error().is_none());
    }

    #[test]
    fn test_submit_without_file_sets_error() {
        let (mut w, mut q) = wizard();
        assert!(matches!(w.submit(SubmissionForm::default(), &mut q), Err(FedPharmError::MissingArtifact)));
        assert_eq!(w.phase(), WizardPhase::SelectingFile);
        assert!(q.is_empty());
    }

    #[test]
    fn test_full_upload_reveals_checks_in_order() {
        let (mut w, mut q) = wizard();
        w.select_file(ModelArtifact::new("Client1.bin", 2048)).unwrap();
        w.submit(SubmissionForm::default(), &mut q).unwrap();
        assert_eq!(w.phase(), WizardPhase::Submitting);

        assert_eq!(run_for(&mut w, &mut q, 400), vec![StepOutcome::UploadStarted]);
        assert_eq!(w.phase(), WizardPhase::Uploading);

        let mut last = 0;
        let mut reveal_order = Vec::new();
        for _ in 0..10 {
            for outcome in run_for(&mut w, &mut q, 150) {
                if let StepOutcome::Progressed { progress, newly_passed } = outcome {
                    assert!(progress > last);
                    last = progress;
                    for name in newly_passed {
                        reveal_order.push((name, progress));
                    }
                }
            }
        }
        assert_eq!(last, 100);
        assert_eq!(
            reveal_order,
            vec![
                ("HIPAA".to_string(), 30),
                ("GDPR".to_string(), 60),
                ("WHO Bioethics".to_string(), 90),
            ]
        );
        assert_eq!(w.phase(), WizardPhase::Uploading);

        assert_eq!(run_for(&mut w, &mut q, 500), vec![StepOutcome::UploadComplete]);
        assert!(q.is_empty());

        let mut state = ParticipantUploadState::default();
        let audit = w.confirm(&mut state, &mut SequenceSource::constant(0.4)).unwrap();
        assert!(state.is_uploaded);
        assert!(state.is_compliant);
        assert_eq!(state.audit_tx_id.as_deref(), Some(audit.tx_id.as_str()));
        assert_eq!(w.phase(), WizardPhase::Confirmed);
    }

    #[test]
    fn test_cancel_discards_progress_and_timer() {
        let (mut w, mut q) = wizard();
        w.select_file(ModelArtifact::new("Client1.h5", 1)).unwrap();
        w.submit(SubmissionForm::default(), &mut q).unwrap();
        run_for(&mut w, &mut q, 400 + 450);
        assert_eq!(w.progress(), 30);

        w.cancel_upload(&mut q).unwrap();
        assert_eq!(w.phase(), WizardPhase::SelectingFile);
        assert_eq!(w.progress(), 0);
        assert!(w.artifact().is_some());
        assert!(w.compliance().iter().all(|c| !c.passed));
        assert!(q.is_empty());
        assert!(run_for(&mut w, &mut q, 5_000).is_empty());
    }

    #[test]
    fn test_cancel_during_completion_delay_drops_finish() {
        let (mut w, mut q) = wizard();
        w.select_file(ModelArtifact::new("Client1.bin", 1)).unwrap();
        w.submit(SubmissionForm::default(), &mut q).unwrap();
        run_for(&mut w, &mut q, 400 + 1500);
        assert_eq!(w.progress(), 100);
        w.cancel_upload(&mut q).unwrap();
        assert!(run_for(&mut w, &mut q, 1_000).is_empty());
        assert_eq!(w.phase(), WizardPhase::SelectingFile);
    }

    #[test]
    fn test_confirm_requires_complete_upload() {
        let (mut w, mut q) = wizard();
        w.select_file(ModelArtifact::new("Client1.bin", 1)).unwrap();
        w.submit(SubmissionForm::default(), &mut q).unwrap();
        let mut state = ParticipantUploadState::default();
        assert!(w.confirm(&mut state, &mut SequenceSource::constant(0.1)).is_err());
        assert!(!state.is_uploaded);
        assert!(w.cancel_upload(&mut q).is_err());
    }

    #[test]
    fn test_close_resets_unconfirmed_wizard() {
        let (mut w, mut q) = wizard();
        w.select_file(ModelArtifact::new("Client1.bin", 1)).unwrap();
        w.submit(SubmissionForm::default(), &mut q).unwrap();
        w.close(&mut q);
        assert_eq!(w.phase(), WizardPhase::SelectingFile);
        assert!(w.artifact().is_none());
        assert!(q.is_empty());
    }
}
