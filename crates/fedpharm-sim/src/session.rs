//! The owned application state behind one dashboard session.
//!
//! `Session` owns a single `TimerQueue<TimerEvent>` and routes fired timers
//! to the Round Simulator, the per-participant Upload Wizards and the
//! simulated collaborator activity. It never performs I/O: remote work is
//! requested through `SessionEffect`s and results are fed back in through
//! `complete_intelligence` / `finish_summary`. Everything a presentation
//! layer needs to redraw is published as `SessionEvent`s.

use std::collections::BTreeMap;
use std::time::Duration;

use fedpharm_common::{
    ChartDataPoint, ChatMessage, ChatRole, Collaborator, FedPharmError, GlobalStatus, LogEntry,
    ModelArtifact, ParticipantId, ParticipantUploadState, Result,
};
use fedpharm_llm::BiomedicalIntelligence;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activity::{ActivityEvent, CollaboratorDraft, CollaboratorRoster, TypingTracker};
use crate::audit::ContributionAudit;
use crate::chat::{ChatLog, NOT_ENOUGH_HISTORY, SUMMARY_FAILED, SUMMARY_HEADER};
use crate::config::SessionConfig;
use crate::log::LogBuffer;
use crate::readiness;
use crate::rng::RandomSource;
use crate::scheduler::{Scheduler, Scoped, TimerQueue};
use crate::simulator::{RoundSimulator, RoundTick, RunOptions, SimulatorState, TickOutcome};
use crate::upload::{StepOutcome, SubmissionForm, UploadStep, UploadWizard, WizardView};

/// Every timer payload the session schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    RoundTick,
    Upload(ParticipantId, UploadStep),
    Activity(ActivityEvent),
}

/// Remote work the session wants done. The driver performs it and reports
/// back; the session never waits on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    FetchIntelligence { request: u64 },
    Summarize { transcript: String },
    Speak { text: String },
}

/// Notifications for presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Log { entry: LogEntry },
    Status { state: SimulatorState, status: GlobalStatus },
    Chart { point: ChartDataPoint },
    Readiness { ready: bool },
    Upload { wizard: WizardView },
    Contribution { participant: ParticipantId, upload: ParticipantUploadState },
    Chat { message: ChatMessage },
    Typing { roles: Vec<ChatRole> },
    SummaryChunk { text: String },
    Speech { text: String, sample_rate: u32, channels: u16, frames: usize, duration_ms: u64 },
    Collaborators { members: Vec<Collaborator> },
    Intelligence { report: BiomedicalIntelligence },
}

impl SessionEvent {
    /// The serialised `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::Status { .. } => "status",
            Self::Chart { .. } => "chart",
            Self::Readiness { .. } => "readiness",
            Self::Upload { .. } => "upload",
            Self::Contribution { .. } => "contribution",
            Self::Chat { .. } => "chat",
            Self::Typing { .. } => "typing",
            Self::SummaryChunk { .. } => "summary_chunk",
            Self::Speech { .. } => "speech",
            Self::Collaborators { .. } => "collaborators",
            Self::Intelligence { .. } => "intelligence",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntelligenceState {
    #[default]
    NotRequested,
    Pending { request: u64 },
    Ready { report: BiomedicalIntelligence },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub name: String,
    pub domain: String,
    pub description: String,
    pub example_file: String,
    pub upload: ParticipantUploadState,
    pub wizard: WizardView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub elapsed_ms: u64,
    pub state: SimulatorState,
    pub status: GlobalStatus,
    pub chart: Vec<ChartDataPoint>,
    pub privacy_noise: bool,
    pub ready: bool,
    pub participants: Vec<ParticipantView>,
    pub logs: Vec<LogEntry>,
    pub chat: Vec<ChatMessage>,
    pub typing: Vec<ChatRole>,
    pub tts_enabled: bool,
    pub summarizing: bool,
    pub collaborators: Vec<Collaborator>,
    pub intelligence: IntelligenceState,
    pub audit_trail: Vec<ContributionAudit>,
}

pub struct Session {
    config: SessionConfig,
    timers: TimerQueue<TimerEvent>,
    rng: Box<dyn RandomSource>,
    simulator: RoundSimulator,
    participants: BTreeMap<ParticipantId, ParticipantUploadState>,
    wizards: BTreeMap<ParticipantId, UploadWizard>,
    log: LogBuffer,
    chat: ChatLog,
    roster: CollaboratorRoster,
    typing: TypingTracker,
    privacy_noise: bool,
    intelligence: IntelligenceState,
    next_request: u64,
    audit_trail: Vec<ContributionAudit>,
    was_ready: bool,
    events: Vec<SessionEvent>,
    effects: Vec<SessionEffect>,
}

fn round_timers(timers: &mut TimerQueue<TimerEvent>) -> Scoped<'_, TimerEvent, impl Fn(RoundTick) -> TimerEvent> {
    timers.scoped(|_: RoundTick| TimerEvent::RoundTick)
}

fn upload_timers(
    timers: &mut TimerQueue<TimerEvent>,
    participant: ParticipantId,
) -> Scoped<'_, TimerEvent, impl Fn(UploadStep) -> TimerEvent> {
    timers.scoped(move |step| TimerEvent::Upload(participant, step))
}

fn activity_timers(timers: &mut TimerQueue<TimerEvent>) -> Scoped<'_, TimerEvent, impl Fn(ActivityEvent) -> TimerEvent> {
    timers.scoped(TimerEvent::Activity)
}

impl Session {
    pub fn new(config: SessionConfig, rng: Box<dyn RandomSource>) -> Self {
        let participants = ParticipantId::ALL
            .into_iter()
            .map(|p| (p, ParticipantUploadState::default()))
            .collect();
        let wizards = ParticipantId::ALL
            .into_iter()
            .map(|p| (p, UploadWizard::new(p, config.upload.clone())))
            .collect();

        let mut session = Self {
            timers: TimerQueue::new(),
            rng,
            simulator: RoundSimulator::new(config.simulation.clone()),
            participants,
            wizards,
            log: LogBuffer::new(config.simulation.log_capacity),
            chat: ChatLog::default(),
            roster: CollaboratorRoster::default(),
            typing: TypingTracker::new(config.activity.clone()),
            privacy_noise: false,
            intelligence: IntelligenceState::NotRequested,
            next_request: 0,
            audit_trail: Vec::new(),
            was_ready: false,
            events: Vec::new(),
            effects: Vec::new(),
            config,
        };

        if session.config.activity.enabled {
            let join_after = Duration::from_millis(session.config.activity.collaborator_join_delay_ms);
            activity_timers(&mut session.timers).schedule_once(join_after, ActivityEvent::CollaboratorJoin);
            session.typing.start(&mut activity_timers(&mut session.timers));
        }
        session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Virtual time since the session was created.
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn simulator(&self) -> &RoundSimulator {
        &self.simulator
    }

    pub fn participant(&self, id: ParticipantId) -> &ParticipantUploadState {
        &self.participants[&id]
    }

    pub fn wizard(&self, id: ParticipantId) -> &UploadWizard {
        &self.wizards[&id]
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn collaborators(&self) -> &[Collaborator] {
        self.roster.members()
    }

    pub fn intelligence(&self) -> &IntelligenceState {
        &self.intelligence
    }

    pub fn audit_trail(&self) -> &[ContributionAudit] {
        &self.audit_trail
    }

    pub fn logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.iter()
    }

    // ── Upload wizard ─────────────────────────────────────────────────────

    pub fn select_file(&mut self, id: ParticipantId, artifact: ModelArtifact) -> Result<()> {
        let wizard = self.wizards.get_mut(&id).ok_or_else(|| unknown(id))?;
        let result = wizard.select_file(artifact);
        let view = wizard.view();
        self.events.push(SessionEvent::Upload { wizard: view });
        result
    }

    pub fn submit_upload(&mut self, id: ParticipantId, form: SubmissionForm) -> Result<()> {
        let wizard = self.wizards.get_mut(&id).ok_or_else(|| unknown(id))?;
        wizard.submit(form, &mut upload_timers(&mut self.timers, id))?;
        let view = wizard.view();
        self.events.push(SessionEvent::Upload { wizard: view });
        Ok(())
    }

    pub fn cancel_upload(&mut self, id: ParticipantId) -> Result<()> {
        let wizard = self.wizards.get_mut(&id).ok_or_else(|| unknown(id))?;
        wizard.cancel_upload(&mut upload_timers(&mut self.timers, id))?;
        let view = wizard.view();
        self.events.push(SessionEvent::Upload { wizard: view });
        Ok(())
    }

    /// Record the contribution, announce it in chat and re-evaluate
    /// readiness.
    pub fn confirm_upload(&mut self, id: ParticipantId) -> Result<ContributionAudit> {
        let wizard = self.wizards.get_mut(&id).ok_or_else(|| unknown(id))?;
        let state = self.participants.get_mut(&id).ok_or_else(|| unknown(id))?;
        let audit = wizard.confirm(state, self.rng.as_mut())?;
        let view = wizard.view();
        let upload = state.clone();

        let file = upload.file.as_ref().map(|f| f.name.as_str()).unwrap_or_default();
        let message = self.chat.system(format!(
            "{} has shared their model \"{}\" (version {}) for aggregation.",
            id.name(),
            file,
            upload.version
        ));
        self.log.info(format!("{} contribution recorded on the audit ledger ({}).", id.name(), audit.tx_id));

        self.events.push(SessionEvent::Upload { wizard: view });
        self.events.push(SessionEvent::Contribution { participant: id, upload });
        self.events.push(SessionEvent::Chat { message });
        self.audit_trail.push(audit.clone());
        self.refresh_readiness();
        self.flush_logs();
        Ok(audit)
    }

    /// Close the wizard without confirming.
    pub fn close_upload(&mut self, id: ParticipantId) -> Result<()> {
        let wizard = self.wizards.get_mut(&id).ok_or_else(|| unknown(id))?;
        wizard.close(&mut upload_timers(&mut self.timers, id));
        let view = wizard.view();
        self.events.push(SessionEvent::Upload { wizard: view });
        Ok(())
    }

    // ── Training ──────────────────────────────────────────────────────────

    pub fn is_ready(&self) -> bool {
        readiness::is_ready(self.simulator.state(), self.participants.values())
    }

    pub fn privacy_noise(&self) -> bool {
        self.privacy_noise
    }

    /// Takes effect at the next `start_training`.
    pub fn set_privacy_noise(&mut self, enabled: bool) -> Result<()> {
        if self.simulator.is_running() {
            return Err(FedPharmError::InvalidTransition(
                "differential privacy cannot be changed during a run".into(),
            ));
        }
        self.privacy_noise = enabled;
        Ok(())
    }

    pub fn start_training(&mut self) -> Result<()> {
        if self.simulator.state() == SimulatorState::Idle && !self.is_ready() {
            return Err(FedPharmError::NotReady);
        }
        let options = RunOptions { privacy_noise: self.privacy_noise };
        self.simulator.start(options, &mut round_timers(&mut self.timers), &mut self.log)?;
        self.push_status();
        self.refresh_readiness();
        self.flush_logs();
        Ok(())
    }

    pub fn cancel_training(&mut self) -> Result<()> {
        self.simulator.cancel(&mut round_timers(&mut self.timers), &mut self.log)?;
        self.push_status();
        self.refresh_readiness();
        self.flush_logs();
        Ok(())
    }

    /// Return a finished or cancelled run to Idle. The previous run's
    /// intelligence report is discarded with it.
    pub fn reset_training(&mut self) -> Result<()> {
        self.simulator.reset(&mut round_timers(&mut self.timers))?;
        self.intelligence = IntelligenceState::NotRequested;
        self.push_status();
        self.refresh_readiness();
        self.flush_logs();
        Ok(())
    }

    // ── Time ──────────────────────────────────────────────────────────────

    pub fn advance(&mut self, by: Duration) {
        let target = self.timers.now() + by;
        self.advance_to(target);
    }

    /// Fire every timer due at or before `target`, in deadline order.
    pub fn advance_to(&mut self, target: Duration) {
        while let Some((_, event)) = self.timers.pop_due(target) {
            self.dispatch(event);
        }
        self.timers.advance_clock(target);
        self.flush_logs();
    }

    fn dispatch(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::RoundTick => {
                let outcome = self.simulator.tick(
                    self.rng.as_mut(),
                    &mut round_timers(&mut self.timers),
                    &mut self.log,
                );
                match outcome {
                    TickOutcome::Ignored => {}
                    TickOutcome::Advanced(point) => {
                        self.events.push(SessionEvent::Chart { point });
                        self.push_status();
                    }
                    TickOutcome::Finished { point, .. } => {
                        if let Some(point) = point {
                            self.events.push(SessionEvent::Chart { point });
                        }
                        self.push_status();
                        self.on_training_complete();
                    }
                }
            }
            TimerEvent::Upload(id, step) => {
                let Some(wizard) = self.wizards.get_mut(&id) else { return };
                let outcome = wizard.on_step(step, &mut upload_timers(&mut self.timers, id));
                if let StepOutcome::Progressed { newly_passed, .. } = &outcome {
                    for check in newly_passed {
                        debug!(participant = %id, check = %check, "Compliance check passed");
                    }
                }
                if outcome != StepOutcome::Ignored {
                    let view = wizard.view();
                    self.events.push(SessionEvent::Upload { wizard: view });
                }
            }
            TimerEvent::Activity(ActivityEvent::CollaboratorJoin) => {
                let member = self.roster.add(CollaboratorDraft::simulated_joiner());
                self.log.info(format!("{} has joined the project.", member.name));
                self.push_roster();
            }
            TimerEvent::Activity(ActivityEvent::TypingPoll) => {
                let started = self.typing.poll(self.rng.as_mut(), &mut activity_timers(&mut self.timers));
                if started.is_some() {
                    self.push_typing();
                }
            }
            TimerEvent::Activity(ActivityEvent::TypingDone(role)) => {
                if self.typing.done(role) {
                    self.push_typing();
                }
            }
        }
    }

    // ── Biomedical intelligence ───────────────────────────────────────────

    fn on_training_complete(&mut self) {
        if !matches!(self.intelligence, IntelligenceState::NotRequested) {
            return;
        }
        self.next_request += 1;
        let request = self.next_request;
        self.intelligence = IntelligenceState::Pending { request };
        self.log.info("Global model complete. Fetching biomedical intelligence...");
        self.effects.push(SessionEffect::FetchIntelligence { request });
    }

    /// Accept the result of a `FetchIntelligence` effect. Results for a
    /// request that is no longer pending are dropped.
    pub fn complete_intelligence(&mut self, request: u64, report: BiomedicalIntelligence) {
        match self.intelligence {
            IntelligenceState::Pending { request: pending } if pending == request => {}
            _ => {
                debug!(request, "Discarding stale intelligence result");
                return;
            }
        }
        if report.degraded {
            self.log.error("Failed to fetch biomedical intelligence.");
        } else {
            self.log.success("Biomedical intelligence suite successfully loaded.");
        }
        self.events.push(SessionEvent::Intelligence { report: report.clone() });
        self.intelligence = IntelligenceState::Ready { report };
        self.flush_logs();
    }

    // ── Chat ──────────────────────────────────────────────────────────────

    /// Post a message. Blank messages are ignored and return `None`.
    pub fn send_chat(&mut self, role: ChatRole, text: &str) -> Option<ChatMessage> {
        let message = self.chat.post(role, text)?;
        if let Some(speech) = self.chat.speech_for(&message) {
            self.effects.push(SessionEffect::Speak { text: speech });
        }
        self.events.push(SessionEvent::Chat { message: message.clone() });
        Some(message)
    }

    pub fn set_tts(&mut self, enabled: bool) {
        self.chat.set_tts(enabled);
    }

    /// Ask for a conversation summary. Returns false when there is too
    /// little history, in which case a System notice is posted instead.
    pub fn request_summary(&mut self) -> Result<bool> {
        if self.chat.is_summarizing() {
            return Err(FedPharmError::InvalidTransition("a summary is already being generated".into()));
        }
        let Some(transcript) = self.chat.transcript() else {
            let message = self.chat.system(NOT_ENOUGH_HISTORY);
            self.events.push(SessionEvent::Chat { message });
            return Ok(false);
        };
        self.chat.set_summarizing(true);
        self.effects.push(SessionEffect::Summarize { transcript });
        Ok(true)
    }

    /// Post the outcome of a `Summarize` effect.
    pub fn finish_summary(&mut self, result: std::result::Result<String, String>) {
        if !self.chat.is_summarizing() {
            debug!("Summary arrived with no request outstanding");
            return;
        }
        self.chat.set_summarizing(false);
        let text = match result {
            Ok(summary) => format!("{SUMMARY_HEADER}{summary}"),
            Err(reason) => {
                info!(%reason, "Conversation summary failed");
                SUMMARY_FAILED.to_string()
            }
        };
        let message = self.chat.system(text);
        self.events.push(SessionEvent::Chat { message });
    }

    // ── Collaborators ─────────────────────────────────────────────────────

    pub fn add_collaborator(&mut self, draft: CollaboratorDraft) -> Collaborator {
        let member = self.roster.add(draft);
        self.push_roster();
        member
    }

    pub fn remove_collaborator(&mut self, id: &str) -> Result<Collaborator> {
        let member = self.roster.remove(id)?;
        self.push_roster();
        Ok(member)
    }

    // ── Output ────────────────────────────────────────────────────────────

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        self.flush_logs();
        std::mem::take(&mut self.events)
    }

    pub fn take_effects(&mut self) -> Vec<SessionEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let participants = ParticipantId::ALL
            .into_iter()
            .map(|id| ParticipantView {
                id,
                name: id.name().to_string(),
                domain: id.domain().to_string(),
                description: id.description().to_string(),
                example_file: id.example_file().to_string(),
                upload: self.participants[&id].clone(),
                wizard: self.wizards[&id].view(),
            })
            .collect();

        SessionSnapshot {
            elapsed_ms: self.timers.now().as_millis() as u64,
            state: self.simulator.state(),
            status: *self.simulator.status(),
            chart: self.simulator.chart().to_vec(),
            privacy_noise: self.privacy_noise,
            ready: self.is_ready(),
            participants,
            logs: self.log.to_vec(),
            chat: self.chat.messages().to_vec(),
            typing: self.typing.typing().to_vec(),
            tts_enabled: self.chat.tts_enabled(),
            summarizing: self.chat.is_summarizing(),
            collaborators: self.roster.members().to_vec(),
            intelligence: self.intelligence.clone(),
            audit_trail: self.audit_trail.clone(),
        }
    }

    fn refresh_readiness(&mut self) {
        let ready = self.is_ready();
        if ready == self.was_ready {
            return;
        }
        self.was_ready = ready;
        if ready {
            self.log.success("All participants have contributed. Ready to start federated training.");
        }
        self.events.push(SessionEvent::Readiness { ready });
    }

    fn push_status(&mut self) {
        self.events.push(SessionEvent::Status {
            state: self.simulator.state(),
            status: *self.simulator.status(),
        });
    }

    fn push_typing(&mut self) {
        self.events.push(SessionEvent::Typing { roles: self.typing.typing().to_vec() });
    }

    fn push_roster(&mut self) {
        self.events.push(SessionEvent::Collaborators { members: self.roster.members().to_vec() });
    }

    fn flush_logs(&mut self) {
        for entry in self.log.take_new() {
            self.events.push(SessionEvent::Log { entry });
        }
    }
}

fn unknown(id: ParticipantId) -> FedPharmError {
    FedPharmError::UnknownParticipant(id.to_string())
}
