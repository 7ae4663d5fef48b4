//! Wall-clock driver for a `Session`.
//!
//! One tokio task owns the session. Commands arrive over an mpsc channel,
//! the task sleeps until the next timer deadline in between, and every
//! resulting `SessionEvent` is broadcast to subscribers. Remote calls run
//! as separate tasks and report back through a second channel, so the
//! session is never blocked by them.

use std::sync::Arc;

use anyhow::anyhow;
use fedpharm_common::{ChatMessage, ChatRole, Collaborator, FedPharmError, ModelArtifact, ParticipantId, Result};
use fedpharm_llm::{BiomedicalIntelligence, IntelligenceService};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::activity::CollaboratorDraft;
use crate::audit::ContributionAudit;
use crate::session::{Session, SessionEffect, SessionEvent, SessionSnapshot};
use crate::upload::SubmissionForm;

type Job = Box<dyn FnOnce(&mut Session) + Send>;

enum RemoteResult {
    Intelligence { request: u64, report: BiomedicalIntelligence },
    Summary(std::result::Result<String, String>),
}

/// Cloneable handle to a running session task.
#[derive(Clone)]
pub struct SessionHandle {
    jobs: mpsc::Sender<Job>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Move `session` onto its own task. Must be called inside a tokio
    /// runtime. The task stops once every handle is dropped.
    pub fn spawn(session: Session, intelligence: Arc<IntelligenceService>) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(64);
        let (events, _) = broadcast::channel(256);
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let actor = Actor {
            session,
            intelligence,
            jobs: jobs_rx,
            results: results_rx,
            results_tx,
            events: events.clone(),
            started: Instant::now(),
        };
        tokio::spawn(actor.run());

        Self { jobs: jobs_tx, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Run `f` against the session on its task and return the result.
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Session) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            let _ = reply_tx.send(f(session));
        });
        self.jobs
            .send(job)
            .await
            .map_err(|_| FedPharmError::Other(anyhow!("session task has stopped")))?;
        reply_rx
            .await
            .map_err(|_| FedPharmError::Other(anyhow!("session task dropped the request")))
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.call(|s| s.snapshot()).await
    }

    pub async fn is_ready(&self) -> Result<bool> {
        self.call(|s| s.is_ready()).await
    }

    pub async fn select_file(&self, id: ParticipantId, artifact: ModelArtifact) -> Result<()> {
        self.call(move |s| s.select_file(id, artifact)).await?
    }

    pub async fn submit_upload(&self, id: ParticipantId, form: SubmissionForm) -> Result<()> {
        self.call(move |s| s.submit_upload(id, form)).await?
    }

    pub async fn cancel_upload(&self, id: ParticipantId) -> Result<()> {
        self.call(move |s| s.cancel_upload(id)).await?
    }

    pub async fn confirm_upload(&self, id: ParticipantId) -> Result<ContributionAudit> {
        self.call(move |s| s.confirm_upload(id)).await?
    }

    pub async fn close_upload(&self, id: ParticipantId) -> Result<()> {
        self.call(move |s| s.close_upload(id)).await?
    }

    pub async fn set_privacy_noise(&self, enabled: bool) -> Result<()> {
        self.call(move |s| s.set_privacy_noise(enabled)).await?
    }

    pub async fn start_training(&self) -> Result<()> {
        self.call(|s| s.start_training()).await?
    }

    pub async fn cancel_training(&self) -> Result<()> {
        self.call(|s| s.cancel_training()).await?
    }

    pub async fn reset_training(&self) -> Result<()> {
        self.call(|s| s.reset_training()).await?
    }

    pub async fn send_chat(&self, role: ChatRole, text: String) -> Result<Option<ChatMessage>> {
        self.call(move |s| s.send_chat(role, &text)).await
    }

    pub async fn set_tts(&self, enabled: bool) -> Result<()> {
        self.call(move |s| s.set_tts(enabled)).await
    }

    pub async fn request_summary(&self) -> Result<bool> {
        self.call(|s| s.request_summary()).await?
    }

    pub async fn add_collaborator(&self, draft: CollaboratorDraft) -> Result<Collaborator> {
        self.call(move |s| s.add_collaborator(draft)).await
    }

    pub async fn remove_collaborator(&self, id: String) -> Result<Collaborator> {
        self.call(move |s| s.remove_collaborator(&id)).await?
    }
}

struct Actor {
    session: Session,
    intelligence: Arc<IntelligenceService>,
    jobs: mpsc::Receiver<Job>,
    results: mpsc::UnboundedReceiver<RemoteResult>,
    results_tx: mpsc::UnboundedSender<RemoteResult>,
    events: broadcast::Sender<SessionEvent>,
    started: Instant,
}

impl Actor {
    async fn run(mut self) {
        info!("Session task started");
        loop {
            self.flush();
            let deadline = self.session.next_deadline().map(|d| self.started + d);

            tokio::select! {
                job = self.jobs.recv() => match job {
                    Some(job) => {
                        self.catch_up();
                        job(&mut self.session);
                    }
                    None => break,
                },
                Some(result) = self.results.recv() => {
                    self.catch_up();
                    match result {
                        RemoteResult::Intelligence { request, report } => {
                            self.session.complete_intelligence(request, report)
                        }
                        RemoteResult::Summary(result) => self.session.finish_summary(result),
                    }
                }
                _ = sleep_until_deadline(deadline) => self.catch_up(),
            }
        }
        info!("Session task stopped");
    }

    /// Bring the session clock up to wall time before touching it.
    fn catch_up(&mut self) {
        self.session.advance_to(self.started.elapsed());
    }

    fn flush(&mut self) {
        for event in self.session.take_events() {
            // no subscribers is fine
            let _ = self.events.send(event);
        }
        for effect in self.session.take_effects() {
            self.perform(effect);
        }
    }

    fn perform(&self, effect: SessionEffect) {
        let intelligence = self.intelligence.clone();
        let results = self.results_tx.clone();
        let events = self.events.clone();

        match effect {
            SessionEffect::FetchIntelligence { request } => {
                tokio::spawn(async move {
                    let report = intelligence.fetch_biomedical_intelligence().await;
                    let _ = results.send(RemoteResult::Intelligence { request, report });
                });
            }
            SessionEffect::Summarize { transcript } => {
                tokio::spawn(async move {
                    let outcome = intelligence
                        .summarize(&transcript, |chunk| {
                            let _ = events.send(SessionEvent::SummaryChunk { text: chunk.to_string() });
                        })
                        .await
                        .map_err(|e| e.to_string());
                    let _ = results.send(RemoteResult::Summary(outcome));
                });
            }
            SessionEffect::Speak { text } => {
                tokio::spawn(async move {
                    match intelligence.speak(&text).await {
                        Ok(clip) => {
                            debug!(frames = clip.frames(), "Speech synthesised");
                            let _ = events.send(SessionEvent::Speech {
                                sample_rate: clip.format.sample_rate,
                                channels: clip.format.channels,
                                frames: clip.frames(),
                                duration_ms: clip.duration_ms(),
                                text,
                            });
                        }
                        Err(e) => warn!(error = %e, "Text-to-speech failed"),
                    }
                });
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
