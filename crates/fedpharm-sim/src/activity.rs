//! Simulated collaborator activity: the project roster, a collaborator who
//! joins after a delay, and participant typing indicators.

use std::collections::HashMap;
use std::time::Duration;

use fedpharm_common::{ChatRole, Collaborator, CollaboratorRole, FedPharmError, Institution, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ActivityConfig;
use crate::rng::RandomSource;
use crate::scheduler::{Scheduler, TimerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    CollaboratorJoin,
    TypingPoll,
    TypingDone(ChatRole),
}

/// Fields a caller supplies when adding a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorDraft {
    pub name: String,
    pub role: CollaboratorRole,
    pub institution: Institution,
}

impl CollaboratorDraft {
    /// The collaborator who joins on their own partway through a session.
    pub fn simulated_joiner() -> Self {
        Self {
            name: "Dr. Alex Ray".to_string(),
            role: CollaboratorRole::Bioinformatician,
            institution: Institution::Lab,
        }
    }
}

// ── Roster ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CollaboratorRoster {
    members: Vec<Collaborator>,
}

impl Default for CollaboratorRoster {
    fn default() -> Self {
        let seed = [
            ("Dr. Evelyn Reed", CollaboratorRole::MedicalDirector, Institution::Platform, "5m ago"),
            ("Dr. Kenji Tanaka", CollaboratorRole::ClinicalResearcher, Institution::Hospital, "2h ago"),
            ("Dr. Sofia Rossi", CollaboratorRole::Pharmacologist, Institution::Pharmacy, "yesterday"),
            ("Ben Carter", CollaboratorRole::Bioinformatician, Institution::Platform, "15m ago"),
            ("Aisha Khan", CollaboratorRole::RegulatoryAffairs, Institution::Platform, "online"),
            ("Dr. Marcus Chen", CollaboratorRole::LabTechnician, Institution::Lab, "8h ago"),
        ];
        let members = seed
            .into_iter()
            .enumerate()
            .map(|(i, (name, role, institution, last_active))| Collaborator {
                id: (i + 1).to_string(),
                name: name.to_string(),
                role,
                institution,
                last_active: last_active.to_string(),
            })
            .collect();
        Self { members }
    }
}

impl CollaboratorRoster {
    pub fn members(&self) -> &[Collaborator] {
        &self.members
    }

    pub fn add(&mut self, draft: CollaboratorDraft) -> Collaborator {
        let member = Collaborator {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            role: draft.role,
            institution: draft.institution,
            last_active: "online".to_string(),
        };
        self.members.push(member.clone());
        member
    }

    pub fn remove(&mut self, id: &str) -> Result<Collaborator> {
        let idx = self
            .members
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| FedPharmError::UnknownCollaborator(id.to_string()))?;
        Ok(self.members.remove(idx))
    }
}

// ── Typing indicators ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct TypingTracker {
    config: ActivityConfig,
    typing: Vec<ChatRole>,
    stop_timers: HashMap<ChatRole, TimerHandle>,
    poll_timer: Option<TimerHandle>,
}

impl TypingTracker {
    pub fn new(config: ActivityConfig) -> Self {
        Self { config, typing: Vec::new(), stop_timers: HashMap::new(), poll_timer: None }
    }

    pub fn typing(&self) -> &[ChatRole] {
        &self.typing
    }

    pub fn start<S: Scheduler<ActivityEvent>>(&mut self, scheduler: &mut S) {
        if let Some(h) = self.poll_timer.take() {
            scheduler.cancel(h);
        }
        let interval = Duration::from_millis(self.config.typing_poll_ms);
        self.poll_timer = Some(scheduler.schedule_repeating(interval, ActivityEvent::TypingPoll));
    }

    /// Maybe start one participant typing. Returns the role that started.
    pub fn poll<S: Scheduler<ActivityEvent>>(
        &mut self,
        rng: &mut dyn RandomSource,
        scheduler: &mut S,
    ) -> Option<ChatRole> {
        let idle: Vec<ChatRole> = ChatRole::PARTICIPANTS
            .into_iter()
            .filter(|r| !self.typing.contains(r))
            .collect();
        if idle.is_empty() || !rng.chance(self.config.typing_probability) {
            return None;
        }

        let role = idle[rng.index(idle.len())];
        let jitter = rng.uniform(0.0, self.config.typing_jitter_ms as f64) as u64;
        let stop_after = Duration::from_millis(self.config.typing_min_ms + jitter);
        let handle = scheduler.schedule_once(stop_after, ActivityEvent::TypingDone(role));
        self.stop_timers.insert(role, handle);
        self.typing.push(role);
        Some(role)
    }

    /// Stop-typing timer fired. Returns false if the role was not typing.
    pub fn done(&mut self, role: ChatRole) -> bool {
        self.stop_timers.remove(&role);
        let before = self.typing.len();
        self.typing.retain(|r| *r != role);
        self.typing.len() != before
    }

    pub fn stop<S: Scheduler<ActivityEvent>>(&mut self, scheduler: &mut S) {
        if let Some(h) = self.poll_timer.take() {
            scheduler.cancel(h);
        }
        for (_, h) in self.stop_timers.drain() {
            scheduler.cancel(h);
        }
        self.typing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SequenceSource;
    use crate::scheduler::TimerQueue;

    #[test]
    fn test_roster_add_and_remove() {
        let mut roster = CollaboratorRoster::default();
        assert_eq!(roster.members().len(), 6);
        let added = roster.add(CollaboratorDraft::simulated_joiner());
        assert_eq!(added.last_active, "online");
        assert_eq!(roster.members().len(), 7);
        roster.remove(&added.id).unwrap();
        assert!(roster.remove(&added.id).is_err());
        assert_eq!(roster.members().len(), 6);
    }

    #[test]
    fn test_typing_starts_and_stops() {
        let mut q: TimerQueue<ActivityEvent> = TimerQueue::new();
        let mut t = TypingTracker::new(ActivityConfig::default());
        // chance 0.1 < 0.3, index 0.1 * 3 -> Hospital, jitter 0.1 * 3000 = 300
        let mut rng = SequenceSource::constant(0.1);
        assert_eq!(t.poll(&mut rng, &mut q), Some(ChatRole::Hospital));
        assert_eq!(t.typing(), &[ChatRole::Hospital]);
        assert_eq!(q.next_deadline(), Some(Duration::from_millis(2_300)));

        let (_, ev) = q.pop_due(Duration::from_millis(2_300)).unwrap();
        assert_eq!(ev, ActivityEvent::TypingDone(ChatRole::Hospital));
        assert!(t.done(ChatRole::Hospital));
        assert!(t.typing().is_empty());
    }

    #[test]
    fn test_typing_skipped_when_chance_fails() {
        let mut q: TimerQueue<ActivityEvent> = TimerQueue::new();
        let mut t = TypingTracker::new(ActivityConfig::default());
        assert_eq!(t.poll(&mut SequenceSource::constant(0.9), &mut q), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_stop_cancels_everything() {
        let mut q: TimerQueue<ActivityEvent> = TimerQueue::new();
        let mut t = TypingTracker::new(ActivityConfig::default());
        t.start(&mut q);
        t.poll(&mut SequenceSource::constant(0.1), &mut q);
        assert_eq!(q.len(), 2);
        t.stop(&mut q);
        assert!(q.is_empty());
        assert!(t.typing().is_empty());
    }
}
