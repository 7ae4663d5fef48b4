//! The session task under a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use fedpharm_common::{ChatRole, ModelArtifact, ParticipantId};
use fedpharm_llm::scripted::ScriptedBackend;
use fedpharm_llm::IntelligenceService;
use fedpharm_sim::rng::StdRandom;
use fedpharm_sim::simulator::SimulatorState;
use fedpharm_sim::upload::SubmissionForm;
use fedpharm_sim::{ActivityConfig, IntelligenceState, Session, SessionConfig, SessionEvent, SessionHandle};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

fn spawn(backend: ScriptedBackend) -> SessionHandle {
    let config = SessionConfig { activity: ActivityConfig::disabled(), ..Default::default() };
    let session = Session::new(config, Box::new(StdRandom::seeded(11)));
    SessionHandle::spawn(session, Arc::new(IntelligenceService::new(Arc::new(backend))))
}

async fn next_matching<F>(rx: &mut Receiver<SessionEvent>, mut pred: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        match rx.recv().await {
            Ok(event) if pred(&event) => return event,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => panic!("session task stopped"),
        }
    }
}

async fn contribute_all(handle: &SessionHandle) {
    for id in ParticipantId::ALL {
        handle.select_file(id, ModelArtifact::new(id.example_file(), 1)).await.unwrap();
        handle.submit_upload(id, SubmissionForm::default()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(3)).await;
    for id in ParticipantId::ALL {
        handle.confirm_upload(id).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_training_completes_and_fetches_intelligence() {
    let handle = spawn(ScriptedBackend::replying("### Similar Compounds\n- Ibuprofen\n- Naproxen"));
    let mut events = handle.subscribe();

    contribute_all(&handle).await;
    assert!(handle.is_ready().await.unwrap());
    handle.start_training().await.unwrap();

    let report = match next_matching(&mut events, |e| matches!(e, SessionEvent::Intelligence { .. })).await {
        SessionEvent::Intelligence { report } => report,
        _ => unreachable!(),
    };
    assert!(!report.degraded);
    assert_eq!(report.knowledge_sections[0].items, vec!["Ibuprofen", "Naproxen"]);

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.state, SimulatorState::Complete);
    assert_eq!(snap.chart.len(), 20);
    assert!(snap.elapsed_ms >= 3_000 + 36_000);
    assert!(matches!(snap.intelligence, IntelligenceState::Ready { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_failed_intelligence_falls_back() {
    let handle = spawn(ScriptedBackend::failing());
    let mut events = handle.subscribe();
    contribute_all(&handle).await;
    handle.start_training().await.unwrap();

    let report = match next_matching(&mut events, |e| matches!(e, SessionEvent::Intelligence { .. })).await {
        SessionEvent::Intelligence { report } => report,
        _ => unreachable!(),
    };
    assert!(report.degraded);
    assert_eq!(report.admet, "data unavailable");

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.logs.last().unwrap().message, "Failed to fetch biomedical intelligence.");
    assert_eq!(snap.status.round, 20);
}

#[tokio::test(start_paused = true)]
async fn test_summary_streams_then_posts() {
    let backend = ScriptedBackend::replying("unused")
        .with_chunks(["**Decisions Made**", "\n- Rerun assay"])
        .with_latency(Duration::from_millis(500));
    let handle = spawn(backend);
    let mut events = handle.subscribe();

    handle.send_chat(ChatRole::You, "Shall we rerun?".into()).await.unwrap();
    handle.send_chat(ChatRole::Lab, "Yes, tomorrow.".into()).await.unwrap();
    assert!(handle.request_summary().await.unwrap());

    let mut chunks = Vec::new();
    let final_message = loop {
        match next_matching(&mut events, |e| {
            matches!(e, SessionEvent::SummaryChunk { .. })
                || matches!(e, SessionEvent::Chat { message } if message.role == ChatRole::System)
        })
        .await
        {
            SessionEvent::SummaryChunk { text } => chunks.push(text),
            SessionEvent::Chat { message } => break message,
            _ => unreachable!(),
        }
    };
    assert_eq!(chunks.len(), 2);
    assert_eq!(
        final_message.message,
        "✨ **Conversation Summary**\n\n**Decisions Made**\n- Rerun assay"
    );
    assert!(!handle.snapshot().await.unwrap().summarizing);
}

#[tokio::test(start_paused = true)]
async fn test_speech_published_for_participant_message() {
    let backend = ScriptedBackend::replying("").with_speech(vec![0u8; 4_800]);
    let handle = spawn(backend);
    let mut events = handle.subscribe();
    handle.set_tts(true).await.unwrap();
    handle.send_chat(ChatRole::Pharmacy, "Dosage table uploaded".into()).await.unwrap();

    match next_matching(&mut events, |e| matches!(e, SessionEvent::Speech { .. })).await {
        SessionEvent::Speech { text, sample_rate, frames, duration_ms, .. } => {
            assert_eq!(text, "Pharmacy said: Dosage table uploaded");
            assert_eq!(sample_rate, 24_000);
            assert_eq!(frames, 2_400);
            assert_eq!(duration_ms, 100);
        }
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_errors_cross_the_handle() {
    let handle = spawn(ScriptedBackend::failing());
    assert!(handle.start_training().await.is_err());
    assert!(handle.confirm_upload(ParticipantId::Hospital).await.is_err());
    assert!(handle.remove_collaborator("missing".into()).await.is_err());
}
