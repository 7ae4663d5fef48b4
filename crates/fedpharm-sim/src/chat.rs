//! Collaboration chat state.

use fedpharm_common::{ChatMessage, ChatRole};

pub const NOT_ENOUGH_HISTORY: &str = "Not enough conversation history to generate a summary.";
pub const SUMMARY_FAILED: &str = "Sorry, an error occurred while generating the summary.";
pub const SUMMARY_HEADER: &str = "✨ **Conversation Summary**\n\n";

#[derive(Debug, Default, Clone)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    tts_enabled: bool,
    summarizing: bool,
}

impl ChatLog {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append a message. Blank messages are dropped.
    pub fn post(&mut self, role: ChatRole, text: &str) -> Option<ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        let msg = ChatMessage::now(role, text);
        self.messages.push(msg.clone());
        Some(msg)
    }

    pub fn system(&mut self, text: impl Into<String>) -> ChatMessage {
        let msg = ChatMessage::now(ChatRole::System, text);
        self.messages.push(msg.clone());
        msg
    }

    /// `Name: message` lines for every non-system message, or `None` when
    /// fewer than two such messages exist.
    pub fn transcript(&self) -> Option<String> {
        let relevant: Vec<&ChatMessage> =
            self.messages.iter().filter(|m| m.role != ChatRole::System).collect();
        if relevant.len() < 2 {
            return None;
        }
        Some(
            relevant
                .iter()
                .map(|m| format!("{}: {}", m.role.display_name(), m.message))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    pub fn tts_enabled(&self) -> bool {
        self.tts_enabled
    }

    pub fn set_tts(&mut self, enabled: bool) {
        self.tts_enabled = enabled;
    }

    pub fn is_summarizing(&self) -> bool {
        self.summarizing
    }

    pub fn set_summarizing(&mut self, summarizing: bool) {
        self.summarizing = summarizing;
    }

    /// Text to speak for `msg`, if speech is on and a participant sent it.
    pub fn speech_for(&self, msg: &ChatMessage) -> Option<String> {
        (self.tts_enabled && msg.role.is_participant())
            .then(|| format!("{} said: {}", msg.role.display_name(), msg.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_messages_ignored() {
        let mut chat = ChatLog::default();
        assert!(chat.post(ChatRole::You, "   ").is_none());
        assert!(chat.messages().is_empty());
    }

    #[test]
    fn test_transcript_needs_two_non_system_messages() {
        let mut chat = ChatLog::default();
        chat.system("Hospital has shared their model");
        chat.post(ChatRole::You, "hello");
        assert!(chat.transcript().is_none());
        chat.post(ChatRole::Lab, "assay results attached");
        assert_eq!(
            chat.transcript().unwrap(),
            "You: hello\nResearch Lab: assay results attached"
        );
    }

    #[test]
    fn test_speech_only_for_participants_when_enabled() {
        let mut chat = ChatLog::default();
        let msg = chat.post(ChatRole::Pharmacy, "dosage data ready").unwrap();
        assert!(chat.speech_for(&msg).is_none());
        chat.set_tts(true);
        assert_eq!(chat.speech_for(&msg).unwrap(), "Pharmacy said: dosage data ready");
        let mine = chat.post(ChatRole::You, "thanks").unwrap();
        assert!(chat.speech_for(&mine).is_none());
    }
}
