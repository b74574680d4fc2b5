//! The core models for managing a stateful chat with an LLM.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct TranscriptEntry {
    pub role: Speaker,
    pub content: String,
    // Set when the content describes a failed request rather than an
    // answer
    #[serde(default)]
    pub error: bool,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn user(content: &str) -> Self {
        Self::new(Speaker::User, content, false)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new(Speaker::Assistant, content, false)
    }

    pub fn error(content: &str) -> Self {
        Self::new(Speaker::Assistant, content, true)
    }

    fn new(role: Speaker, content: &str, error: bool) -> Self {
        Self {
            role,
            content: content.to_string(),
            error,
            created_at: Utc::now(),
        }
    }
}

/// Append-only conversation history for one session. Always holds at
/// least the seed entry it was created with.
#[derive(Clone, Debug)]
pub struct Transcript(Vec<TranscriptEntry>);

impl Transcript {
    pub fn new(seed: TranscriptEntry) -> Self {
        Self(vec![seed])
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.0.push(entry)
    }

    /// Clears the history and starts over from `seed`.
    pub fn reset(&mut self, seed: TranscriptEntry) {
        self.0 = vec![seed];
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptEntry> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting() -> TranscriptEntry {
        TranscriptEntry::assistant("Hello! What would you like to know?")
    }

    #[test]
    fn test_new_is_seeded() {
        let transcript = Transcript::new(greeting());
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].role, Speaker::Assistant);
    }

    #[test]
    fn test_reset_always_leaves_seed() {
        let mut transcript = Transcript::new(greeting());
        for i in 0..5 {
            transcript.push(TranscriptEntry::user(&format!("question {}", i)));
            transcript.push(TranscriptEntry::assistant("answer"));
        }
        assert_eq!(transcript.len(), 11);

        transcript.reset(greeting());
        assert_eq!(transcript.len(), 1);
        assert_eq!(
            transcript.last().unwrap().content,
            "Hello! What would you like to know?"
        );

        // Resetting an already reset transcript is still length 1
        transcript.reset(greeting());
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_entries_keep_order_and_duplicates() {
        let mut transcript = Transcript::new(greeting());
        transcript.push(TranscriptEntry::user("same"));
        transcript.push(TranscriptEntry::user("same"));
        let contents: Vec<&str> = transcript.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["Hello! What would you like to know?", "same", "same"]);

        // Reading is side effect free
        assert_eq!(transcript.entries().len(), transcript.entries().len());
    }

    #[test]
    fn test_entry_serialization() {
        let entry = TranscriptEntry::error("An error occurred: boom");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "An error occurred: boom");
        assert_eq!(json["error"], true);
    }
}
