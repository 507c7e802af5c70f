//! Context compaction: fold old transcript into a rolling summary and an
//! append-only retrieval corpus.
//!
//! Each fold consumes the next unfolded slice of the raw message sequence
//! (skipping tombstoned messages), indexes it as overlapping chunks tagged with
//! the current round, and asks the generation capability for an updated
//! rolling summary. The fold cursor only ever advances; the corpus only
//! ever grows; the summary is replaced wholesale each fold.

use crate::message::Message;
use crate::provider::{Generate, GenerationError};
use crate::retrieval::{Fragment, RetrievalStore};
use groq::ChatMessage;
use serde::{Deserialize, Serialize};

const SUMMARIZER_PROMPT: &str = include_str!("prompts/summarizer.txt");

/// What a single fold did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldReport {
    /// Raw messages consumed (including skipped tool results).
    pub messages_consumed: usize,
    /// Foldable messages summarized.
    pub messages_folded: usize,
    /// Chunks added to the retrieval index.
    pub chunks_indexed: usize,
}

/// Compaction state for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compactor {
    /// Index into the raw message sequence; everything before it has been
    /// folded. Monotonically advancing.
    fold_cursor: usize,
    /// Rolling summary of everything behind the cursor.
    summary: Option<String>,
    batch: usize,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Compactor {
    pub fn new(batch: usize, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            fold_cursor: 0,
            summary: None,
            batch: batch.max(1),
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// How far the fold has advanced into the raw message sequence.
    pub fn fold_cursor(&self) -> usize {
        self.fold_cursor
    }

    /// The current rolling summary, if any fold has happened.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Restore state from a snapshot.
    pub fn restore(&mut self, fold_cursor: usize, summary: Option<String>) {
        self.fold_cursor = fold_cursor;
        self.summary = summary;
    }

    /// Whether there is unfolded material left to compact.
    pub fn has_unfolded(&self, history: &[Message]) -> bool {
        history[self.fold_cursor.min(history.len())..]
            .iter()
            .any(|m| m.is_foldable())
    }

    /// Re-index the already-folded prefix of a restored transcript.
    ///
    /// The snapshot does not carry the index itself; it is derived state.
    /// Original round tags are not recoverable, so rebuilt fragments are
    /// tagged round zero.
    pub async fn rebuild_index(&self, history: &[Message], retrieval: &mut dyn RetrievalStore) {
        let transcript: String = history[..self.fold_cursor.min(history.len())]
            .iter()
            .filter(|m| m.is_foldable())
            .map(|m| format!("{}: {}\n", m.speaker_label(), m.content))
            .collect();
        if transcript.is_empty() {
            return;
        }
        for chunk in split_chunks(&transcript, self.chunk_size, self.chunk_overlap) {
            retrieval.index(Fragment::new(chunk, 0)).await;
        }
    }

    /// Fold the next batch of messages.
    pub async fn fold(
        &mut self,
        history: &[Message],
        round: usize,
        provider: &dyn Generate,
        retrieval: &mut dyn RetrievalStore,
    ) -> Result<FoldReport, GenerationError> {
        let mut folded = Vec::new();
        let mut cursor = self.fold_cursor;

        while cursor < history.len() && folded.len() < self.batch {
            let message = &history[cursor];
            cursor += 1;
            if message.is_foldable() {
                folded.push(message);
            }
        }

        if folded.is_empty() {
            // Nothing but tombstones (or nothing at all); just advance.
            let consumed = cursor - self.fold_cursor;
            self.fold_cursor = cursor;
            return Ok(FoldReport {
                messages_consumed: consumed,
                ..FoldReport::default()
            });
        }

        let transcript: String = folded
            .iter()
            .map(|m| format!("{}: {}\n", m.speaker_label(), m.content))
            .collect();

        let chunks = split_chunks(&transcript, self.chunk_size, self.chunk_overlap);
        let chunk_count = chunks.len();
        for chunk in chunks {
            retrieval.index(Fragment::new(chunk, round)).await;
        }

        let prompt = SUMMARIZER_PROMPT
            .replace("{previous}", self.summary.as_deref().unwrap_or("(none yet)"))
            .replace("{recent}", &transcript);

        let generation = provider
            .complete(vec![ChatMessage::user(prompt)], Vec::new())
            .await?;

        let consumed = cursor - self.fold_cursor;
        self.summary = Some(generation.text);
        self.fold_cursor = cursor;

        log::debug!(
            "compaction fold: consumed {consumed} messages, indexed {chunk_count} chunks, cursor now {}",
            self.fold_cursor
        );

        Ok(FoldReport {
            messages_consumed: consumed,
            messages_folded: folded.len(),
            chunks_indexed: chunk_count,
        })
    }
}

/// Split text into overlapping chunks of at most `size` characters.
fn split_chunks(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::LexicalStore;
    use crate::testing::MockProvider;

    fn history() -> Vec<Message> {
        vec![
            Message::player("I walk into the noodle bar"),
            Message::gm("Steam curls around the counter."),
            Message::tool_result("2d10: [4, 7] = 11"),
            Message::player("I order the cheapest bowl"),
            Message::gm("The vendor slides it over."),
        ]
    }

    #[test]
    fn test_split_chunks_overlap() {
        let chunks = split_chunks("abcdefghij", 4, 2);
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn test_split_chunks_short_text() {
        let chunks = split_chunks("abc", 10, 2);
        assert_eq!(chunks, vec!["abc"]);
    }

    #[tokio::test]
    async fn test_fold_advances_cursor_and_grows_index() {
        let provider = MockProvider::new();
        provider.queue_text("Summary v1");
        let mut retrieval = LexicalStore::new();
        let mut compactor = Compactor::new(2, 500, 100);
        let history = history();

        let report = compactor
            .fold(&history, 1, &provider, &mut retrieval)
            .await
            .unwrap();

        assert_eq!(report.messages_folded, 2);
        assert_eq!(compactor.fold_cursor(), 2);
        assert_eq!(retrieval.len(), report.chunks_indexed);
        assert!(report.chunks_indexed > 0);
        assert_eq!(compactor.summary(), Some("Summary v1"));
    }

    #[tokio::test]
    async fn test_fold_skips_tool_results_and_never_refolds() {
        let provider = MockProvider::new();
        provider.queue_text("Summary v1");
        provider.queue_text("Summary v2");
        let mut retrieval = LexicalStore::new();
        let mut compactor = Compactor::new(2, 500, 100);
        let history = history();

        compactor
            .fold(&history, 1, &provider, &mut retrieval)
            .await
            .unwrap();
        let before = retrieval.len();

        let report = compactor
            .fold(&history, 2, &provider, &mut retrieval)
            .await
            .unwrap();

        // Second fold consumes the tool result plus the remaining dialogue,
        // never revisiting the already-folded prefix.
        assert_eq!(report.messages_folded, 2);
        assert_eq!(compactor.fold_cursor(), 5);
        assert!(retrieval.len() > before);
        assert_eq!(compactor.summary(), Some("Summary v2"));
        assert!(!compactor.has_unfolded(&history));
    }

    #[tokio::test]
    async fn test_summary_is_replaced_not_appended() {
        let provider = MockProvider::new();
        provider.queue_text("first");
        provider.queue_text("second");
        let mut retrieval = LexicalStore::new();
        let mut compactor = Compactor::new(1, 500, 100);
        let history = history();

        compactor
            .fold(&history, 1, &provider, &mut retrieval)
            .await
            .unwrap();
        compactor
            .fold(&history, 2, &provider, &mut retrieval)
            .await
            .unwrap();

        assert_eq!(compactor.summary(), Some("second"));
    }
}
