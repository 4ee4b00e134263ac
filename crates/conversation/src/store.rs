//! C10 — Conversation Store: append-only, per-session message log.
//!
//! Follows the same event-log-plus-in-memory-cache shape as
//! `conclave_memory::store::MemoryStore`, specialized to one JSONL file per
//! session so per-session writes never contend with each other (spec §5:
//! "writes use short-lived locks scoped to a single item or single
//! session").

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use conclave_core::EventLog;

use crate::schema::Message;

struct SessionLog {
    event_log: EventLog<Message>,
    messages: Vec<Message>,
    next_seq: u64,
}

impl SessionLog {
    fn open(path: PathBuf) -> Result<Self> {
        let event_log: EventLog<Message> = EventLog::new(path);
        let messages = event_log.load()?;
        // `max`, not the last element: `replace_prefix_with_summary` does not
        // guarantee the on-disk message order matches ascending `seq` (the
        // summary it inserts keeps the highest `seq` in the session, since it
        // is the newest insertion, but the persisted vector is sorted by
        // `seq` for `list`/`all`'s "oldest first" contract — computing this
        // from the last element would under-count after such a rewrite).
        let next_seq = messages.iter().map(|m| m.seq).max().map(|s| s + 1).unwrap_or(1);
        Ok(Self { event_log, messages, next_seq })
    }
}

pub struct ConversationStore {
    data_dir: PathBuf,
    sessions: DashMap<Uuid, Arc<Mutex<SessionLog>>>,
}

impl ConversationStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            sessions: DashMap::new(),
        }
    }

    fn session_path(&self, session_id: Uuid) -> PathBuf {
        self.data_dir.join("conversations").join(format!("{session_id}.jsonl"))
    }

    async fn session(&self, session_id: Uuid) -> Result<Arc<Mutex<SessionLog>>> {
        if let Some(existing) = self.sessions.get(&session_id) {
            return Ok(existing.clone());
        }
        let log = SessionLog::open(self.session_path(session_id))?;
        let entry = Arc::new(Mutex::new(log));
        self.sessions.insert(session_id, entry.clone());
        Ok(entry)
    }

    /// `append(msg)` — assigns the next sequence number for the message's
    /// session and persists it. Returns the assigned `seq`.
    pub async fn append(&self, mut message: Message) -> Result<u64> {
        let session_id = message.session_id;
        let log = self.session(session_id).await?;
        let mut log = log.lock().await;
        let seq = log.next_seq;
        message.seq = seq;
        log.event_log.append(&message).await?;
        log.messages.push(message);
        log.next_seq += 1;
        Ok(seq)
    }

    /// `list(session, limit, cursor)` — messages with `seq > cursor`
    /// (`cursor = None` starts from the beginning), oldest first, capped at
    /// `limit`. Returns the page and the cursor to pass for the next page
    /// (`None` once exhausted).
    pub async fn list(&self, session_id: Uuid, limit: usize, cursor: Option<u64>) -> Result<(Vec<Message>, Option<u64>)> {
        let log = self.session(session_id).await?;
        let log = log.lock().await;
        let start = cursor.unwrap_or(0);
        let mut page: Vec<Message> = log
            .messages
            .iter()
            .filter(|m| m.seq > start)
            .take(limit)
            .cloned()
            .collect();
        let next_cursor = if page.len() == limit {
            page.last().map(|m| m.seq)
        } else {
            None
        };
        if page.is_empty() {
            page = Vec::new();
        }
        Ok((page, next_cursor))
    }

    /// All messages for a session, oldest first. Used by the context
    /// assembler and summarizer, which need the full ordered log rather
    /// than a page.
    pub async fn all(&self, session_id: Uuid) -> Result<Vec<Message>> {
        let log = self.session(session_id).await?;
        let log = log.lock().await;
        Ok(log.messages.clone())
    }

    /// `clear(session)` — deletes all messages without archiving.
    pub async fn clear(&self, session_id: Uuid) -> Result<()> {
        let log = self.session(session_id).await?;
        let mut log = log.lock().await;
        log.event_log.overwrite(&[]).await?;
        log.messages.clear();
        Ok(())
    }

    /// `replace_prefix_with_summary(session, up_to_seq, summary_text)`
    /// (spec §4.10): deletes messages with `seq <= up_to_seq` and inserts a
    /// single `role=system, message_type=system` message bearing the
    /// summary, assigned the session's next `seq` (it is itself a fresh
    /// insertion, newer than everything it replaces). Idempotent: a second
    /// call with the same `up_to_seq` is a no-op (invariant 10) because no
    /// messages remain at or below it.
    pub async fn replace_prefix_with_summary(&self, session_id: Uuid, up_to_seq: u64, summary_text: impl Into<String>) -> Result<()> {
        let log = self.session(session_id).await?;
        let mut log = log.lock().await;

        let has_prefix = log.messages.iter().any(|m| m.seq <= up_to_seq);
        if !has_prefix {
            return Ok(());
        }

        let retained: Vec<Message> = log.messages.iter().filter(|m| m.seq > up_to_seq).cloned().collect();
        if let Some(first_retained) = retained.first() {
            if first_retained.seq <= up_to_seq {
                bail!("replace_prefix_with_summary: retained message has seq <= up_to_seq");
            }
        }

        let mut summary = Message::system_summary(session_id, summary_text);
        summary.seq = log.next_seq;
        log.next_seq += 1;

        // The summary is the newest insertion (its `seq` is the session's
        // highest), so it sorts after `retained` here; `seq` ascending is
        // this store's only ordering contract (`list`/`all`'s "oldest
        // first"), not vector-insertion position, and the in-memory vector
        // must stay sorted by `seq` for that contract and for `SessionLog::
        // open`'s `next_seq` recovery to stay correct across a restart.
        let mut new_messages = retained;
        new_messages.push(summary);
        new_messages.sort_by_key(|m| m.seq);

        log.event_log.overwrite(&new_messages).await?;
        log.messages = new_messages;
        Ok(())
    }
}
