//! Generic append-only JSONL event log.
//!
//! Generalizes the teacher's `MemoryEventLog` (`crates/memory/src/event_log.rs`)
//! from a single `MemoryEntry` payload to any `Serialize + DeserializeOwned`
//! record, so it backs the conversation store (C10), the memory store (C2),
//! and the agent config version store (C11) with the same crash-safety
//! guarantees: append is `fsync`'d, and `overwrite` writes to a `.tmp`
//! sibling and `rename`s over the original so a crash never leaves a
//! half-written log.

use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;

#[derive(Debug)]
pub struct EventLog<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> Clone for EventLog<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> EventLog<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, `fsync`-ing before returning so the record survives
    /// a crash immediately after the call.
    pub async fn append(&self, record: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let line = serde_json::to_string(record)?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Atomically replace the whole log. Writes a `.tmp` sibling, `fsync`s,
    /// then `rename`s over the original. A crash at any point leaves either
    /// the old file (rename never happened) or the new one (rename
    /// completed) — never a partial file.
    pub async fn overwrite(&self, records: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = {
            let filename = self
                .path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "events.jsonl".to_string());
            self.path.with_file_name(format!("{filename}.tmp"))
        };

        let write_result: Result<()> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await?;
            for record in records {
                let line = serde_json::to_string(record)?;
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        Ok(())
    }

    /// Load every well-formed record. A corrupt line is skipped and logged,
    /// never fails the whole load.
    pub fn load(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::OpenOptions::new().read(true).open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_idx, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(
                        line = line_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "corrupt JSONL record — skipping line"
                    );
                }
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Rec {
        n: u32,
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("conclave-eventlog-{}.jsonl", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let log: EventLog<Rec> = EventLog::new(temp_path());
        log.append(&Rec { n: 1 }).await.unwrap();
        log.append(&Rec { n: 2 }).await.unwrap();
        let loaded = log.load().unwrap();
        assert_eq!(loaded, vec![Rec { n: 1 }, Rec { n: 2 }]);
    }

    #[tokio::test]
    async fn overwrite_replaces_contents_atomically() {
        let log: EventLog<Rec> = EventLog::new(temp_path());
        log.append(&Rec { n: 1 }).await.unwrap();
        log.overwrite(&[Rec { n: 9 }]).await.unwrap();
        assert_eq!(log.load().unwrap(), vec![Rec { n: 9 }]);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let log: EventLog<Rec> = EventLog::new(temp_path());
        assert!(log.load().unwrap().is_empty());
    }
}
