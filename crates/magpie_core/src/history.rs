//! Append-only line-oriented message archive.
//!
//! One flat text file per conversation, one message per line, in
//! chronological order. Reads and writes across all conversations share a
//! single async mutex so a window read cannot interleave with a backfill
//! write. The most recently shown window is remembered process-wide so
//! `context` and `more` can page relative to it.

use std::io;
use std::path::PathBuf;

use rand::Rng;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::utils;

/// Default number of lines per history window.
pub const DEFAULT_WINDOW_SIZE: usize = 5;
/// Lines shown by `context` and `more`.
pub const PAGE_SIZE: usize = 10;

/// Half-open line range `[start, stop)` of the most recently shown slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: usize,
    pub stop: usize,
}

impl std::fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// Result of one archive search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Matching lines formatted `index: line`, truncated to the caller's cap.
    pub matches: Vec<String>,
    /// Untruncated match count.
    pub total: usize,
}

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    /// Serializes every archive read and write, across all conversations.
    file_lock: Mutex<()>,
    window: parking_lot::Mutex<HistoryWindow>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: Mutex::new(()),
            window: parking_lot::Mutex::new(HistoryWindow { start: 1, stop: 2 }),
        }
    }

    /// The last window shown by any read, process-wide.
    pub fn last_window(&self) -> HistoryWindow {
        *self.window.lock()
    }

    /// Archive file for a conversation's backfill, next to the main file.
    pub fn archive_path(&self, conversation: &str) -> PathBuf {
        let file = format!("messages_{conversation}.txt");
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(file),
            _ => PathBuf::from(file),
        }
    }

    /// Overwrite a conversation's archive with newline-joined lines.
    pub async fn write_session(&self, conversation: &str, lines: &[String]) -> Result<()> {
        let _guard = self.file_lock.lock().await;
        tokio::fs::write(self.archive_path(conversation), lines.join("\n")).await?;
        Ok(())
    }

    /// Read the configured archive. A file that does not exist yet (the
    /// backfill may still be running) reads as empty.
    async fn read_lines(&self) -> Result<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }

    /// Read a window of `size` lines starting at `start`, or at a uniform
    /// random position when `start` is unset. Out-of-range starts clamp
    /// rather than error; the returned slice becomes the new last window.
    pub async fn read_window(&self, start: Option<usize>, size: usize) -> Result<Vec<String>> {
        let _guard = self.file_lock.lock().await;
        let lines = self.read_lines().await?;
        let total = lines.len();
        let top = total.saturating_sub(size);
        let start = match start {
            Some(start) => start.min(top),
            None if top > 0 => rand::rng().random_range(0..=top),
            None => 0,
        };
        let stop = (start + size).min(total);
        *self.window.lock() = HistoryWindow { start, stop };
        Ok(lines[start..stop].to_vec())
    }

    /// The ten lines before the last window's start.
    pub async fn read_context(&self) -> Result<Vec<String>> {
        let start = self.last_window().start.saturating_sub(PAGE_SIZE);
        self.read_window(Some(start), PAGE_SIZE).await
    }

    /// The ten lines after the last window's stop.
    pub async fn read_more(&self) -> Result<Vec<String>> {
        let start = self.last_window().stop;
        self.read_window(Some(start), PAGE_SIZE).await
    }

    /// Scan for `query` as a substring, starting at line `cursor`.
    ///
    /// Lines where the field separator appears 4+ times are skipped as
    /// corrupted. The cursor is never advanced here; only the `set`
    /// command moves it.
    pub async fn search(
        &self,
        query: &str,
        cursor: usize,
        max_results: usize,
    ) -> Result<SearchOutcome> {
        let _guard = self.file_lock.lock().await;
        let lines = self.read_lines().await?;
        let mut matches: Vec<String> = lines
            .iter()
            .enumerate()
            .skip(cursor)
            .filter(|(_, line)| {
                line.contains(query) && line.matches(utils::SEPARATOR).count() < 4
            })
            .map(|(index, line)| format!("{index}: {line}"))
            .collect();
        let total = matches.len();
        matches.truncate(max_results);
        Ok(SearchOutcome { matches, total })
    }
}
