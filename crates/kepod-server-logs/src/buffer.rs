// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bounded ring buffer of recent log entries with live fan-out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::entry::{LogEntry, LogLevel};

/// Default buffer capacity.
pub const DEFAULT_CAPACITY: usize = 10_000;

const BROADCAST_CAPACITY: usize = 1024;

/// Filter for [`LogBuffer::query`]. The default matches everything.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
	pub limit: Option<usize>,
	pub min_level: Option<LogLevel>,
	pub target_prefix: Option<String>,
	/// Only entries whose `namespace` field equals this value.
	pub namespace: Option<String>,
	/// Only entries with an id greater than this.
	pub after_id: Option<u64>,
}

impl LogQuery {
	pub fn matches(&self, entry: &LogEntry) -> bool {
		if self.min_level.is_some_and(|min| entry.level < min) {
			return false;
		}
		if let Some(prefix) = &self.target_prefix {
			if !entry.target.starts_with(prefix.as_str()) {
				return false;
			}
		}
		if let Some(namespace) = &self.namespace {
			if entry.field("namespace") != Some(namespace.as_str()) {
				return false;
			}
		}
		if self.after_id.is_some_and(|after| entry.id <= after) {
			return false;
		}
		true
	}
}

/// A thread-safe ring buffer that stores recent log entries.
///
/// When full, the oldest entry is evicted. Every pushed entry is also sent to
/// live subscribers; a slow subscriber lags and skips entries rather than
/// holding up the writer.
#[derive(Clone)]
pub struct LogBuffer {
	inner: Arc<LogBufferInner>,
}

struct LogBufferInner {
	entries: RwLock<VecDeque<LogEntry>>,
	capacity: usize,
	next_id: AtomicU64,
	sender: broadcast::Sender<LogEntry>,
}

impl LogBuffer {
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
		Self {
			inner: Arc::new(LogBufferInner {
				entries: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
				capacity,
				next_id: AtomicU64::new(1),
				sender,
			}),
		}
	}

	pub fn push(
		&self,
		level: LogLevel,
		target: String,
		message: String,
		fields: Vec<(String, String)>,
	) {
		let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
		let entry = LogEntry::new(id, level, target, message, fields);

		{
			let mut entries = self.inner.entries.write();
			if entries.len() >= self.inner.capacity {
				entries.pop_front();
			}
			entries.push_back(entry.clone());
		}

		// No receivers is fine.
		let _ = self.inner.sender.send(entry);
	}

	/// Most recent entries matching `query`, oldest first.
	pub fn query(&self, query: &LogQuery) -> Vec<LogEntry> {
		let entries = self.inner.entries.read();
		let limit = query.limit.unwrap_or(usize::MAX);

		let mut matched: Vec<LogEntry> = entries
			.iter()
			.rev()
			.filter(|e| query.matches(e))
			.take(limit)
			.cloned()
			.collect();
		matched.reverse();
		matched
	}

	pub fn len(&self) -> usize {
		self.inner.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.entries.read().is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.inner.capacity
	}

	/// Receive entries as they are pushed.
	pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
		self.inner.sender.subscribe()
	}
}

impl Default for LogBuffer {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}
