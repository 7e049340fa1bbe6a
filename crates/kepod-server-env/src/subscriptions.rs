// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Table of live log subscriptions, keyed by connection.
//!
//! The table is also the single point of coordination between live
//! subscriptions and log archival: a namespace cannot gain a subscription
//! while its log file is being archived, and cannot be archived while it has
//! a subscription. Both checks happen under the same lock.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::SubscribeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "conn-{}", self.0)
	}
}

#[derive(Debug)]
struct Record {
	env_id: String,
	namespace: String,
	cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct Inner {
	subscriptions: HashMap<ConnectionId, Record>,
	archiving: HashSet<String>,
}

/// Result of tearing down one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TornDown {
	pub env_id: String,
	pub namespace: String,
	/// No other subscription remains on the namespace.
	pub namespace_idle: bool,
}

#[derive(Clone, Default)]
pub struct SubscriptionTable {
	inner: Arc<Mutex<Inner>>,
	next_id: Arc<AtomicU64>,
}

impl SubscriptionTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn next_connection_id(&self) -> ConnectionId {
		ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
	}

	/// Record a subscription for `conn` and hand back its cancellation token.
	pub fn register(
		&self,
		conn: ConnectionId,
		env_id: &str,
		namespace: &str,
	) -> Result<CancellationToken, SubscribeError> {
		let mut inner = self.inner.lock();
		if inner.subscriptions.contains_key(&conn) {
			return Err(SubscribeError::AlreadySubscribed);
		}
		if inner.archiving.contains(namespace) {
			return Err(SubscribeError::Archiving {
				namespace: namespace.to_string(),
			});
		}

		let cancel = CancellationToken::new();
		inner.subscriptions.insert(
			conn,
			Record {
				env_id: env_id.to_string(),
				namespace: namespace.to_string(),
				cancel: cancel.clone(),
			},
		);
		Ok(cancel)
	}

	/// Remove the subscription for `conn`, cancelling its upstream stream.
	/// Returns `None` if there was none, so calling it twice is harmless.
	pub fn teardown(&self, conn: ConnectionId) -> Option<TornDown> {
		let mut inner = self.inner.lock();
		let record = inner.subscriptions.remove(&conn)?;
		record.cancel.cancel();

		let namespace_idle = !inner
			.subscriptions
			.values()
			.any(|r| r.namespace == record.namespace);
		Some(TornDown {
			env_id: record.env_id,
			namespace: record.namespace,
			namespace_idle,
		})
	}

	/// Cancel the upstream stream for `conn` but leave its entry in place; the
	/// subscription's own task removes it once its file is closed.
	pub fn cancel(&self, conn: ConnectionId) -> bool {
		match self.inner.lock().subscriptions.get(&conn) {
			Some(record) => {
				record.cancel.cancel();
				true
			}
			None => false,
		}
	}

	pub fn active_for_namespace(&self, namespace: &str) -> usize {
		self
			.inner
			.lock()
			.subscriptions
			.values()
			.filter(|r| r.namespace == namespace)
			.count()
	}

	pub fn len(&self) -> usize {
		self.inner.lock().subscriptions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Claim `namespace` for archival. Returns `None` while it has a live
	/// subscription or another archive of it is running.
	pub fn try_begin_archive(&self, namespace: &str) -> Option<ArchiveGuard> {
		let mut inner = self.inner.lock();
		let busy = inner.subscriptions.values().any(|r| r.namespace == namespace);
		if busy || !inner.archiving.insert(namespace.to_string()) {
			return None;
		}
		Some(ArchiveGuard {
			table: self.clone(),
			namespace: namespace.to_string(),
		})
	}
}

/// Holds a namespace's archive claim until dropped.
pub struct ArchiveGuard {
	table: SubscriptionTable,
	namespace: String,
}

impl Drop for ArchiveGuard {
	fn drop(&mut self) {
		self.table.inner.lock().archiving.remove(&self.namespace);
	}
}
