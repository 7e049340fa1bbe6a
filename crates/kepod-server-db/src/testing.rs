// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test support: an in-memory SQLite pool and a pure in-memory
//! [`EnvironmentStore`] for tests that run on a paused clock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::environment::EnvironmentStore;
use crate::error::{DbError, Result};
use crate::pool::run_migrations;
use crate::types::{EnvStatus, Environment, UpdateOutcome};

/// In-memory database with the schema applied.
///
/// A single connection is used so every query sees the same in-memory
/// database.
pub async fn create_test_pool() -> Result<SqlitePool> {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect("sqlite::memory:")
		.await?;
	run_migrations(&pool).await?;
	Ok(pool)
}

/// [`EnvironmentStore`] backed by a map, with the same conditional
/// transitions as the SQLite repository.
///
/// SQLite work happens on a separate thread, which a paused tokio clock
/// cannot see; tests that advance time use this store instead.
#[derive(Default)]
pub struct MemoryEnvironmentStore {
	records: Mutex<BTreeMap<String, Environment>>,
	unavailable: AtomicBool,
}

impl MemoryEnvironmentStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make every call fail as if the database were unreachable.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	fn records(&self) -> Result<MutexGuard<'_, BTreeMap<String, Environment>>> {
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(DbError::Internal("store unavailable".to_string()));
		}
		Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()))
	}

	fn transition(
		&self,
		env_id: &str,
		apply: impl FnOnce(&mut Environment) -> bool,
	) -> Result<UpdateOutcome> {
		let mut records = self.records()?;
		let env = records
			.get_mut(env_id)
			.ok_or_else(|| DbError::NotFound(format!("environment {env_id}")))?;
		Ok(if apply(env) {
			UpdateOutcome::Applied
		} else {
			UpdateOutcome::Unchanged
		})
	}
}

#[async_trait]
impl EnvironmentStore for MemoryEnvironmentStore {
	async fn create(&self, env: &Environment) -> Result<()> {
		let mut records = self.records()?;
		if records.contains_key(&env.env_id) {
			return Err(DbError::Conflict(format!(
				"environment {} already exists",
				env.env_id
			)));
		}
		records.insert(env.env_id.clone(), env.clone());
		Ok(())
	}

	async fn get(&self, env_id: &str) -> Result<Option<Environment>> {
		Ok(self.records()?.get(env_id).cloned())
	}

	async fn list(&self, status: Option<EnvStatus>) -> Result<Vec<Environment>> {
		let mut envs: Vec<_> = self
			.records()?
			.values()
			.filter(|e| status.map_or(true, |s| e.status == s))
			.cloned()
			.collect();
		envs.sort_by_key(|e| e.created_at);
		Ok(envs)
	}

	async fn mark_pending(&self, env_id: &str) -> Result<UpdateOutcome> {
		self.transition(env_id, |env| {
			if env.status != EnvStatus::Queued {
				return false;
			}
			env.status = EnvStatus::Pending;
			true
		})
	}

	async fn mark_ready(&self, env_id: &str, app_url: &str) -> Result<UpdateOutcome> {
		self.transition(env_id, |env| {
			if !matches!(env.status, EnvStatus::Queued | EnvStatus::Pending) {
				return false;
			}
			env.status = EnvStatus::Ready;
			env.app_url = Some(app_url.to_string());
			true
		})
	}

	async fn mark_deleted(&self, env_id: &str, now: DateTime<Utc>) -> Result<UpdateOutcome> {
		self.transition(env_id, |env| {
			if env.status != EnvStatus::Ready || !env.is_expired(now) {
				return false;
			}
			env.status = EnvStatus::Deleted;
			true
		})
	}

	async fn ping(&self) -> Result<()> {
		self.records().map(|_| ())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn env() -> Environment {
		Environment {
			env_id: "m1".into(),
			name: "demo".into(),
			image: "nginx".into(),
			ttl: 10,
			namespace: "demo-m1".into(),
			target_port: 80,
			status: EnvStatus::Queued,
			created_at: Utc::now(),
			app_url: None,
		}
	}

	#[tokio::test]
	async fn memory_store_matches_repository_transitions() {
		let store = MemoryEnvironmentStore::new();
		let e = env();
		store.create(&e).await.unwrap();
		assert!(matches!(store.create(&e).await, Err(DbError::Conflict(_))));

		assert_eq!(store.mark_ready("m1", "a").await.unwrap(), UpdateOutcome::Applied);
		assert_eq!(store.mark_ready("m1", "b").await.unwrap(), UpdateOutcome::Unchanged);
		assert_eq!(store.mark_pending("m1").await.unwrap(), UpdateOutcome::Unchanged);

		let early = e.created_at + chrono::Duration::seconds(9);
		assert_eq!(store.mark_deleted("m1", early).await.unwrap(), UpdateOutcome::Unchanged);
		assert_eq!(
			store.mark_deleted("m1", e.expires_at()).await.unwrap(),
			UpdateOutcome::Applied
		);

		let stored = store.get("m1").await.unwrap().unwrap();
		assert_eq!(stored.status, EnvStatus::Deleted);
		assert_eq!(stored.app_url.as_deref(), Some("a"));
	}

	#[tokio::test]
	async fn unavailable_store_fails_every_call() {
		let store = MemoryEnvironmentStore::new();
		store.set_unavailable(true);
		assert!(store.ping().await.is_err());
		assert!(store.list(None).await.is_err());
	}
}
