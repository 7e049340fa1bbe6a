// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment state store.
//!
//! Every status write is a single conditional `UPDATE` keyed on `env_id` and
//! the expected prior status, so duplicate or concurrent writers converge
//! instead of moving a record backwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{DbError, Result};
use crate::types::{from_db_timestamp, to_db_timestamp, EnvStatus, Environment, UpdateOutcome};

/// Durable environment records with conditional status transitions.
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
	/// Insert a new record. Fails with [`DbError::Conflict`] if `env_id`
	/// already exists.
	async fn create(&self, env: &Environment) -> Result<()>;

	async fn get(&self, env_id: &str) -> Result<Option<Environment>>;

	/// All records, optionally restricted to one status, oldest first.
	async fn list(&self, status: Option<EnvStatus>) -> Result<Vec<Environment>>;

	/// `QUEUED → PENDING`.
	async fn mark_pending(&self, env_id: &str) -> Result<UpdateOutcome>;

	/// `QUEUED | PENDING → READY`, recording `app_url`. A record already at
	/// `READY` keeps its original `app_url`.
	async fn mark_ready(&self, env_id: &str, app_url: &str) -> Result<UpdateOutcome>;

	/// `READY → DELETED`, only if `created_at + ttl <= now`.
	async fn mark_deleted(&self, env_id: &str, now: DateTime<Utc>) -> Result<UpdateOutcome>;

	/// Cheap reachability check.
	async fn ping(&self) -> Result<()>;
}

type EnvironmentRow = (
	String,
	String,
	String,
	i64,
	String,
	i64,
	String,
	String,
	Option<String>,
);

const SELECT_COLUMNS: &str =
	"SELECT env_id, env_name, image, ttl, namespace, target_port, status, created_at, app_url FROM environments";

fn row_to_environment(row: EnvironmentRow) -> Result<Environment> {
	let (env_id, name, image, ttl, namespace, target_port, status, created_at, app_url) = row;
	Ok(Environment {
		env_id,
		name,
		image,
		ttl,
		namespace,
		target_port: u16::try_from(target_port)
			.map_err(|_| DbError::Internal(format!("invalid target_port {target_port}")))?,
		status: status.parse().map_err(DbError::Internal)?,
		created_at: from_db_timestamp(&created_at).map_err(DbError::Internal)?,
		app_url,
	})
}

#[derive(Clone)]
pub struct EnvironmentRepository {
	pool: SqlitePool,
}

impl EnvironmentRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Resolve a zero-row conditional update into `Unchanged` or `NotFound`.
	async fn unchanged_or_missing(&self, env_id: &str) -> Result<UpdateOutcome> {
		match self.get(env_id).await? {
			Some(_) => Ok(UpdateOutcome::Unchanged),
			None => Err(DbError::NotFound(format!("environment {env_id}"))),
		}
	}
}

#[async_trait]
impl EnvironmentStore for EnvironmentRepository {
	#[tracing::instrument(skip(self, env), fields(env_id = %env.env_id, namespace = %env.namespace))]
	async fn create(&self, env: &Environment) -> Result<()> {
		let now = to_db_timestamp(Utc::now());
		let result = sqlx::query(
			r#"
			INSERT INTO environments
				(env_id, env_name, image, ttl, namespace, target_port, status, created_at, expires_at, app_url, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(env_id) DO NOTHING
			"#,
		)
		.bind(&env.env_id)
		.bind(&env.name)
		.bind(&env.image)
		.bind(env.ttl)
		.bind(&env.namespace)
		.bind(i64::from(env.target_port))
		.bind(env.status.as_str())
		.bind(to_db_timestamp(env.created_at))
		.bind(to_db_timestamp(env.expires_at()))
		.bind(&env.app_url)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::Conflict(format!(
				"environment {} already exists",
				env.env_id
			)));
		}

		tracing::debug!("environment record created");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	async fn get(&self, env_id: &str) -> Result<Option<Environment>> {
		let row = sqlx::query_as::<_, EnvironmentRow>(&format!("{SELECT_COLUMNS} WHERE env_id = ?"))
			.bind(env_id)
			.fetch_optional(&self.pool)
			.await?;

		row.map(row_to_environment).transpose()
	}

	#[tracing::instrument(skip(self))]
	async fn list(&self, status: Option<EnvStatus>) -> Result<Vec<Environment>> {
		let rows = match status {
			Some(status) => {
				sqlx::query_as::<_, EnvironmentRow>(&format!(
					"{SELECT_COLUMNS} WHERE status = ? ORDER BY created_at, env_id"
				))
				.bind(status.as_str())
				.fetch_all(&self.pool)
				.await?
			}
			None => {
				sqlx::query_as::<_, EnvironmentRow>(&format!(
					"{SELECT_COLUMNS} ORDER BY created_at, env_id"
				))
				.fetch_all(&self.pool)
				.await?
			}
		};

		rows.into_iter().map(row_to_environment).collect()
	}

	#[tracing::instrument(skip(self))]
	async fn mark_pending(&self, env_id: &str) -> Result<UpdateOutcome> {
		let result = sqlx::query(
			"UPDATE environments SET status = 'PENDING', updated_at = ? WHERE env_id = ? AND status = 'QUEUED'",
		)
		.bind(to_db_timestamp(Utc::now()))
		.bind(env_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 1 {
			return Ok(UpdateOutcome::Applied);
		}
		self.unchanged_or_missing(env_id).await
	}

	#[tracing::instrument(skip(self))]
	async fn mark_ready(&self, env_id: &str, app_url: &str) -> Result<UpdateOutcome> {
		let result = sqlx::query(
			r#"
			UPDATE environments
			SET status = 'READY', app_url = ?, updated_at = ?
			WHERE env_id = ? AND status IN ('QUEUED', 'PENDING')
			"#,
		)
		.bind(app_url)
		.bind(to_db_timestamp(Utc::now()))
		.bind(env_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 1 {
			return Ok(UpdateOutcome::Applied);
		}
		self.unchanged_or_missing(env_id).await
	}

	#[tracing::instrument(skip(self))]
	async fn mark_deleted(&self, env_id: &str, now: DateTime<Utc>) -> Result<UpdateOutcome> {
		let now = to_db_timestamp(now);
		let result = sqlx::query(
			r#"
			UPDATE environments
			SET status = 'DELETED', updated_at = ?
			WHERE env_id = ? AND status = 'READY' AND expires_at <= ?
			"#,
		)
		.bind(&now)
		.bind(env_id)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 1 {
			return Ok(UpdateOutcome::Applied);
		}
		self.unchanged_or_missing(env_id).await
	}

	async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}
}
