// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! At-least-once provisioning queue on SQLite.
//!
//! Receiving a message hides it for the visibility timeout and issues a fresh
//! receipt. Deleting by receipt is the acknowledgement; a message that is not
//! deleted before its visibility timeout lapses is delivered again with a new
//! receipt, and the old receipt no longer deletes it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::types::QueueMessage;

#[async_trait]
pub trait JobQueue: Send + Sync {
	/// Enqueue a message body. Returns the message id.
	async fn send(&self, body: &str) -> Result<String>;

	/// Receive up to `max` visible messages, hiding each for `visibility`.
	async fn receive(&self, max: usize, visibility: Duration) -> Result<Vec<QueueMessage>>;

	/// Acknowledge a delivery. Returns `false` if the receipt is stale or the
	/// message is already gone.
	async fn delete(&self, receipt: &str) -> Result<bool>;

	/// Number of messages in the queue, visible or not.
	async fn depth(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct QueueRepository {
	pool: SqlitePool,
}

impl QueueRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

fn now_ms() -> i64 {
	Utc::now().timestamp_millis()
}

#[async_trait]
impl JobQueue for QueueRepository {
	#[tracing::instrument(skip(self, body))]
	async fn send(&self, body: &str) -> Result<String> {
		let id = Uuid::new_v4().to_string();
		let now = now_ms();
		sqlx::query(
			r#"
			INSERT INTO provision_queue (id, body, enqueued_at_ms, visible_at_ms, receipt, receive_count)
			VALUES (?, ?, ?, ?, NULL, 0)
			"#,
		)
		.bind(&id)
		.bind(body)
		.bind(now)
		.bind(now)
		.execute(&self.pool)
		.await?;

		tracing::debug!(message_id = %id, "message enqueued");
		Ok(id)
	}

	#[tracing::instrument(skip(self))]
	async fn receive(&self, max: usize, visibility: Duration) -> Result<Vec<QueueMessage>> {
		let now = now_ms();
		let hide_until = now.saturating_add(i64::try_from(visibility.as_millis()).unwrap_or(i64::MAX));
		let limit = i64::try_from(max).unwrap_or(i64::MAX);

		let mut tx = self.pool.begin().await?;
		let candidates = sqlx::query_as::<_, (String, String, i64)>(
			r#"
			SELECT id, body, receive_count FROM provision_queue
			WHERE visible_at_ms <= ?
			ORDER BY enqueued_at_ms, id
			LIMIT ?
			"#,
		)
		.bind(now)
		.bind(limit)
		.fetch_all(&mut *tx)
		.await?;

		let mut messages = Vec::with_capacity(candidates.len());
		for (id, body, receive_count) in candidates {
			let receipt = Uuid::new_v4().to_string();
			let claimed = sqlx::query(
				r#"
				UPDATE provision_queue
				SET receipt = ?, visible_at_ms = ?, receive_count = receive_count + 1
				WHERE id = ? AND visible_at_ms <= ?
				"#,
			)
			.bind(&receipt)
			.bind(hide_until)
			.bind(&id)
			.bind(now)
			.execute(&mut *tx)
			.await?;

			if claimed.rows_affected() == 1 {
				messages.push(QueueMessage {
					id,
					receipt,
					body,
					receive_count: u32::try_from(receive_count + 1).unwrap_or(u32::MAX),
				});
			}
		}
		tx.commit().await?;

		if !messages.is_empty() {
			tracing::debug!(count = messages.len(), "messages received");
		}
		Ok(messages)
	}

	#[tracing::instrument(skip(self))]
	async fn delete(&self, receipt: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM provision_queue WHERE receipt = ?")
			.bind(receipt)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() == 1)
	}

	async fn depth(&self) -> Result<u64> {
		let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM provision_queue")
			.fetch_one(&self.pool)
			.await?;
		Ok(u64::try_from(count).unwrap_or_default())
	}
}
