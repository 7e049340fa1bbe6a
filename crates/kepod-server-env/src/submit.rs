// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::Utc;
use kepod_server_db::{EnvStatus, Environment, EnvironmentStore, JobQueue};

use crate::error::SubmitError;
use crate::job::ProvisionJob;
use crate::naming;

/// A validated request for a new environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEnvironment {
	pub name: String,
	pub image: String,
	pub ttl: i64,
	pub target_port: u16,
}

/// Record a new environment as `QUEUED` and enqueue its provisioning job.
///
/// The record is written first so the reconciler always finds it. If the
/// enqueue fails the record stays `QUEUED` with nothing to provision it.
#[tracing::instrument(skip(store, queue, req), fields(name = %req.name, image = %req.image))]
pub async fn submit(
	store: &dyn EnvironmentStore,
	queue: &dyn JobQueue,
	req: CreateEnvironment,
) -> Result<Environment, SubmitError> {
	let env_id = naming::new_env_id();
	let namespace = naming::namespace_for(&req.name, &env_id);

	let env = Environment {
		env_id,
		name: req.name,
		image: req.image,
		ttl: req.ttl,
		namespace,
		target_port: req.target_port,
		status: EnvStatus::Queued,
		created_at: Utc::now(),
		app_url: None,
	};
	store.create(&env).await?;

	let body = ProvisionJob::from(&env).to_json()?;
	let message_id = queue.send(&body).await?;

	tracing::info!(
		env_id = %env.env_id,
		namespace = %env.namespace,
		message_id = %message_id,
		"Environment queued"
	);
	Ok(env)
}

#[cfg(test)]
mod tests {
	use super::*;
	use kepod_server_db::testing::create_test_pool;
	use kepod_server_db::{EnvironmentRepository, QueueRepository};
	use std::time::Duration;

	#[tokio::test]
	async fn submit_records_and_enqueues() {
		let pool = create_test_pool().await.unwrap();
		let store = EnvironmentRepository::new(pool.clone());
		let queue = QueueRepository::new(pool);

		let env = submit(
			&store,
			&queue,
			CreateEnvironment {
				name: "demo".into(),
				image: "nginx:1.27".into(),
				ttl: 600,
				target_port: 8080,
			},
		)
		.await
		.unwrap();

		assert_eq!(env.namespace, format!("demo-{}", env.env_id));
		let stored = store.get(&env.env_id).await.unwrap().unwrap();
		assert_eq!(stored.status, EnvStatus::Queued);

		let message = queue
			.receive(1, Duration::from_secs(30))
			.await
			.unwrap()
			.remove(0);
		let job = ProvisionJob::from_json(&message.body).unwrap();
		assert_eq!(job, ProvisionJob::from(&stored));
	}
}
