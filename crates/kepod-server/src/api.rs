// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Application state and router.

use std::sync::Arc;

use axum::{
	routing::{get, post},
	Router,
};
use kepod_server_config::{ProvisionerConfig, QueueConfig, ServerConfig};
use kepod_server_db::{EnvironmentStore, JobQueue};
use kepod_server_env::{
	ArchiveError, ArchiveSignal, FsObjectStore, HttpArchiveSignal, LocalArchiveSignal, LogArchiver,
	LogMultiplexer, QueueWorker, Reconciler, ReconcilerConfig, SubscriptionTable, Sweeper,
	WorkerConfig,
};
use kepod_server_k8s::K8sClient;
use kepod_server_logs::LogBuffer;
use tokio_util::sync::CancellationToken;

use crate::routes;
use crate::websocket;

#[derive(Clone)]
pub struct AppState {
	pub store: Arc<dyn EnvironmentStore>,
	pub queue: Arc<dyn JobQueue>,
	pub client: Arc<dyn K8sClient>,
	pub multiplexer: LogMultiplexer,
	pub archiver: Arc<LogArchiver>,
	pub sweeper: Arc<Sweeper>,
	pub log_buffer: LogBuffer,
}

/// Wire the environment components together from configuration.
///
/// Archival requests from the sweeper go to `sweeper.archive_url` when set,
/// and to this process's own archiver otherwise.
pub fn create_app_state(
	store: Arc<dyn EnvironmentStore>,
	queue: Arc<dyn JobQueue>,
	client: Arc<dyn K8sClient>,
	config: &ServerConfig,
	log_buffer: LogBuffer,
) -> Result<AppState, ArchiveError> {
	let table = SubscriptionTable::new();
	let archiver = Arc::new(LogArchiver::new(
		&config.logs.dir,
		Arc::new(FsObjectStore::new(&config.logs.archive_dir)),
		table.clone(),
	));

	let signal: Arc<dyn ArchiveSignal> = match &config.sweeper.archive_url {
		Some(url) => Arc::new(HttpArchiveSignal::new(url.clone())?),
		None => Arc::new(LocalArchiveSignal::new(Arc::clone(&archiver))),
	};
	let sweeper = Arc::new(Sweeper::new(
		Arc::clone(&client),
		Arc::clone(&store),
		signal,
	));

	let multiplexer = LogMultiplexer::new(
		Arc::clone(&client),
		Arc::clone(&store),
		table,
		&config.logs.dir,
	)
	.with_archiver(Arc::clone(&archiver));

	Ok(AppState {
		store,
		queue,
		client,
		multiplexer,
		archiver,
		sweeper,
		log_buffer,
	})
}

/// Archive signal for a sweep run outside the serving process.
///
/// Only the serving process knows which log files have live subscribers, so
/// a standalone sweep always asks a server to archive: `sweeper.archive_url`
/// when set, otherwise this server's own `http.public_url`.
pub fn standalone_archive_signal(
	config: &ServerConfig,
) -> Result<HttpArchiveSignal, ArchiveError> {
	let base_url = config
		.sweeper
		.archive_url
		.clone()
		.unwrap_or_else(|| config.http.public_url.clone());
	HttpArchiveSignal::new(base_url)
}

/// Sweeper for the one-shot `sweep` command, sharing the state's store and
/// cluster client but archiving through [`standalone_archive_signal`].
pub fn create_standalone_sweeper(
	state: &AppState,
	config: &ServerConfig,
) -> Result<Sweeper, ArchiveError> {
	Ok(Sweeper::new(
		Arc::clone(&state.client),
		Arc::clone(&state.store),
		Arc::new(standalone_archive_signal(config)?),
	))
}

pub fn reconciler_config(config: &ProvisionerConfig) -> ReconcilerConfig {
	ReconcilerConfig {
		endpoint_poll_interval: config.endpoint_poll_interval(),
		endpoint_max_attempts: config.endpoint_max_attempts,
		service_port: config.service_port,
		cpu_request: config.cpu_request.clone(),
		memory_request: config.memory_request.clone(),
	}
}

pub fn worker_config(config: &QueueConfig) -> WorkerConfig {
	WorkerConfig {
		batch_size: config.batch_size,
		max_parallel: config.max_parallel,
		visibility_timeout: config.visibility_timeout(),
		idle_poll: config.idle_poll(),
	}
}

/// Queue worker sharing the state's store, queue and cluster client.
pub fn create_worker(
	state: &AppState,
	config: &ServerConfig,
	shutdown: CancellationToken,
) -> QueueWorker {
	let reconciler = Reconciler::new(
		Arc::clone(&state.client),
		Arc::clone(&state.store),
		reconciler_config(&config.provisioner),
	)
	.with_shutdown(shutdown);

	QueueWorker::new(
		Arc::clone(&state.queue),
		Arc::clone(&state.store),
		Arc::new(reconciler),
		worker_config(&config.queue),
	)
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health::health_check))
		.route("/api/create-env", post(routes::envs::create_env))
		.route("/api/envs", get(routes::envs::list_envs))
		.route("/api/envs/{env_id}", get(routes::envs::get_env))
		.route("/api/cleanup/{env_id}", post(routes::cleanup::cleanup_env))
		.route("/api/sweep", post(routes::sweep::run_sweep))
		.route("/api/logs", get(routes::logs::list_logs))
		.route("/api/logs/stream", get(routes::logs::stream_logs))
		.route("/ws/logs", get(websocket::ws_logs_handler))
		.with_state(state)
}
