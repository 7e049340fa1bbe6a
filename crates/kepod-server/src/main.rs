// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! kepod server binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kepod_server::{
	create_app_state, create_router, create_standalone_sweeper, create_worker, jobs, logging, version,
};
use kepod_server_db::{create_pool, run_migrations, EnvironmentRepository, QueueRepository};
use kepod_server_k8s::KubeClient;
use tokio_util::sync::CancellationToken;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};

/// kepod - ephemeral Kubernetes environments with a TTL.
#[derive(Parser, Debug)]
#[command(name = "kepod-server", about = "Ephemeral Kubernetes environment server", version)]
struct Args {
	/// Configuration file layered over the built-in defaults.
	#[arg(long, env = "KEPOD_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
	/// Serve the HTTP API and run the queue worker (default)
	#[default]
	Serve,
	/// Run only the provisioning queue worker
	Worker,
	/// Run one expiry sweep and print its report
	Sweep,
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
	let args = Args::parse();
	let command = args.command.unwrap_or_default();

	if let Command::Version = command {
		println!("{}", version::format_version_info());
		return Ok(ExitCode::SUCCESS);
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => kepod_server_config::load_config_with_file(path)?,
		None => kepod_server_config::load_config()?,
	};

	let log_buffer = logging::init_tracing(&config.logging);

	tracing::info!(
		command = ?command,
		database = %config.database.url,
		logs_dir = %config.logs.dir.display(),
		"starting kepod-server"
	);

	let pool = create_pool(&config.database.url).await?;
	run_migrations(&pool).await?;

	let store = Arc::new(EnvironmentRepository::new(pool.clone()));
	let queue = Arc::new(QueueRepository::new(pool));
	let client = Arc::new(KubeClient::new().await?);
	let state = create_app_state(store, queue, client, &config, log_buffer)?;

	let shutdown = CancellationToken::new();
	{
		let shutdown = shutdown.clone();
		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::info!("Received shutdown signal");
			}
			shutdown.cancel();
		});
	}

	match command {
		Command::Sweep => {
			let sweeper = create_standalone_sweeper(&state, &config)?;
			let exit = match sweeper.sweep().await {
				Ok(report) => {
					println!("{}", serde_json::to_string_pretty(&report)?);
					ExitCode::SUCCESS
				}
				Err(e) => {
					tracing::error!(error = %e, "Sweep failed");
					ExitCode::FAILURE
				}
			};
			return Ok(exit);
		}
		Command::Worker => {
			create_worker(&state, &config, shutdown.clone()).run(shutdown).await;
		}
		Command::Serve | Command::Version => {
			let worker = create_worker(&state, &config, shutdown.clone());
			let worker_task = {
				let shutdown = shutdown.clone();
				tokio::spawn(async move { worker.run(shutdown).await })
			};

			let sweep_task = config.sweeper.interval().map(|interval| {
				tokio::spawn(jobs::run_sweep_task(
					Arc::clone(&state.sweeper),
					interval,
					shutdown.clone(),
				))
			});

			let app = create_router(state)
				.layer(TraceLayer::new_for_http())
				.layer(
					CorsLayer::new()
						.allow_origin(Any)
						.allow_methods(Any)
						.allow_headers(Any),
				);

			let addr = config.socket_addr();
			tracing::info!("listening on {}", addr);
			let listener = tokio::net::TcpListener::bind(&addr).await?;

			let server_shutdown = shutdown.clone();
			if let Err(e) = axum::serve(listener, app)
				.with_graceful_shutdown(async move { server_shutdown.cancelled().await })
				.await
			{
				tracing::error!(error = %e, "Server error");
			}

			shutdown.cancel();
			let _ = worker_task.await;
			if let Some(task) = sweep_task {
				let _ = task.await;
			}
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(ExitCode::SUCCESS)
}
