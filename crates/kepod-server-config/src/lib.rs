// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the kepod server.
//!
//! Sources are merged in precedence order: built-in defaults, then the TOML
//! config file (`/etc/kepod/server.toml` unless overridden), then `KEPOD_*`
//! environment variables.
//!
//! ```ignore
//! let config = kepod_server_config::load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub queue: QueueConfig,
	pub provisioner: ProvisionerConfig,
	pub sweeper: SweeperConfig,
	pub logs: LogsConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved, validated config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		database: layer.database.unwrap_or_default().finalize(),
		queue: layer.queue.unwrap_or_default().finalize(),
		provisioner: layer.provisioner.unwrap_or_default().finalize(),
		sweeper: layer.sweeper.unwrap_or_default().finalize(),
		logs: layer.logs.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		max_parallel = config.queue.max_parallel,
		endpoint_max_attempts = config.provisioner.endpoint_max_attempts,
		sweep_interval_secs = ?config.sweeper.interval_secs,
		remote_archive = config.sweeper.archive_url.is_some(),
		"Server configuration loaded"
	);

	Ok(config)
}

fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.provisioner.endpoint_max_attempts == 0 {
		return Err(ConfigError::Validation(
			"provisioner.endpoint_max_attempts must be at least 1".to_string(),
		));
	}
	if config.queue.max_parallel == 0 {
		return Err(ConfigError::Validation(
			"queue.max_parallel must be at least 1".to_string(),
		));
	}
	if config.queue.batch_size == 0 {
		return Err(ConfigError::Validation(
			"queue.batch_size must be at least 1".to_string(),
		));
	}
	Ok(())
}
