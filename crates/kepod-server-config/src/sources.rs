// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer, LogsConfigLayer,
	ProvisionerConfigLayer, QueueConfigLayer, SweeperConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/kepod/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: KEPOD_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			database: Some(load_database_from_env()),
			queue: Some(load_queue_from_env()?),
			provisioner: Some(load_provisioner_from_env()?),
			sweeper: Some(load_sweeper_from_env()?),
			logs: Some(load_logs_from_env()),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	env_parse(name, "u16")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	env_parse(name, "u32")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	env_parse(name, "u64")
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	env_parse(name, "usize")
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("KEPOD_HOST"),
		port: env_u16("KEPOD_PORT")?,
		public_url: env_var("KEPOD_PUBLIC_URL"),
	})
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("KEPOD_DATABASE_URL"),
	}
}

fn load_queue_from_env() -> Result<QueueConfigLayer, ConfigError> {
	Ok(QueueConfigLayer {
		batch_size: env_usize("KEPOD_QUEUE_BATCH_SIZE")?,
		max_parallel: env_usize("KEPOD_QUEUE_MAX_PARALLEL")?,
		visibility_timeout_secs: env_u64("KEPOD_QUEUE_VISIBILITY_TIMEOUT_SECS")?,
		idle_poll_ms: env_u64("KEPOD_QUEUE_IDLE_POLL_MS")?,
	})
}

fn load_provisioner_from_env() -> Result<ProvisionerConfigLayer, ConfigError> {
	Ok(ProvisionerConfigLayer {
		endpoint_poll_interval_secs: env_u64("KEPOD_PROVISIONER_ENDPOINT_POLL_INTERVAL_SECS")?,
		endpoint_max_attempts: env_u32("KEPOD_PROVISIONER_ENDPOINT_MAX_ATTEMPTS")?,
		service_port: env_u16("KEPOD_PROVISIONER_SERVICE_PORT")?,
		cpu_request: env_var("KEPOD_PROVISIONER_CPU_REQUEST"),
		memory_request: env_var("KEPOD_PROVISIONER_MEMORY_REQUEST"),
	})
}

fn load_sweeper_from_env() -> Result<SweeperConfigLayer, ConfigError> {
	Ok(SweeperConfigLayer {
		interval_secs: env_u64("KEPOD_SWEEPER_INTERVAL_SECS")?,
		// KEPOD_API_URL is what the one-shot cleanup deployment has always set.
		archive_url: env_var("KEPOD_SWEEPER_ARCHIVE_URL").or_else(|| env_var("KEPOD_API_URL")),
	})
}

fn load_logs_from_env() -> LogsConfigLayer {
	LogsConfigLayer {
		dir: env_var("KEPOD_LOGS_DIR"),
		archive_dir: env_var("KEPOD_ARCHIVE_DIR"),
	}
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("KEPOD_LOG_FORMAT") {
		Some(v) => Some(LogFormat::parse(&v).ok_or_else(|| ConfigError::InvalidValue {
			key: "KEPOD_LOG_FORMAT".to_string(),
			message: format!("expected 'pretty' or 'json', got '{v}'"),
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("KEPOD_LOG_LEVEL"),
		format,
		namespace_dir: env_var("KEPOD_LOG_NAMESPACE_DIR"),
		broadcast_capacity: env_usize("KEPOD_LOG_BROADCAST_CAPACITY")?,
	})
}
