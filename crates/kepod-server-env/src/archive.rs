// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Log archival: upload a namespace's log file to the object store, then
//! delete it locally.
//!
//! Archival never runs while the namespace has a live subscription writing
//! to the file. Such a request is deferred and retried when the last
//! subscription on the namespace goes away.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::naming;
use crate::subscriptions::SubscriptionTable;

const SIGNAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Durable sink for completed log files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
	/// Store the contents of `path` under `key`.
	async fn put_file(&self, key: &str, path: &Path) -> Result<(), ArchiveError>;
}

/// Object store laid out as plain files under a root directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
	root: PathBuf,
}

impl FsObjectStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn path_for(&self, key: &str) -> Result<PathBuf, ArchiveError> {
		let relative = Path::new(key);
		let valid = !key.is_empty()
			&& relative
				.components()
				.all(|c| matches!(c, Component::Normal(_)));
		if !valid {
			return Err(ArchiveError::InvalidKey(key.to_string()));
		}
		Ok(self.root.join(relative))
	}
}

#[async_trait]
impl ObjectStore for FsObjectStore {
	async fn put_file(&self, key: &str, path: &Path) -> Result<(), ArchiveError> {
		let dest = self.path_for(key)?;
		if let Some(parent) = dest.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::copy(path, &dest).await?;
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
	Archived { key: String },
	/// A subscription is live on the namespace; archival will run once it ends.
	Deferred,
	NoLogFile,
}

pub struct LogArchiver {
	logs_dir: PathBuf,
	store: Arc<dyn ObjectStore>,
	subscriptions: SubscriptionTable,
	deferred: Mutex<HashMap<String, String>>,
}

impl LogArchiver {
	pub fn new(
		logs_dir: impl Into<PathBuf>,
		store: Arc<dyn ObjectStore>,
		subscriptions: SubscriptionTable,
	) -> Self {
		Self {
			logs_dir: logs_dir.into(),
			store,
			subscriptions,
			deferred: Mutex::new(HashMap::new()),
		}
	}

	pub fn log_path(&self, namespace: &str) -> PathBuf {
		self.logs_dir.join(naming::log_file_name(namespace))
	}

	/// Namespaces with an archive request waiting on a live subscription.
	pub fn deferred_namespaces(&self) -> Vec<String> {
		let mut namespaces: Vec<_> = self.deferred.lock().keys().cloned().collect();
		namespaces.sort();
		namespaces
	}

	#[tracing::instrument(skip(self), fields(env_id = %env_id, namespace = %namespace))]
	pub async fn archive(
		&self,
		env_id: &str,
		namespace: &str,
	) -> Result<ArchiveOutcome, ArchiveError> {
		if !naming::is_dns_label(namespace) {
			return Err(ArchiveError::InvalidNamespace(namespace.to_string()));
		}

		let Some(_guard) = self.subscriptions.try_begin_archive(namespace) else {
			self
				.deferred
				.lock()
				.insert(namespace.to_string(), env_id.to_string());
			tracing::info!("Log archival deferred until subscriptions end");
			return Ok(ArchiveOutcome::Deferred);
		};
		self.deferred.lock().remove(namespace);

		let path = self.log_path(namespace);
		if !tokio::fs::try_exists(&path).await? {
			tracing::debug!("No log file to archive");
			return Ok(ArchiveOutcome::NoLogFile);
		}

		let key = naming::archive_key(namespace, env_id, Utc::now());
		self.store.put_file(&key, &path).await?;

		match tokio::fs::remove_file(&path).await {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}

		tracing::info!(key = %key, "Archived log file");
		Ok(ArchiveOutcome::Archived { key })
	}

	/// Run a deferred archive for `namespace`, if one is waiting.
	pub async fn retry_deferred(&self, namespace: &str) -> Option<Result<ArchiveOutcome, ArchiveError>> {
		let env_id = self.deferred.lock().get(namespace).cloned()?;
		Some(self.archive(&env_id, namespace).await)
	}
}

/// Out-of-band request to archive a namespace's logs.
#[async_trait]
pub trait ArchiveSignal: Send + Sync {
	async fn signal(&self, env_id: &str, namespace: &str) -> Result<(), ArchiveError>;
}

/// Sends the archival request to a kepod server's cleanup endpoint.
pub struct HttpArchiveSignal {
	client: reqwest::Client,
	base_url: String,
}

#[derive(Serialize)]
struct CleanupBody<'a> {
	namespace: &'a str,
}

impl HttpArchiveSignal {
	pub fn new(base_url: impl Into<String>) -> Result<Self, ArchiveError> {
		let client = reqwest::Client::builder().timeout(SIGNAL_TIMEOUT).build()?;
		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}

	pub fn endpoint(&self, env_id: &str) -> String {
		format!("{}/api/cleanup/{}", self.base_url, env_id)
	}
}

#[async_trait]
impl ArchiveSignal for HttpArchiveSignal {
	async fn signal(&self, env_id: &str, namespace: &str) -> Result<(), ArchiveError> {
		let response = self
			.client
			.post(self.endpoint(env_id))
			.json(&CleanupBody { namespace })
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(ArchiveError::Rejected {
				status: status.as_u16(),
			});
		}
		Ok(())
	}
}

/// Archives in-process through a [`LogArchiver`].
pub struct LocalArchiveSignal {
	archiver: Arc<LogArchiver>,
}

impl LocalArchiveSignal {
	pub fn new(archiver: Arc<LogArchiver>) -> Self {
		Self { archiver }
	}
}

#[async_trait]
impl ArchiveSignal for LocalArchiveSignal {
	async fn signal(&self, env_id: &str, namespace: &str) -> Result<(), ArchiveError> {
		self.archiver.archive(env_id, namespace).await.map(|_| ())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	struct Fixture {
		_dir: TempDir,
		logs: PathBuf,
		objects: PathBuf,
		table: SubscriptionTable,
		archiver: LogArchiver,
	}

	fn fixture() -> Fixture {
		let dir = TempDir::new().unwrap();
		let logs = dir.path().join("logs");
		let objects = dir.path().join("objects");
		std::fs::create_dir_all(&logs).unwrap();
		let table = SubscriptionTable::new();
		let archiver = LogArchiver::new(
			&logs,
			Arc::new(FsObjectStore::new(&objects)),
			table.clone(),
		);
		Fixture {
			_dir: dir,
			logs,
			objects,
			table,
			archiver,
		}
	}

	#[tokio::test]
	async fn uploads_then_removes_log_file() {
		let f = fixture();
		std::fs::write(f.logs.join("demo-e1.log"), "line one\nline two\n").unwrap();

		let outcome = f.archiver.archive("e1", "demo-e1").await.unwrap();

		let ArchiveOutcome::Archived { key } = outcome else {
			panic!("expected archived, got {outcome:?}");
		};
		assert!(key.starts_with("logs/demo-e1-e1/"));
		assert_eq!(
			std::fs::read_to_string(f.objects.join(&key)).unwrap(),
			"line one\nline two\n"
		);
		assert!(!f.logs.join("demo-e1.log").exists());
	}

	#[tokio::test]
	async fn missing_file_is_reported() {
		let f = fixture();
		assert_eq!(
			f.archiver.archive("e1", "demo-e1").await.unwrap(),
			ArchiveOutcome::NoLogFile
		);
	}

	#[tokio::test]
	async fn live_subscription_defers_until_idle() {
		let f = fixture();
		std::fs::write(f.logs.join("demo-e1.log"), "x\n").unwrap();
		let conn = f.table.next_connection_id();
		f.table.register(conn, "e1", "demo-e1").unwrap();

		assert_eq!(
			f.archiver.archive("e1", "demo-e1").await.unwrap(),
			ArchiveOutcome::Deferred
		);
		assert!(f.logs.join("demo-e1.log").exists());
		assert_eq!(f.archiver.deferred_namespaces(), vec!["demo-e1".to_string()]);

		f.table.teardown(conn);
		let retried = f.archiver.retry_deferred("demo-e1").await.unwrap().unwrap();
		assert!(matches!(retried, ArchiveOutcome::Archived { .. }));
		assert!(f.archiver.deferred_namespaces().is_empty());
		assert!(f.archiver.retry_deferred("demo-e1").await.is_none());
	}

	#[tokio::test]
	async fn rejects_path_like_namespace() {
		let f = fixture();
		assert!(matches!(
			f.archiver.archive("e1", "../etc").await,
			Err(ArchiveError::InvalidNamespace(_))
		));
	}

	#[test]
	fn object_keys_stay_under_root() {
		let store = FsObjectStore::new("/srv/objects");
		assert!(store.path_for("logs/a/b.log").is_ok());
		assert!(store.path_for("../escape").is_err());
		assert!(store.path_for("/abs").is_err());
		assert!(store.path_for("").is_err());
	}

	#[test]
	fn http_signal_targets_cleanup_endpoint() {
		let signal = HttpArchiveSignal::new("http://kepod.internal:3000/").unwrap();
		assert_eq!(
			signal.endpoint("e1"),
			"http://kepod.internal:3000/api/cleanup/e1"
		);
	}
}
