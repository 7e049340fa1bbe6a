// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Live log multiplexer.
//!
//! Each subscription bridges one followed container log stream to one
//! client connection and to the namespace's append-only log file. Every
//! subscription runs in its own task, so a slow client only stalls its own
//! upstream stream.

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use kepod_server_db::EnvironmentStore;
use kepod_server_k8s::{pod_phase, K8sClient, LogOptions, LogStream, Pod};
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::archive::LogArchiver;
use crate::error::SubscribeError;
use crate::naming;
use crate::subscriptions::{ConnectionId, SubscriptionTable};

/// Longest log line forwarded. Longer lines end the subscription with an error.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// The one control message a connection may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscribeRequest {
	pub env_id: String,
}

impl SubscribeRequest {
	pub fn parse(text: &str) -> Result<Self, SubscribeError> {
		let req: SubscribeRequest = serde_json::from_str(text)
			.map_err(|e| SubscribeError::InvalidRequest(e.to_string()))?;
		if req.env_id.trim().is_empty() {
			return Err(SubscribeError::InvalidRequest(
				"env_id must not be empty".to_string(),
			));
		}
		Ok(req)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
	Line(String),
	/// The upstream stream failed; no further events follow.
	Error(String),
}

#[derive(Clone)]
pub struct LogMultiplexer {
	client: Arc<dyn K8sClient>,
	store: Arc<dyn EnvironmentStore>,
	table: SubscriptionTable,
	logs_dir: PathBuf,
	archiver: Option<Arc<LogArchiver>>,
}

impl LogMultiplexer {
	pub fn new(
		client: Arc<dyn K8sClient>,
		store: Arc<dyn EnvironmentStore>,
		table: SubscriptionTable,
		logs_dir: impl Into<PathBuf>,
	) -> Self {
		Self {
			client,
			store,
			table,
			logs_dir: logs_dir.into(),
			archiver: None,
		}
	}

	/// Run deferred archives through `archiver` when a namespace goes idle.
	pub fn with_archiver(mut self, archiver: Arc<LogArchiver>) -> Self {
		self.archiver = Some(archiver);
		self
	}

	pub fn table(&self) -> &SubscriptionTable {
		&self.table
	}

	pub fn next_connection_id(&self) -> ConnectionId {
		self.table.next_connection_id()
	}

	/// Open a subscription for `conn`. Events are delivered on `tx` until the
	/// upstream stream ends or fails, `tx` is closed, or [`Self::unsubscribe`]
	/// is called. The returned task finishes once every resource is released.
	#[tracing::instrument(skip(self, req, tx), fields(conn = %conn, env_id = %req.env_id))]
	pub async fn subscribe(
		&self,
		conn: ConnectionId,
		req: SubscribeRequest,
		tx: mpsc::Sender<SubscriptionEvent>,
	) -> Result<JoinHandle<()>, SubscribeError> {
		let env = self
			.store
			.get(&req.env_id)
			.await?
			.ok_or_else(|| SubscribeError::EnvironmentNotFound {
				env_id: req.env_id.clone(),
			})?;
		let namespace = env.namespace;

		let pods = self.client.list_pods(&namespace, "").await?;
		let (pod_name, container) = find_running_pod(&pods, &namespace).ok_or_else(|| {
			SubscribeError::PodNotFound {
				namespace: namespace.clone(),
			}
		})?;

		let cancel = self.table.register(conn, &env.env_id, &namespace)?;

		let opened = self.open(&pod_name, &namespace, &container).await;
		let (stream, file) = match opened {
			Ok(opened) => opened,
			Err(e) => {
				self.table.teardown(conn);
				return Err(e);
			}
		};

		tracing::info!(pod = %pod_name, namespace = %namespace, "Log subscription opened");
		let this = self.clone();
		Ok(tokio::spawn(async move {
			this.pump(conn, stream, file, tx, cancel).await;
		}))
	}

	/// Stop the subscription for `conn`. Its task closes the upstream stream
	/// and the log file, then removes the table entry.
	pub fn unsubscribe(&self, conn: ConnectionId) -> bool {
		self.table.cancel(conn)
	}

	async fn open(
		&self,
		pod: &str,
		namespace: &str,
		container: &str,
	) -> Result<(LogStream, File), SubscribeError> {
		let opts = LogOptions {
			tail: None,
			timestamps: false,
		};
		let stream = self
			.client
			.stream_logs(pod, namespace, container, opts)
			.await?;

		tokio::fs::create_dir_all(&self.logs_dir).await?;
		let file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(self.logs_dir.join(naming::log_file_name(namespace)))
			.await?;
		Ok((stream, file))
	}

	async fn pump(
		self,
		conn: ConnectionId,
		stream: LogStream,
		mut file: File,
		tx: mpsc::Sender<SubscriptionEvent>,
		cancel: CancellationToken,
	) {
		let mut lines = FramedRead::new(
			StreamReader::new(stream),
			LinesCodec::new_with_max_length(MAX_LINE_BYTES),
		);

		loop {
			let next = tokio::select! {
				_ = cancel.cancelled() => break,
				next = lines.next() => next,
			};

			let event = match next {
				Some(Ok(line)) => {
					if let Err(e) = append_line(&mut file, &line).await {
						tracing::warn!(conn = %conn, error = %e, "Failed to append log line");
					}
					SubscriptionEvent::Line(line)
				}
				Some(Err(e)) => {
					tracing::warn!(conn = %conn, error = %e, "Upstream log stream failed");
					SubscriptionEvent::Error(e.to_string())
				}
				None => {
					tracing::debug!(conn = %conn, "Upstream log stream ended");
					break;
				}
			};
			let last = matches!(event, SubscriptionEvent::Error(_));

			let delivered = tokio::select! {
				_ = cancel.cancelled() => false,
				sent = tx.send(event) => sent.is_ok(),
			};
			if !delivered || last {
				break;
			}
		}

		if let Err(e) = file.flush().await {
			tracing::warn!(conn = %conn, error = %e, "Failed to flush log file");
		}
		drop(file);
		drop(lines);
		self.release(conn).await;
	}

	async fn release(&self, conn: ConnectionId) {
		let Some(torn) = self.table.teardown(conn) else {
			return;
		};
		tracing::info!(conn = %conn, namespace = %torn.namespace, "Log subscription closed");

		if !torn.namespace_idle {
			return;
		}
		if let Some(archiver) = &self.archiver {
			match archiver.retry_deferred(&torn.namespace).await {
				Some(Ok(outcome)) => {
					tracing::info!(namespace = %torn.namespace, ?outcome, "Ran deferred log archival");
				}
				Some(Err(e)) => {
					tracing::warn!(namespace = %torn.namespace, error = %e, "Deferred log archival failed");
				}
				None => {}
			}
		}
	}
}

/// First running pod of the environment's deployment, with its primary
/// container name.
fn find_running_pod(pods: &[Pod], namespace: &str) -> Option<(String, String)> {
	let prefix = naming::pod_prefix(namespace);
	pods.iter().find_map(|pod| {
		let name = pod.metadata.name.as_deref()?;
		if !name.starts_with(&prefix) || pod_phase(pod) != "Running" {
			return None;
		}
		let container = pod.spec.as_ref()?.containers.first()?.name.clone();
		Some((name.to_string(), container))
	})
}

async fn append_line(file: &mut File, line: &str) -> std::io::Result<()> {
	let mut buf = Vec::with_capacity(line.len() + 1);
	buf.extend_from_slice(line.as_bytes());
	buf.push(b'\n');
	file.write_all(&buf).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use kepod_server_db::{EnvStatus, Environment, MemoryEnvironmentStore};
	use kepod_server_k8s::{LogTail, MockK8sClient};
	use std::time::Duration;
	use tempfile::TempDir;

	const NS: &str = "demo-e1";

	async fn setup() -> (Arc<MockK8sClient>, LogMultiplexer, TempDir) {
		let store = Arc::new(MemoryEnvironmentStore::new());
		store
			.create(&Environment {
				env_id: "e1".into(),
				name: "demo".into(),
				image: "nginx".into(),
				ttl: 600,
				namespace: NS.into(),
				target_port: 80,
				status: EnvStatus::Ready,
				created_at: Utc::now(),
				app_url: Some("lb.example.com".into()),
			})
			.await
			.unwrap();
		let client = Arc::new(MockK8sClient::new());
		let dir = TempDir::new().unwrap();
		let mux = LogMultiplexer::new(client.clone(), store, SubscriptionTable::new(), dir.path());
		(client, mux, dir)
	}

	fn request(env_id: &str) -> SubscribeRequest {
		SubscribeRequest {
			env_id: env_id.into(),
		}
	}

	#[test]
	fn parse_requires_env_id() {
		assert_eq!(
			SubscribeRequest::parse(r#"{"env_id":"e1"}"#).unwrap(),
			request("e1")
		);
		assert!(SubscribeRequest::parse(r#"{"env_id":""}"#).is_err());
		assert!(SubscribeRequest::parse("hello").is_err());
	}

	#[test]
	fn only_running_deployment_pods_match() {
		let client = MockK8sClient::new();
		client.add_pod(NS, "demo-e1-app-1", "Pending", "demo");
		client.add_pod(NS, "sidecar-1", "Running", "proxy");
		client.add_pod(NS, "demo-e1-app-2", "Running", "demo");
		let pods = futures::executor::block_on(client.list_pods(NS, "")).unwrap();

		assert_eq!(
			find_running_pod(&pods, NS),
			Some(("demo-e1-app-2".to_string(), "demo".to_string()))
		);
	}

	#[tokio::test]
	async fn lines_reach_client_and_file() {
		let (client, mux, dir) = setup().await;
		client.add_pod(NS, "demo-e1-app-abc", "Running", "demo");
		client.set_logs(&["starting", "listening on :80"], LogTail::End);

		let (tx, mut rx) = mpsc::channel(16);
		let conn = mux.next_connection_id();
		let handle = mux.subscribe(conn, request("e1"), tx).await.unwrap();

		assert_eq!(rx.recv().await, Some(SubscriptionEvent::Line("starting".into())));
		assert_eq!(
			rx.recv().await,
			Some(SubscriptionEvent::Line("listening on :80".into()))
		);
		assert_eq!(rx.recv().await, None);
		handle.await.unwrap();

		let written = std::fs::read_to_string(dir.path().join("demo-e1.log")).unwrap();
		assert_eq!(written, "starting\nlistening on :80\n");
		assert!(mux.table().is_empty());
		assert_eq!(client.open_streams(), 0);
	}

	#[tokio::test]
	async fn upstream_error_is_reported_then_torn_down() {
		let (client, mux, _dir) = setup().await;
		client.add_pod(NS, "demo-e1-app-abc", "Running", "demo");
		client.set_logs(&["one"], LogTail::Error("connection reset".into()));

		let (tx, mut rx) = mpsc::channel(16);
		let handle = mux
			.subscribe(mux.next_connection_id(), request("e1"), tx)
			.await
			.unwrap();

		assert_eq!(rx.recv().await, Some(SubscriptionEvent::Line("one".into())));
		assert!(matches!(rx.recv().await, Some(SubscriptionEvent::Error(_))));
		assert_eq!(rx.recv().await, None);
		handle.await.unwrap();
		assert!(mux.table().is_empty());
		assert_eq!(client.open_streams(), 0);
	}

	#[tokio::test]
	async fn unsubscribe_releases_followed_stream() {
		let (client, mux, _dir) = setup().await;
		client.add_pod(NS, "demo-e1-app-abc", "Running", "demo");
		client.set_logs(&["ready"], LogTail::Follow);

		let (tx, mut rx) = mpsc::channel(16);
		let conn = mux.next_connection_id();
		let handle = mux.subscribe(conn, request("e1"), tx).await.unwrap();
		assert_eq!(rx.recv().await, Some(SubscriptionEvent::Line("ready".into())));
		assert_eq!(client.open_streams(), 1);

		assert!(mux.unsubscribe(conn));
		tokio::time::timeout(Duration::from_secs(5), handle)
			.await
			.unwrap()
			.unwrap();

		assert_eq!(client.open_streams(), 0);
		assert!(mux.table().is_empty());
	}

	#[tokio::test]
	async fn missing_environment_opens_nothing() {
		let (client, mux, dir) = setup().await;
		let (tx, _rx) = mpsc::channel(1);

		let err = mux
			.subscribe(mux.next_connection_id(), request("nope"), tx)
			.await
			.unwrap_err();

		assert!(matches!(err, SubscribeError::EnvironmentNotFound { .. }));
		assert_eq!(client.stream_logs_calls(), 0);
		assert!(!dir.path().join("demo-e1.log").exists());
	}

	#[tokio::test]
	async fn failed_stream_open_leaves_no_entry() {
		let (client, mux, dir) = setup().await;
		client.add_pod(NS, "demo-e1-app-abc", "Running", "demo");
		client.fail(kepod_server_k8s::MockOp::StreamLogs, "kubelet unreachable");
		let (tx, _rx) = mpsc::channel(1);

		let err = mux
			.subscribe(mux.next_connection_id(), request("e1"), tx)
			.await
			.unwrap_err();

		assert!(matches!(err, SubscribeError::Cluster(_)));
		assert!(mux.table().is_empty());
		assert!(!dir.path().join("demo-e1.log").exists());
	}
}
