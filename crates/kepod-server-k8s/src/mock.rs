// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory K8s client for tests.
//!
//! [`MockK8sClient`] keeps namespaces, deployments, services and pods in
//! memory with the same conflict and not-found semantics as the real API
//! server, counts every call, and lets tests script load-balancer ingress and
//! container log output.

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, ServiceStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{
	Container, Deployment, LogOptions, LogStream, Namespace, Pod, PodSpec, PodStatus, Service,
};

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
	CreateNamespace,
	DeleteNamespace,
	CreateDeployment,
	CreateService,
	GetService,
	ListPods,
	StreamLogs,
}

/// How a scripted log stream ends after its lines are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTail {
	/// The stream completes.
	End,
	/// The stream stays open until dropped, like a follow on a live container.
	Follow,
	/// The stream yields an error with this message.
	Error(String),
}

#[derive(Default)]
struct Calls {
	create_namespace: AtomicUsize,
	delete_namespace: AtomicUsize,
	create_deployment: AtomicUsize,
	create_service: AtomicUsize,
	get_service: AtomicUsize,
	stream_logs: AtomicUsize,
}

#[derive(Default)]
struct State {
	namespaces: HashMap<String, Namespace>,
	deployments: HashMap<(String, String), Deployment>,
	services: HashMap<(String, String), Service>,
	pods: HashMap<String, Vec<Pod>>,
	ingress: Option<(String, usize)>,
	log_lines: Vec<String>,
	log_tail: Option<LogTail>,
	failures: HashMap<MockOp, String>,
}

/// In-memory [`K8sClient`] implementation.
#[derive(Default)]
pub struct MockK8sClient {
	state: Mutex<State>,
	calls: Calls,
	open_streams: Arc<AtomicUsize>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	fn state(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn check_failure(&self, op: MockOp) -> Result<(), K8sError> {
		match self.state().failures.get(&op) {
			Some(message) => Err(K8sError::ApiError {
				message: message.clone(),
			}),
			None => Ok(()),
		}
	}

	/// Make every call of `op` fail with an API error until cleared.
	pub fn fail(&self, op: MockOp, message: &str) {
		self.state().failures.insert(op, message.to_string());
	}

	/// Stop failing `op`.
	pub fn clear_failure(&self, op: MockOp) {
		self.state().failures.remove(&op);
	}

	/// Report `hostname` as the load-balancer ingress once the service has
	/// been read more than `after_reads` times.
	pub fn set_ingress(&self, hostname: &str, after_reads: usize) {
		self.state().ingress = Some((hostname.to_string(), after_reads));
	}

	/// Script the lines every log stream yields and how it ends.
	pub fn set_logs(&self, lines: &[&str], tail: LogTail) {
		let mut state = self.state();
		state.log_lines = lines.iter().map(|l| format!("{l}\n")).collect();
		state.log_tail = Some(tail);
	}

	/// Add a pod to a namespace directly.
	pub fn add_pod(&self, namespace: &str, name: &str, phase: &str, container: &str) {
		let pod = make_pod(namespace, name, phase, container);
		self
			.state()
			.pods
			.entry(namespace.to_string())
			.or_default()
			.push(pod);
	}

	pub fn has_namespace(&self, name: &str) -> bool {
		self.state().namespaces.contains_key(name)
	}

	pub fn namespace_count(&self) -> usize {
		self.state().namespaces.len()
	}

	pub fn deployment_count(&self, namespace: &str) -> usize {
		self
			.state()
			.deployments
			.keys()
			.filter(|(ns, _)| ns == namespace)
			.count()
	}

	pub fn service_count(&self, namespace: &str) -> usize {
		self
			.state()
			.services
			.keys()
			.filter(|(ns, _)| ns == namespace)
			.count()
	}

	pub fn get_deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
		self
			.state()
			.deployments
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
	}

	pub fn create_namespace_calls(&self) -> usize {
		self.calls.create_namespace.load(Ordering::SeqCst)
	}

	pub fn delete_namespace_calls(&self) -> usize {
		self.calls.delete_namespace.load(Ordering::SeqCst)
	}

	pub fn create_deployment_calls(&self) -> usize {
		self.calls.create_deployment.load(Ordering::SeqCst)
	}

	pub fn create_service_calls(&self) -> usize {
		self.calls.create_service.load(Ordering::SeqCst)
	}

	pub fn get_service_calls(&self) -> usize {
		self.calls.get_service.load(Ordering::SeqCst)
	}

	pub fn stream_logs_calls(&self) -> usize {
		self.calls.stream_logs.load(Ordering::SeqCst)
	}

	/// Number of log streams handed out and not yet dropped.
	pub fn open_streams(&self) -> usize {
		self.open_streams.load(Ordering::SeqCst)
	}
}

fn make_pod(namespace: &str, name: &str, phase: &str, container: &str) -> Pod {
	Pod {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			namespace: Some(namespace.to_string()),
			..Default::default()
		},
		spec: Some(PodSpec {
			containers: vec![Container {
				name: container.to_string(),
				..Default::default()
			}],
			..Default::default()
		}),
		status: Some(PodStatus {
			phase: Some(phase.to_string()),
			..Default::default()
		}),
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, K8sError> {
		self.calls.create_namespace.fetch_add(1, Ordering::SeqCst);
		self.check_failure(MockOp::CreateNamespace)?;

		let name = namespace.metadata.name.clone().unwrap_or_default();
		let mut state = self.state();
		if state.namespaces.contains_key(&name) {
			return Err(K8sError::AlreadyExists {
				kind: "Namespace",
				name,
			});
		}
		state.namespaces.insert(name, namespace.clone());
		Ok(namespace)
	}

	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError> {
		self
			.state()
			.namespaces
			.get(name)
			.cloned()
			.ok_or_else(|| K8sError::NamespaceNotFound { name: name.into() })
	}

	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
		self.calls.delete_namespace.fetch_add(1, Ordering::SeqCst);
		self.check_failure(MockOp::DeleteNamespace)?;

		let mut state = self.state();
		if state.namespaces.remove(name).is_none() {
			return Err(K8sError::NamespaceNotFound { name: name.into() });
		}
		state.deployments.retain(|(ns, _), _| ns != name);
		state.services.retain(|(ns, _), _| ns != name);
		state.pods.remove(name);
		Ok(())
	}

	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError> {
		self.calls.create_deployment.fetch_add(1, Ordering::SeqCst);
		self.check_failure(MockOp::CreateDeployment)?;

		let name = deployment.metadata.name.clone().unwrap_or_default();
		let key = (namespace.to_string(), name.clone());
		let mut state = self.state();
		if state.deployments.contains_key(&key) {
			return Err(K8sError::AlreadyExists {
				kind: "Deployment",
				name,
			});
		}

		let container = deployment
			.spec
			.as_ref()
			.and_then(|s| s.template.spec.as_ref())
			.and_then(|s| s.containers.first())
			.map(|c| c.name.clone())
			.unwrap_or_default();
		let pod = make_pod(
			namespace,
			&format!("{name}-6f7d8c9b5-x2k4p"),
			"Running",
			&container,
		);
		state
			.pods
			.entry(namespace.to_string())
			.or_default()
			.push(pod);
		state.deployments.insert(key, deployment.clone());
		Ok(deployment)
	}

	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError> {
		self.calls.create_service.fetch_add(1, Ordering::SeqCst);
		self.check_failure(MockOp::CreateService)?;

		let name = service.metadata.name.clone().unwrap_or_default();
		let key = (namespace.to_string(), name.clone());
		let mut state = self.state();
		if state.services.contains_key(&key) {
			return Err(K8sError::AlreadyExists {
				kind: "Service",
				name,
			});
		}
		state.services.insert(key, service.clone());
		Ok(service)
	}

	async fn get_service(&self, name: &str, namespace: &str) -> Result<Service, K8sError> {
		let reads = self.calls.get_service.fetch_add(1, Ordering::SeqCst) + 1;
		self.check_failure(MockOp::GetService)?;

		let state = self.state();
		let mut service = state
			.services
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
			.ok_or_else(|| K8sError::ServiceNotFound { name: name.into() })?;

		if let Some((hostname, after_reads)) = &state.ingress {
			if reads > *after_reads {
				service.status = Some(ServiceStatus {
					load_balancer: Some(LoadBalancerStatus {
						ingress: Some(vec![LoadBalancerIngress {
							hostname: Some(hostname.clone()),
							..Default::default()
						}]),
					}),
					..Default::default()
				});
			}
		}
		Ok(service)
	}

	async fn list_pods(&self, namespace: &str, _label_selector: &str) -> Result<Vec<Pod>, K8sError> {
		self.check_failure(MockOp::ListPods)?;
		Ok(self.state().pods.get(namespace).cloned().unwrap_or_default())
	}

	async fn stream_logs(
		&self,
		name: &str,
		namespace: &str,
		_container: &str,
		_opts: LogOptions,
	) -> Result<LogStream, K8sError> {
		self.calls.stream_logs.fetch_add(1, Ordering::SeqCst);
		self.check_failure(MockOp::StreamLogs)?;

		let state = self.state();
		let exists = state.pods.get(namespace).is_some_and(|pods| {
			pods
				.iter()
				.any(|p| p.metadata.name.as_deref() == Some(name))
		});
		if !exists {
			return Err(K8sError::PodNotFound { name: name.into() });
		}

		let lines: Vec<Result<Bytes, std::io::Error>> = state
			.log_lines
			.iter()
			.map(|l| Ok(Bytes::from(l.clone())))
			.collect();
		let head = futures::stream::iter(lines);

		use futures::StreamExt;
		let stream: LogStream = match state.log_tail.clone().unwrap_or(LogTail::End) {
			LogTail::End => Box::pin(head),
			LogTail::Follow => Box::pin(head.chain(futures::stream::pending())),
			LogTail::Error(message) => Box::pin(head.chain(futures::stream::once(async move {
				Err(std::io::Error::other(message))
			}))),
		};

		self.open_streams.fetch_add(1, Ordering::SeqCst);
		Ok(Box::pin(TrackedStream {
			inner: stream,
			open: Arc::clone(&self.open_streams),
		}))
	}
}

/// Log stream wrapper that decrements the open-stream counter when dropped.
struct TrackedStream {
	inner: LogStream,
	open: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
	type Item = Result<Bytes, std::io::Error>;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.inner.as_mut().poll_next(cx)
	}
}

impl Drop for TrackedStream {
	fn drop(&mut self) {
		self.open.fetch_sub(1, Ordering::SeqCst);
	}
}
