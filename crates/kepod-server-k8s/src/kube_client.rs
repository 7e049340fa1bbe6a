// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use futures::StreamExt;
use kube::{
	api::{Api, DeleteParams, ListParams, LogParams, PostParams},
	Client,
};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::{on_create, K8sError};
use crate::types::{Deployment, LogOptions, LogStream, Namespace, Pod, Service};

/// Production K8s client implementation using the kube crate.
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self, namespace), fields(namespace = ?namespace.metadata.name))]
	async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, K8sError> {
		let name = namespace.metadata.name.clone().unwrap_or_default();
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		namespaces
			.create(&PostParams::default(), &namespace)
			.await
			.map_err(|e| on_create(e, "Namespace", &name))
	}

	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		match namespaces.get(name).await {
			Ok(ns) => Ok(ns),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::NamespaceNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self))]
	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		match namespaces.delete(name, &DeleteParams::default()).await {
			Ok(_) => Ok(()),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::NamespaceNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self, deployment), fields(deployment = ?deployment.metadata.name))]
	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError> {
		let name = deployment.metadata.name.clone().unwrap_or_default();
		let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
		deployments
			.create(&PostParams::default(), &deployment)
			.await
			.map_err(|e| on_create(e, "Deployment", &name))
	}

	#[instrument(skip(self, service), fields(service = ?service.metadata.name))]
	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError> {
		let name = service.metadata.name.clone().unwrap_or_default();
		let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
		services
			.create(&PostParams::default(), &service)
			.await
			.map_err(|e| on_create(e, "Service", &name))
	}

	async fn get_service(&self, name: &str, namespace: &str) -> Result<Service, K8sError> {
		let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
		match services.get(name).await {
			Ok(svc) => Ok(svc),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::ServiceNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let lp = if label_selector.is_empty() {
			ListParams::default()
		} else {
			ListParams::default().labels(label_selector)
		};
		match pods.list(&lp).await {
			Ok(list) => Ok(list.items),
			Err(kube::Error::Api(err)) if err.code == 404 => Err(K8sError::NamespaceNotFound {
				name: namespace.into(),
			}),
			Err(e) => Err(e.into()),
		}
	}

	async fn stream_logs(
		&self,
		name: &str,
		namespace: &str,
		container: &str,
		opts: LogOptions,
	) -> Result<LogStream, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let lp = LogParams {
			container: Some(container.to_string()),
			follow: true,
			tail_lines: opts.tail.map(i64::from),
			timestamps: opts.timestamps,
			..Default::default()
		};

		let stream = pods.log_stream(name, &lp).await.map_err(|e| match e {
			kube::Error::Api(ref err) if err.code == 404 => K8sError::PodNotFound { name: name.into() },
			_ => K8sError::StreamError {
				message: e.to_string(),
			},
		})?;

		let compat_stream = stream.compat();
		let chunks = tokio_util::io::ReaderStream::new(compat_stream);
		let mapped = chunks.map(|result| result.map_err(std::io::Error::other));
		Ok(Box::pin(mapped))
	}
}
