// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

pub use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
pub use k8s_openapi::api::core::v1::{
	Container, ContainerPort, Namespace, Pod, PodSpec, PodStatus, PodTemplateSpec,
	ResourceRequirements, Service, ServicePort, ServiceSpec,
};

/// Options for log streaming.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
	/// Lines to replay from the end of the log before following. `None` replays all.
	pub tail: Option<u32>,
	pub timestamps: bool,
}

/// A pinned stream of raw log chunks from a container.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// First load-balancer ingress hostname reported on a service, if any.
///
/// Some providers report an IP rather than a hostname; the IP is used then.
pub fn ingress_hostname(service: &Service) -> Option<String> {
	let ingress = service
		.status
		.as_ref()?
		.load_balancer
		.as_ref()?
		.ingress
		.as_ref()?
		.first()?;

	ingress
		.hostname
		.clone()
		.or_else(|| ingress.ip.clone())
		.filter(|h| !h.is_empty())
}

/// Phase reported by a pod, or `"Unknown"` when absent.
pub fn pod_phase(pod: &Pod) -> &str {
	pod
		.status
		.as_ref()
		.and_then(|s| s.phase.as_deref())
		.unwrap_or("Unknown")
}
