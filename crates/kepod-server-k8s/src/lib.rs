// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kubernetes client abstraction for kepod.
//!
//! The [`K8sClient`] trait covers the handful of cluster operations kepod
//! needs: namespace lifecycle, deployment and service creation, service
//! status reads, pod listing and followed container logs. [`KubeClient`]
//! talks to a real cluster through `kube`; [`MockK8sClient`] keeps
//! everything in memory for tests.

pub mod client;
pub mod error;
pub mod kube_client;
pub mod mock;
pub mod types;

pub use client::K8sClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::KubeClient;
pub use mock::{LogTail, MockK8sClient, MockOp};
pub use types::{
	ingress_hostname, pod_phase, Container, ContainerPort, Deployment, DeploymentSpec, LogOptions,
	LogStream, Namespace, Pod, PodSpec, PodStatus, PodTemplateSpec, ResourceRequirements, Service,
	ServicePort, ServiceSpec,
};
