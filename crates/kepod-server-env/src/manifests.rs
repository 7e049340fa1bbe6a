// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster manifests for one environment.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kepod_server_k8s::{
	Container, ContainerPort, Deployment, DeploymentSpec, Namespace, PodSpec, PodTemplateSpec,
	ResourceRequirements, Service, ServicePort, ServiceSpec,
};

use crate::config::ReconcilerConfig;
use crate::job::ProvisionJob;
use crate::naming;

const MANAGED_LABEL: &str = "kepod.dev/managed";
const ENV_ID_LABEL: &str = "kepod.dev/env-id";
const APP_LABEL: &str = "app";

fn managed_labels(job: &ProvisionJob) -> BTreeMap<String, String> {
	BTreeMap::from([
		(MANAGED_LABEL.to_string(), "true".to_string()),
		(ENV_ID_LABEL.to_string(), job.env_id.clone()),
	])
}

fn app_selector(job: &ProvisionJob) -> BTreeMap<String, String> {
	BTreeMap::from([(APP_LABEL.to_string(), job.env_name.clone())])
}

pub fn build_namespace(job: &ProvisionJob) -> Namespace {
	Namespace {
		metadata: ObjectMeta {
			name: Some(job.namespace.clone()),
			labels: Some(managed_labels(job)),
			..Default::default()
		},
		..Default::default()
	}
}

/// Single-replica deployment running the job's image under `app={env_name}`.
pub fn build_deployment(job: &ProvisionJob, config: &ReconcilerConfig) -> Deployment {
	let mut pod_labels = app_selector(job);
	pod_labels.extend(managed_labels(job));

	let requests = BTreeMap::from([
		("cpu".to_string(), Quantity(config.cpu_request.clone())),
		("memory".to_string(), Quantity(config.memory_request.clone())),
	]);

	Deployment {
		metadata: ObjectMeta {
			name: Some(naming::deployment_name(&job.namespace)),
			namespace: Some(job.namespace.clone()),
			labels: Some(managed_labels(job)),
			..Default::default()
		},
		spec: Some(DeploymentSpec {
			replicas: Some(1),
			selector: LabelSelector {
				match_labels: Some(app_selector(job)),
				..Default::default()
			},
			template: PodTemplateSpec {
				metadata: Some(ObjectMeta {
					labels: Some(pod_labels),
					..Default::default()
				}),
				spec: Some(PodSpec {
					containers: vec![Container {
						name: job.env_name.clone(),
						image: Some(job.image.clone()),
						ports: Some(vec![ContainerPort {
							container_port: i32::from(job.target_port),
							..Default::default()
						}]),
						resources: Some(ResourceRequirements {
							requests: Some(requests),
							..Default::default()
						}),
						..Default::default()
					}],
					..Default::default()
				}),
			},
			..Default::default()
		}),
		..Default::default()
	}
}

/// Load-balancer service forwarding the configured port to the target port.
pub fn build_service(job: &ProvisionJob, config: &ReconcilerConfig) -> Service {
	Service {
		metadata: ObjectMeta {
			name: Some(naming::service_name(&job.namespace)),
			namespace: Some(job.namespace.clone()),
			labels: Some(managed_labels(job)),
			..Default::default()
		},
		spec: Some(ServiceSpec {
			type_: Some("LoadBalancer".to_string()),
			selector: Some(app_selector(job)),
			ports: Some(vec![ServicePort {
				port: i32::from(config.service_port),
				target_port: Some(IntOrString::Int(i32::from(job.target_port))),
				protocol: Some("TCP".to_string()),
				..Default::default()
			}]),
			..Default::default()
		}),
		..Default::default()
	}
}
