// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use kepod_server_db::Environment;

/// Queue payload describing one environment to materialize.
///
/// Carries everything the reconciler needs, so replaying it needs no other
/// input than the cluster and the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionJob {
	pub env_id: String,
	pub env_name: String,
	pub image: String,
	pub ttl: i64,
	pub namespace: String,
	#[serde(rename = "targetPort")]
	pub target_port: u16,
}

impl ProvisionJob {
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(body)
	}
}

impl From<&Environment> for ProvisionJob {
	fn from(env: &Environment) -> Self {
		Self {
			env_id: env.env_id.clone(),
			env_name: env.name.clone(),
			image: env.image.clone(),
			ttl: env.ttl,
			namespace: env.namespace.clone(),
			target_port: env.target_port,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_queue_payload() {
		let job = ProvisionJob::from_json(
			r#"{"env_id":"e1","env_name":"demo","image":"nginx","ttl":3600,"namespace":"demo-e1","targetPort":8080}"#,
		)
		.unwrap();
		assert_eq!(job.target_port, 8080);
		assert_eq!(job.namespace, "demo-e1");
	}

	#[test]
	fn rejects_payload_without_namespace() {
		assert!(ProvisionJob::from_json(r#"{"env_id":"e1","env_name":"demo"}"#).is_err());
	}
}
