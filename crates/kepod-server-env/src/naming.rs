// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deterministic names for an environment's cluster resources and files.
//!
//! Everything derives from the namespace, which embeds the unique `env_id`,
//! so two environments never share a resource name.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// `app_url` recorded when no load-balancer hostname appeared in time.
pub const PENDING_ENDPOINT: &str = "pending";

/// `app_url` recorded when the service already existed on a replayed job.
pub const EXISTING_SERVICE: &str = "existing-service";

/// Maximum length of a DNS-1123 label, which namespace names must be.
pub const MAX_LABEL_LEN: usize = 63;

pub fn new_env_id() -> String {
	Uuid::new_v4().to_string()
}

pub fn namespace_for(name: &str, env_id: &str) -> String {
	format!("{name}-{env_id}")
}

pub fn deployment_name(namespace: &str) -> String {
	format!("{namespace}-app")
}

pub fn service_name(namespace: &str) -> String {
	format!("{namespace}-svc")
}

/// Pods created by the environment's deployment start with this prefix.
pub fn pod_prefix(namespace: &str) -> String {
	deployment_name(namespace)
}

pub fn log_file_name(namespace: &str) -> String {
	format!("{namespace}.log")
}

/// Object-store key for an archived log file.
pub fn archive_key(namespace: &str, env_id: &str, at: DateTime<Utc>) -> String {
	let stamp = at
		.to_rfc3339_opts(SecondsFormat::Millis, true)
		.replace(':', "-");
	format!("logs/{namespace}-{env_id}/{stamp}.log")
}

/// Whether `value` is a DNS-1123 label: lowercase alphanumerics and `-`,
/// starting and ending with an alphanumeric, at most 63 characters.
pub fn is_dns_label(value: &str) -> bool {
	let bytes = value.as_bytes();
	!bytes.is_empty()
		&& bytes.len() <= MAX_LABEL_LEN
		&& bytes
			.iter()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
		&& bytes[0] != b'-'
		&& bytes[bytes.len() - 1] != b'-'
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn resource_names() {
		let ns = namespace_for("demo", "1234");
		assert_eq!(ns, "demo-1234");
		assert_eq!(deployment_name(&ns), "demo-1234-app");
		assert_eq!(service_name(&ns), "demo-1234-svc");
		assert_eq!(log_file_name(&ns), "demo-1234.log");
	}

	#[test]
	fn archive_key_layout() {
		let at = DateTime::parse_from_rfc3339("2025-03-01T10:20:30.456Z")
			.unwrap()
			.with_timezone(&Utc);
		assert_eq!(
			archive_key("demo-1234", "1234", at),
			"logs/demo-1234-1234/2025-03-01T10-20-30.456Z.log"
		);
	}

	#[test]
	fn dns_labels() {
		assert!(is_dns_label("demo-1"));
		assert!(!is_dns_label("Demo"));
		assert!(!is_dns_label("demo-"));
		assert!(!is_dns_label("de_mo"));
		assert!(!is_dns_label(&"a".repeat(64)));
	}

	proptest! {
		#[test]
		fn namespace_from_short_label_is_valid(name in "[a-z][a-z0-9-]{1,24}[a-z0-9]") {
			let ns = namespace_for(&name, &new_env_id());
			prop_assert!(is_dns_label(&ns), "{ns} is not a DNS label");
		}

		#[test]
		fn distinct_ids_never_collide(name in "[a-z]{3,10}") {
			prop_assert_ne!(namespace_for(&name, &new_env_id()), namespace_for(&name, &new_env_id()));
		}
	}
}
