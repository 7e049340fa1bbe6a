// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-namespace log file sink.
//!
//! Events that carry a `namespace` field, either directly or on an enclosing
//! span, are appended as one JSON object per line to
//! `{dir}/{namespace}.log`. The file is opened in append mode for each write
//! and closed again, so the archiver can move it away at any time.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::entry::LogLevel;
use crate::visitor::FieldVisitor;

const NAMESPACE_FIELD: &str = "namespace";

/// Maximum length of a DNS-1123 label.
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Whether `namespace` is a valid DNS-1123 label and therefore safe to use as
/// a file name.
pub fn is_safe_namespace(namespace: &str) -> bool {
	!namespace.is_empty()
		&& namespace.len() <= MAX_NAMESPACE_LEN
		&& namespace
			.bytes()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
		&& !namespace.starts_with('-')
		&& !namespace.ends_with('-')
}

/// Namespace recorded on a span, stored in its extensions.
struct SpanNamespace(String);

#[derive(Serialize)]
struct FileRecord<'a> {
	timestamp: String,
	level: &'static str,
	target: &'a str,
	message: &'a str,
	#[serde(skip_serializing_if = "<[_]>::is_empty")]
	fields: &'a [(String, String)],
}

/// A tracing layer that writes namespace-scoped events to per-namespace files.
#[derive(Debug, Clone)]
pub struct NamespaceFileLayer {
	dir: PathBuf,
}

impl NamespaceFileLayer {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Path of the file events for `namespace` are written to.
	pub fn path_for(&self, namespace: &str) -> PathBuf {
		self.dir.join(format!("{namespace}.log"))
	}

	fn append(&self, namespace: &str, line: &[u8]) -> std::io::Result<()> {
		std::fs::create_dir_all(&self.dir)?;
		let mut file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(self.path_for(namespace))?;
		file.write_all(line)
	}
}

fn clean(value: &str) -> &str {
	value.trim_matches('"')
}

impl<S> Layer<S> for NamespaceFileLayer
where
	S: Subscriber + for<'a> LookupSpan<'a>,
{
	fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
		if attrs.metadata().fields().field(NAMESPACE_FIELD).is_none() {
			return;
		}
		let mut visitor = FieldVisitor::default();
		attrs.record(&mut visitor);
		if let (Some(namespace), Some(span)) = (visitor.field(NAMESPACE_FIELD), ctx.span(id)) {
			span
				.extensions_mut()
				.insert(SpanNamespace(clean(namespace).to_string()));
		}
	}

	fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
		let mut visitor = FieldVisitor::default();
		event.record(&mut visitor);

		let namespace = match visitor.field(NAMESPACE_FIELD) {
			Some(ns) => Some(clean(ns).to_string()),
			None => ctx.event_scope(event).and_then(|scope| {
				scope.from_root().fold(None, |found, span| {
					span
						.extensions()
						.get::<SpanNamespace>()
						.map(|ns| ns.0.clone())
						.or(found)
				})
			}),
		};
		let Some(namespace) = namespace.filter(|ns| is_safe_namespace(ns)) else {
			return;
		};

		let metadata = event.metadata();
		let record = FileRecord {
			timestamp: Utc::now().to_rfc3339(),
			level: LogLevel::from_tracing(metadata.level()).as_str(),
			target: metadata.target(),
			message: visitor.message.as_deref().unwrap_or_default(),
			fields: &visitor.fields,
		};
		let Ok(mut line) = serde_json::to_vec(&record) else {
			return;
		};
		line.push(b'\n');

		if let Err(e) = self.append(&namespace, &line) {
			// Logging from inside a layer would recurse.
			eprintln!("kepod: failed to write namespace log for {namespace}: {e}");
		}
	}
}
