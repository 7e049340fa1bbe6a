// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::buffer::LogBuffer;
use crate::entry::LogLevel;
use crate::visitor::FieldVisitor;

/// A tracing layer that copies every event into a [`LogBuffer`].
#[derive(Clone)]
pub struct BroadcastLogLayer {
	buffer: LogBuffer,
}

impl BroadcastLogLayer {
	pub fn new(buffer: LogBuffer) -> Self {
		Self { buffer }
	}
}

impl<S> Layer<S> for BroadcastLogLayer
where
	S: Subscriber + for<'a> LookupSpan<'a>,
{
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let metadata = event.metadata();
		let mut visitor = FieldVisitor::default();
		event.record(&mut visitor);

		self.buffer.push(
			LogLevel::from_tracing(metadata.level()),
			metadata.target().to_string(),
			visitor.message.unwrap_or_default(),
			visitor.fields,
		);
	}
}
