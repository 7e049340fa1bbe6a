// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! WebSocket connection handler with first-message subscription.

use axum::{
	extract::{
		ws::{close_code, CloseFrame, Message, WebSocket},
		State, WebSocketUpgrade,
	},
	response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use kepod_server_env::{ConnectionId, LogMultiplexer, SubscribeRequest, SubscriptionEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{MAX_QUEUE_SIZE, RELEASE_TIMEOUT, SUBSCRIBE_TIMEOUT};
use crate::api::AppState;

/// GET /ws/logs
pub async fn ws_logs_handler(
	ws: WebSocketUpgrade,
	State(state): State<AppState>,
) -> impl IntoResponse {
	let multiplexer = state.multiplexer;
	ws.on_upgrade(move |socket| handle_log_socket(socket, multiplexer))
}

fn error_frame(message: &str) -> Message {
	let body = serde_json::json!({ "error": message }).to_string();
	Message::Text(body.into())
}

fn close_frame(code: u16, reason: &'static str) -> Message {
	Message::Close(Some(CloseFrame {
		code,
		reason: reason.into(),
	}))
}

async fn handle_log_socket(socket: WebSocket, multiplexer: LogMultiplexer) {
	let conn = multiplexer.next_connection_id();
	info!(conn = %conn, "Log WebSocket connected");

	let (mut sender, mut receiver) = socket.split();
	let (out_tx, mut out_rx) = mpsc::channel::<Message>(MAX_QUEUE_SIZE);

	let send_task = tokio::spawn(async move {
		while let Some(msg) = out_rx.recv().await {
			let closing = matches!(msg, Message::Close(_));
			if let Err(e) = sender.send(msg).await {
				debug!(error = %e, "Failed to send WebSocket message");
				break;
			}
			if closing {
				break;
			}
		}
	});

	let (event_tx, mut event_rx) = mpsc::channel::<SubscriptionEvent>(MAX_QUEUE_SIZE);
	let mut event_tx = Some(event_tx);
	let mut pump: Option<JoinHandle<()>> = None;
	let subscribe_deadline = tokio::time::Instant::now() + SUBSCRIBE_TIMEOUT;

	loop {
		tokio::select! {
			_ = tokio::time::sleep_until(subscribe_deadline), if pump.is_none() => {
				warn!(conn = %conn, "No subscribe request received");
				let _ = out_tx.send(error_frame("subscribe timeout")).await;
				let _ = out_tx.send(close_frame(close_code::POLICY, "subscribe timeout")).await;
				break;
			}
			msg = receiver.next() => match msg {
				Some(Ok(Message::Text(text))) => {
					let Some(tx) = event_tx.take() else {
						debug!(conn = %conn, "Ignoring message on subscribed connection");
						continue;
					};
					match subscribe(&multiplexer, conn, text.as_str(), tx).await {
						Ok(handle) => pump = Some(handle),
						Err(message) => {
							let _ = out_tx.send(error_frame(&message)).await;
							let _ = out_tx.send(close_frame(close_code::POLICY, "subscribe failed")).await;
							break;
						}
					}
				}
				Some(Ok(Message::Ping(data))) => {
					let _ = out_tx.send(Message::Pong(data)).await;
				}
				Some(Ok(Message::Close(_))) | None => {
					debug!(conn = %conn, "Client closed log WebSocket");
					break;
				}
				Some(Err(e)) => {
					debug!(conn = %conn, error = %e, "WebSocket error");
					break;
				}
				Some(Ok(_)) => {}
			},
			event = event_rx.recv(), if pump.is_some() => match event {
				Some(SubscriptionEvent::Line(line)) => {
					if out_tx.send(Message::Text(line.into())).await.is_err() {
						break;
					}
				}
				Some(SubscriptionEvent::Error(message)) => {
					let _ = out_tx.send(error_frame(&message)).await;
				}
				None => {
					let _ = out_tx.send(close_frame(close_code::NORMAL, "log stream ended")).await;
					break;
				}
			},
		}
	}

	release(&multiplexer, conn, event_rx, pump).await;

	drop(out_tx);
	if tokio::time::timeout(RELEASE_TIMEOUT, send_task).await.is_err() {
		debug!(conn = %conn, "WebSocket sender did not finish in time");
	}
	info!(conn = %conn, "Log WebSocket terminated");
}

async fn subscribe(
	multiplexer: &LogMultiplexer,
	conn: ConnectionId,
	text: &str,
	tx: mpsc::Sender<SubscriptionEvent>,
) -> Result<JoinHandle<()>, String> {
	let req = SubscribeRequest::parse(text).map_err(|e| e.to_string())?;
	multiplexer.subscribe(conn, req, tx).await.map_err(|e| {
		warn!(conn = %conn, error = %e, "Log subscription refused");
		e.to_string()
	})
}

async fn release(
	multiplexer: &LogMultiplexer,
	conn: ConnectionId,
	event_rx: mpsc::Receiver<SubscriptionEvent>,
	pump: Option<JoinHandle<()>>,
) {
	let Some(pump) = pump else {
		return;
	};
	multiplexer.unsubscribe(conn);
	drop(event_rx);
	if tokio::time::timeout(RELEASE_TIMEOUT, pump).await.is_err() {
		warn!(conn = %conn, "Log subscription task did not release in time");
	}
}
