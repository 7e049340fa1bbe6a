// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP API tests against in-memory SQLite and a mock cluster.

use std::sync::Arc;

use axum::{
	body::Body,
	http::{header, Request, StatusCode},
	Router,
};
use chrono::Utc;
use kepod_server::{create_app_state, create_router, create_worker, AppState, ServerConfig};
use kepod_server_db::testing::create_test_pool;
use kepod_server_db::{
	EnvStatus, Environment, EnvironmentRepository, EnvironmentStore, JobQueue,
	MemoryEnvironmentStore, QueueRepository,
};
use kepod_server_k8s::MockK8sClient;
use kepod_server_logs::LogBuffer;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct TestApp {
	dir: TempDir,
	client: Arc<MockK8sClient>,
	store: Arc<dyn EnvironmentStore>,
	queue: Arc<dyn JobQueue>,
	config: ServerConfig,
	state: AppState,
	router: Router,
}

impl TestApp {
	async fn request(&self, req: Request<Body>) -> (StatusCode, Value) {
		let response = self.router.clone().oneshot(req).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let body = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, body)
	}

	async fn get(&self, uri: &str) -> (StatusCode, Value) {
		self.request(Request::get(uri).body(Body::empty()).unwrap())
			.await
	}

	async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
		self.request(
			Request::post(uri)
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
		)
		.await
	}

	async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
		self.request(Request::post(uri).body(Body::empty()).unwrap())
			.await
	}

	async fn insert_ready(&self, env_id: &str, name: &str, ttl: i64, age_secs: i64) {
		self.store
			.create(&Environment {
				env_id: env_id.into(),
				name: name.into(),
				image: "nginx".into(),
				ttl,
				namespace: format!("{name}-{env_id}"),
				target_port: 80,
				status: EnvStatus::Queued,
				created_at: Utc::now() - chrono::Duration::seconds(age_secs),
				app_url: None,
			})
			.await
			.unwrap();
		self.store.mark_ready(env_id, "lb.example.com").await.unwrap();
	}
}

async fn build(store: Arc<dyn EnvironmentStore>) -> TestApp {
	let dir = TempDir::new().unwrap();
	let queue: Arc<dyn JobQueue> = Arc::new(QueueRepository::new(create_test_pool().await.unwrap()));
	let client = Arc::new(MockK8sClient::new());

	let mut config = ServerConfig::default();
	config.logs.dir = dir.path().join("logs");
	config.logs.archive_dir = dir.path().join("objects");

	let state = create_app_state(
		Arc::clone(&store),
		Arc::clone(&queue),
		client.clone(),
		&config,
		LogBuffer::new(100),
	)
	.unwrap();
	let router = create_router(state.clone());

	TestApp {
		dir,
		client,
		store,
		queue,
		config,
		state,
		router,
	}
}

async fn test_app() -> TestApp {
	let pool = create_test_pool().await.unwrap();
	build(Arc::new(EnvironmentRepository::new(pool))).await
}

#[tokio::test]
async fn create_env_records_queued_and_enqueues_job() {
	let app = test_app().await;

	let (status, body) = app
		.post_json(
			"/api/create-env",
			json!({ "name": "web", "image": "nginx:1.27", "ttl": 600 }),
		)
		.await;
	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(body["status"], "QUEUED");
	let env_id = body["env_id"].as_str().unwrap().to_string();
	assert!(!env_id.is_empty());
	assert_eq!(app.queue.depth().await.unwrap(), 1);

	let (status, record) = app.get(&format!("/api/envs/{env_id}")).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(record["env_name"], "web");
	assert_eq!(record["namespace"], format!("web-{env_id}"));
	assert_eq!(record["target_port"], 80);
	assert_eq!(record["status"], "QUEUED");
}

#[tokio::test]
async fn create_env_accepts_camel_case_target_port() {
	let app = test_app().await;
	let (status, body) = app
		.post_json(
			"/api/create-env",
			json!({ "name": "api", "image": "httpd", "ttl": 60, "targetPort": 8080 }),
		)
		.await;
	assert_eq!(status, StatusCode::CREATED);

	let env_id = body["env_id"].as_str().unwrap();
	let record = app.store.get(env_id).await.unwrap().unwrap();
	assert_eq!(record.target_port, 8080);
}

#[tokio::test]
async fn create_env_rejects_invalid_input() {
	let app = test_app().await;

	let (status, body) = app
		.post_json(
			"/api/create-env",
			json!({ "name": "Not_Valid", "image": "nginx", "ttl": 600 }),
		)
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "bad_request");
	assert!(body["message"].as_str().unwrap().contains("name"));

	let (status, _) = app
		.post_json(
			"/api/create-env",
			json!({ "name": "web", "image": "nginx", "ttl": 0 }),
		)
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, body) = app
		.post_json(
			"/api/create-env",
			json!({ "name": "web", "image": "nginx", "ttl": 10_000_000_000_000i64 }),
		)
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["message"].as_str().unwrap().contains("ttl"));

	let (status, body) = app
		.request(
			Request::post("/api/create-env")
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from("{"))
				.unwrap(),
		)
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "bad_request");

	assert_eq!(app.queue.depth().await.unwrap(), 0);
	assert!(app.store.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_unknown_env_is_not_found() {
	let app = test_app().await;
	let (status, body) = app.get("/api/envs/missing").await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn list_envs_filters_by_status() {
	let app = test_app().await;
	app.insert_ready("e1", "web", 600, 0).await;
	app.post_json(
		"/api/create-env",
		json!({ "name": "api", "image": "httpd", "ttl": 60 }),
	)
	.await;

	let (status, body) = app.get("/api/envs").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["environments"].as_array().unwrap().len(), 2);

	let (_, body) = app.get("/api/envs?status=ready").await;
	let ready = body["environments"].as_array().unwrap();
	assert_eq!(ready.len(), 1);
	assert_eq!(ready[0]["env_id"], "e1");

	let (status, _) = app.get("/api/envs?status=sleeping").await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn worker_provisions_submitted_environment() {
	let app = test_app().await;
	app.client.set_ingress("lb.example.com", 0);

	let (_, body) = app
		.post_json(
			"/api/create-env",
			json!({ "name": "web", "image": "nginx", "ttl": 600 }),
		)
		.await;
	let env_id = body["env_id"].as_str().unwrap().to_string();
	let namespace = format!("web-{env_id}");

	let worker = create_worker(&app.state, &app.config, CancellationToken::new());
	let report = worker.poll_once().await.unwrap();
	assert_eq!(report.received, 1);
	assert_eq!(report.acked, 1);

	let (_, record) = app.get(&format!("/api/envs/{env_id}")).await;
	assert_eq!(record["status"], "READY");
	assert_eq!(record["app_url"], "lb.example.com");
	assert!(app.client.has_namespace(&namespace));
	assert_eq!(app.client.deployment_count(&namespace), 1);
	assert_eq!(app.client.service_count(&namespace), 1);
	assert_eq!(app.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn sweep_endpoint_deletes_expired_environments() {
	let app = test_app().await;
	app.insert_ready("old", "web", 1, 30).await;
	app.insert_ready("new", "api", 3600, 0).await;

	let (status, report) = app.post_empty("/api/sweep").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(report["scanned"], 2);
	assert_eq!(report["expired"], 1);
	assert_eq!(report["deleted"], 1);
	assert!(report["failures"].as_array().unwrap().is_empty());

	let (_, old) = app.get("/api/envs/old").await;
	assert_eq!(old["status"], "DELETED");
	let (_, new) = app.get("/api/envs/new").await;
	assert_eq!(new["status"], "READY");

	let (_, again) = app.post_empty("/api/sweep").await;
	assert_eq!(again["expired"], 0);
	assert_eq!(app.client.delete_namespace_calls(), 1);
}

#[tokio::test]
async fn cleanup_without_log_file_reports_nothing_to_archive() {
	let app = test_app().await;
	app.insert_ready("e1", "web", 600, 0).await;

	let (status, body) = app.post_empty("/api/cleanup/e1").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["env_id"], "e1");
	assert_eq!(body["namespace"], "web-e1");
	assert_eq!(body["outcome"], "no_log_file");
}

#[tokio::test]
async fn cleanup_archives_and_removes_log_file() {
	let app = test_app().await;
	let logs_dir = app.dir.path().join("logs");
	std::fs::create_dir_all(&logs_dir).unwrap();
	let log_file = logs_dir.join("web-e1.log");
	std::fs::write(&log_file, "GET / 200\n").unwrap();

	let (status, body) = app
		.post_json("/api/cleanup/e1", json!({ "namespace": "web-e1" }))
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["outcome"], "archived");

	let key = body["key"].as_str().unwrap();
	assert!(key.starts_with("logs/web-e1-e1/"));
	assert!(!log_file.exists());
	let archived = app.dir.path().join("objects").join(key);
	assert_eq!(std::fs::read_to_string(archived).unwrap(), "GET / 200\n");
}

#[tokio::test]
async fn cleanup_rejects_unsafe_namespace_and_unknown_env() {
	let app = test_app().await;

	let (status, _) = app
		.post_json("/api/cleanup/e1", json!({ "namespace": "../etc" }))
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _) = app.post_empty("/api/cleanup/missing").await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_components() {
	let app = test_app().await;
	app.post_json(
		"/api/create-env",
		json!({ "name": "web", "image": "nginx", "ttl": 60 }),
	)
	.await;

	let (status, body) = app.get("/health").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "healthy");
	assert_eq!(body["database"]["ok"], true);
	assert_eq!(body["kubernetes"]["ok"], true);
	assert_eq!(body["queue_depth"], 1);
	assert_eq!(body["active_subscriptions"], 0);
}

#[tokio::test]
async fn health_is_unavailable_without_store() {
	let store = Arc::new(MemoryEnvironmentStore::new());
	store.set_unavailable(true);
	let app = build(store).await;

	let (status, body) = app.get("/health").await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["status"], "unhealthy");
	assert_eq!(body["database"]["ok"], false);
}

#[tokio::test]
async fn sweep_reports_unavailable_store() {
	let store = Arc::new(MemoryEnvironmentStore::new());
	store.set_unavailable(true);
	let app = build(store).await;

	let (status, body) = app.post_empty("/api/sweep").await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["error"], "service_unavailable");
}

#[tokio::test]
async fn server_log_endpoints_validate_level() {
	let app = test_app().await;

	let (status, body) = app.get("/api/logs?limit=5").await;
	assert_eq!(status, StatusCode::OK);
	assert!(body["entries"].as_array().unwrap().is_empty());
	assert_eq!(body["buffer_capacity"], 100);

	let (status, _) = app.get("/api/logs?level=loud").await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}
