//! Shared helpers for ntm-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ntm_core::app::App;
use ntm_core::config::Config;
use ntm_core::storage::{MemoryTokenStore, TokenStore};
use serde_json::{Value, json};
use wiremock::MockServer;

pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Builds an app pointed at the mock server, with `store` as its token store.
pub fn app_with_store(server: &MockServer, store: Arc<MemoryTokenStore>) -> App {
    app_with_config(server, store, Config::default())
}

pub fn app_with_config(server: &MockServer, store: Arc<MemoryTokenStore>, config: Config) -> App {
    let store: Arc<dyn TokenStore> = store;
    App::with_base_url(config, store, server.uri()).expect("build app")
}

pub fn task_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "user_id": 1,
        "name": name,
        "frequency": "daily",
        "scheduled_time": "08:00",
        "prompt": "Summarize the news",
        "expert_mode": false,
        "is_active": true,
        "timezone": "Asia/Shanghai",
        "created_at": "2025-01-01T00:00:00",
        "updated_at": "2025-01-01T00:00:00",
        "next_run": "2025-01-02T08:00:00"
    })
}

pub fn user_json(email: &str) -> Value {
    json!({
        "id": 7,
        "email": email,
        "created_at": "2025-01-01T00:00:00",
        "last_login": "2025-01-05T09:30:00.123456"
    })
}
