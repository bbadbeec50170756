use axum::Router;

use crate::state::SharedState;

pub mod auth;
pub mod backend;
pub mod docs;
pub mod health;
pub mod scores;

/// Compose all route trees under `/api`, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(backend::router())
        .merge(auth::router())
        .merge(scores::router());

    Router::new()
        .nest("/api", api_router)
        .merge(docs::router())
        .with_state(state)
}

#[cfg(all(test, feature = "sheets-store"))]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::backend::local::LocalBackend,
        state::{AppState, InitEvent},
    };

    async fn serve(state: SharedState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn offline_round_trip_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalBackend::new(dir.path(), "test"));
        let state = AppState::new(AppConfig::default(), None, local);
        state.transition(InitEvent::Start).await.unwrap();
        let base = serve(state.clone()).await;
        let client = reqwest::Client::new();

        let pending = client
            .post(format!("{base}/api/auth/login"))
            .json(&json!({ "username_or_email": "alice", "password": "pw1234" }))
            .send()
            .await
            .unwrap();
        assert_eq!(pending.status(), 503);
        let body: Value = pending.json().await.unwrap();
        assert_eq!(body["retryable"], true);

        let offline = client
            .post(format!("{base}/api/backend/offline"))
            .send()
            .await
            .unwrap();
        assert_eq!(offline.status(), 200);

        let mismatch = client
            .post(format!("{base}/api/auth/register"))
            .json(&json!({
                "username": "alice",
                "email": "a@x.com",
                "password": "pw1234",
                "confirm_password": "pw9999"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(mismatch.status(), 400);
        let body: Value = mismatch.json().await.unwrap();
        assert_eq!(body["retryable"], false);

        let registered = client
            .post(format!("{base}/api/auth/register"))
            .json(&json!({
                "username": "alice",
                "email": "a@x.com",
                "password": "pw1234",
                "confirm_password": "pw1234"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(registered.status(), 200);

        let holes = vec![4u32; 18];
        let saved = client
            .post(format!("{base}/api/scores"))
            .json(&json!({ "course_name": "Lakeside", "holes": holes }))
            .send()
            .await
            .unwrap();
        assert_eq!(saved.status(), 200);

        let oversized = vec![u32::MAX; 18];
        let rejected = client
            .post(format!("{base}/api/scores"))
            .json(&json!({ "course_name": "Lakeside", "holes": oversized }))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), 400);

        let stats: Value = client
            .get(format!("{base}/api/statistics?player=alice"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["total_rounds"], 1);
        assert_eq!(stats["best_score"], 72);
        assert_eq!(stats["recent_average"], 72);

        let health: Value = client
            .get(format!("{base}/api/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "offline");
        assert_eq!(health["init"]["phase"], "fallback_active");
    }
}
