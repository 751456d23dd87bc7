pub mod ladder;
pub mod players;
pub mod system;


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::test_support::seeded_state;
    use crate::api::build_router;

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = build_router(seeded_state(), "*");
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_router_health() {
        let (status, body) = get("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_router_player_stats_with_encoded_tag() {
        let (status, body) = get("/api/leaderboards/battlegrounds/EU/players/jeef%231111/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "found");
        assert_eq!(body["battle_tag"], "Jeef#1111");
    }

    #[tokio::test]
    async fn test_router_unknown_leaderboard() {
        let (status, body) = get("/api/leaderboards/arena/EU/entries").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
