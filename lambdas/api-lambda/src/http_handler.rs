use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use skillshare_shared::{
    error::{ApiError, ApiResult},
    insights::InsightsOutcome,
    responses::{api_error_response, error_response, json_response, not_found, preflight},
    types::{RecordViewRequest, SetCountRequest, UpdateUserRequest, User},
    users, AppState,
};
use std::sync::Arc;

const OUTCOME_HEADER: &str = "X-Insights-Outcome";

/// Main Lambda handler - routes user and post insights endpoints
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return preflight();
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, parts.as_slice()) {
        // ===== Users =====
        (&Method::POST, ["api", "users"]) => {
            let result = match parse_body::<User>(body) {
                Ok(user) => users::create_user(state.users.as_ref(), user).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::CREATED, result)
        }
        (&Method::GET, ["api", "users"]) => {
            respond(StatusCode::OK, users::list_users(state.users.as_ref()).await)
        }
        (&Method::GET, ["api", "users", "search"]) => {
            let query = event
                .query_string_parameters_ref()
                .and_then(|params| params.first("query"))
                .map(|s| s.to_string());

            match query {
                Some(query) => respond(
                    StatusCode::OK,
                    users::search_users(state.users.as_ref(), &query).await,
                ),
                None => error_response(StatusCode::BAD_REQUEST, "Missing query parameter 'query'"),
            }
        }
        (&Method::GET, ["api", "users", "username", username]) => respond(
            StatusCode::OK,
            users::get_user_by_username(state.users.as_ref(), username).await,
        ),
        (&Method::GET, ["api", "users", user_id, "counts"]) => respond(
            StatusCode::OK,
            users::get_user_counts(state.follows.as_ref(), user_id).await,
        ),
        (&Method::GET, ["api", "users", user_id]) => respond(
            StatusCode::OK,
            users::get_user(state.users.as_ref(), user_id).await,
        ),
        (&Method::PUT, ["api", "users", user_id]) => {
            let result = match parse_body::<UpdateUserRequest>(body) {
                Ok(req) => users::update_user(state.users.as_ref(), user_id, req).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::OK, result)
        }

        // ===== Post insights =====
        (&Method::GET, ["api", "posts", post_id, "insights"]) => {
            insights_response(state.insights.get_insights(post_id).await)
        }
        (&Method::POST, ["api", "posts", post_id, "views"]) => {
            let req = match parse_body::<RecordViewRequest>(body) {
                Ok(req) => req,
                Err(e) => return api_error_response(&e),
            };
            if req.viewer_id.trim().is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "viewerId must not be empty");
            }
            insights_response(state.insights.increment_views(post_id, &req.viewer_id).await)
        }
        (&Method::POST, ["api", "posts", post_id, "insights", "sync"]) => {
            insights_response(state.insights.sync_insights(post_id).await)
        }
        (&Method::PUT, ["api", "posts", post_id, "insights", "likes"]) => {
            match parse_body::<SetCountRequest>(body) {
                Ok(req) => insights_response(state.insights.update_likes(post_id, req.count).await),
                Err(e) => api_error_response(&e),
            }
        }
        (&Method::PUT, ["api", "posts", post_id, "insights", "comments"]) => {
            match parse_body::<SetCountRequest>(body) {
                Ok(req) => {
                    insights_response(state.insights.update_comments(post_id, req.count).await)
                }
                Err(e) => api_error_response(&e),
            }
        }

        _ => not_found(),
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Request body is required".to_string()));
    }
    Ok(serde_json::from_slice(body)?)
}

fn respond<T: Serialize>(status: StatusCode, result: ApiResult<T>) -> Result<Response<Body>, Error> {
    match result {
        Ok(value) => json_response(status, &value),
        Err(e) => api_error_response(&e),
    }
}

fn insights_response(outcome: InsightsOutcome) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header(OUTCOME_HEADER, outcome.kind())
        .body(serde_json::to_string(outcome.insights())?.into())
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillshare_shared::store::{MemoryStore, UserStore};
    use std::collections::HashMap;

    fn request(method: &str, uri: &str, body: &str) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    async fn seeded() -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for (id, username, email) in [("u1", "ada", "ada@example.com"), ("u2", "grace", "grace@example.com")] {
            UserStore::save(
                store.as_ref(),
                User {
                    id: id.into(),
                    username: username.into(),
                    email: Some(email.into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        let (state, _) = AppState::in_memory(store.clone());
        (state, store)
    }

    #[tokio::test]
    async fn test_create_user_returns_201() {
        let (state, _) = seeded().await;
        let response = function_handler(
            request("POST", "/api/users", r#"{"username":"linus","password":"pw"}"#),
            state,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json(&response);
        assert_eq!(body["username"], "linus");
        assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(body.get("password").is_none());
    }

    #[tokio::test]
    async fn test_get_user_and_not_found() {
        let (state, _) = seeded().await;

        let found = function_handler(request("GET", "/api/users/u1", ""), state.clone())
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);
        assert_eq!(json(&found)["username"], "ada");

        let missing = function_handler(request("GET", "/api/users/ghost", ""), state)
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(&missing)["error"], "User not found with id : 'ghost'");
    }

    #[tokio::test]
    async fn test_username_route_is_not_an_id() {
        let (state, _) = seeded().await;
        let response = function_handler(request("GET", "/api/users/username/grace", ""), state)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(&response)["id"], "u2");
    }

    #[tokio::test]
    async fn test_search_hides_email() {
        let (state, _) = seeded().await;
        let mut params = HashMap::new();
        params.insert("query".to_string(), "AD".to_string());
        let event = request("GET", "/api/users/search", "").with_query_string_parameters(params);

        let response = function_handler(event, state).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(&response);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert!(body[0].get("email").is_none());
    }

    #[tokio::test]
    async fn test_update_conflict_is_400() {
        let (state, _) = seeded().await;
        let response = function_handler(
            request("PUT", "/api/users/u1", r#"{"username":"grace"}"#),
            state,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(&response)["error"], "Username is already taken");
    }

    #[tokio::test]
    async fn test_counts() {
        let (state, store) = seeded().await;
        store.follow("u2", "u1");

        let response = function_handler(request("GET", "/api/users/u1/counts", ""), state)
            .await
            .unwrap();

        assert_eq!(json(&response), serde_json::json!({"followers": 1, "following": 0}));
    }

    #[tokio::test]
    async fn test_view_and_likes_flow() {
        let (state, _) = seeded().await;

        let viewed = function_handler(
            request("POST", "/api/posts/p1/views", r#"{"viewerId":"u1"}"#),
            state.clone(),
        )
        .await
        .unwrap();
        assert_eq!(viewed.status(), StatusCode::OK);
        assert_eq!(viewed.headers()[OUTCOME_HEADER], "healthy");
        assert_eq!(json(&viewed)["views"], 1);

        let liked = function_handler(
            request("PUT", "/api/posts/p1/insights/likes", r#"{"count":1}"#),
            state.clone(),
        )
        .await
        .unwrap();
        assert_eq!(json(&liked)["engagementRate"], 100.0);

        let fetched = function_handler(request("GET", "/api/posts/p1/insights", ""), state)
            .await
            .unwrap();
        assert_eq!(json(&fetched)["likeCount"], 1);
        assert_eq!(json(&fetched)["uniqueViewers"], 1);
    }

    #[tokio::test]
    async fn test_blank_viewer_is_400() {
        let (state, _) = seeded().await;
        let response = function_handler(
            request("POST", "/api/posts/p1/views", r#"{"viewerId":" "}"#),
            state,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_outage_still_answers_200() {
        let (state, store) = seeded().await;
        store.set_unavailable(true);

        let response = function_handler(request("POST", "/api/posts/p1/insights/sync", ""), state)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[OUTCOME_HEADER], "degraded");
        assert_eq!(json(&response)["postId"], "p1");
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let (state, _) = seeded().await;
        let response = function_handler(
            request("PUT", "/api/posts/p1/insights/comments", r#"{"count":"many"}"#),
            state,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json(&response)["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_options_and_unknown_routes() {
        let (state, _) = seeded().await;

        let preflight = function_handler(request("OPTIONS", "/api/users", ""), state.clone())
            .await
            .unwrap();
        assert_eq!(preflight.status(), StatusCode::OK);
        assert_eq!(preflight.headers()["Access-Control-Allow-Origin"], "*");

        let missing = function_handler(request("DELETE", "/api/users/u1", ""), state)
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(&missing)["error"], "Not found");
    }
}
