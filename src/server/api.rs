use crate::agent::Assistant;
use crate::config::TlsPaths;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::get,
    Router,
    extract::State,
    response::{ Html, IntoResponse },
    http::StatusCode,
};
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const INDEX_TEMPLATE: &str = include_str!("../../assets/index.html");

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    quotes: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub page: Arc<String>,
}

/// Renders the chat page with the WebSocket endpoint baked in as a JS string.
pub fn render_index(ws_url: &str) -> String {
    let literal = serde_json::to_string(ws_url).unwrap_or_else(|_| "\"\"".to_string());
    INDEX_TEMPLATE.replace("\"{{WS_URL}}\"", &literal)
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(health_handler))
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    state: AppState,
    tls: Option<TlsPaths>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router(state);

    if let Some(paths) = tls {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            &paths.cert_path,
            &paths.key_path
        ).await?;

        tokio::spawn(async move {
            let result = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });

        info!("Chat page available at https://{}", addr);
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
            format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
        )?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP server error: {}", e);
            }
        });

        info!("Chat page available at http://{}", addr);
    }

    Ok(())
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(state.page.as_ref().clone())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok",
        quotes: state.assistant.prompts().quotes.len(),
    })
}

async fn reload_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (code, body) = match state.assistant.reload_prompts_if_changed() {
        Ok(true) =>
            (StatusCode::OK, ReloadResponse { success: true, message: "Prompts reloaded".into() }),
        Ok(false) =>
            (StatusCode::OK, ReloadResponse { success: true, message: "Prompts unchanged".into() }),
        Err(e) => {
            error!("Prompt reload failed: {}", e);
            (
                StatusCode::BAD_REQUEST,
                ReloadResponse { success: false, message: format!("Reload error: {}", e) },
            )
        }
    };
    (code, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::PromptConfig;
    use crate::llm::LlmConfig;
    use crate::llm::chat::new_client;
    use axum::body::{ to_bytes, Body };
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(prompts_path: Option<String>) -> AppState {
        let client = new_client(&LlmConfig {
            api_key: "k".into(),
            base_url: "http://127.0.0.1:9".into(),
            chat_model: "m".into(),
            vision_model: "v".into(),
        }).unwrap();
        let assistant = Assistant::new(client, Arc::new(PromptConfig::default()), prompts_path);
        AppState {
            assistant: Arc::new(assistant),
            page: Arc::new(render_index("ws://localhost:4000")),
        }
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn page_embeds_websocket_url() {
        let page = render_index("wss://chat.example.com:4000");
        assert!(page.contains("const WS_URL = \"wss://chat.example.com:4000\";"));
        assert!(!page.contains("{{WS_URL}}"));
    }

    #[tokio::test]
    async fn serves_index_page() {
        let (status, body) = get_body(router(state(None)), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Stitchy"));
        assert!(body.contains("ws://localhost:4000"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_body(router(state(None)), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok","quotes":3}"#);
    }

    #[tokio::test]
    async fn reload_without_prompt_file_is_unchanged() {
        let (status, body) = get_body(router(state(None)), "/api/reload-prompts").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Prompts unchanged"));
    }

    #[tokio::test]
    async fn reload_with_missing_file_is_bad_request() {
        let missing = std::env::temp_dir().join("stitchy-does-not-exist.json");
        let app = router(state(Some(missing.display().to_string())));
        let (status, body) = get_body(app, "/api/reload-prompts").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Reload error"));
    }
}
