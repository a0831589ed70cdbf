use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use super::models::{ErrorResponse, ReconcileRequest};
use super::state::ServerState;
use crate::analysis::{parse_analyze_result, reconcile_document};
use crate::output::{ReconcileOutput, build_output};
use crate::settings;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let font = crate::resolve_overlay_font(&settings).map(|resolved| resolved.metrics);
    let state = Arc::new(ServerState { settings, font });
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reconcile", post(reconcile))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, err: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

async fn reconcile(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ReconcileRequest>,
) -> Result<Json<ReconcileOutput>, ApiError> {
    reconcile_request(state.as_ref(), payload).await.map(Json)
}

pub(crate) async fn reconcile_request(
    state: &ServerState,
    payload: ReconcileRequest,
) -> Result<ReconcileOutput, ApiError> {
    let layout = payload
        .layout
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "layout result is required"))?;
    let read = payload
        .read
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "read result is required"))?;
    let layout = parse_analyze_result(layout)
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, format!("layout: {:#}", err)))?;
    let read = parse_analyze_result(read)
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, format!("read: {:#}", err)))?;

    let settings = &state.settings;
    let pages = reconcile_document(
        &layout,
        &read,
        settings.reconcile,
        settings.service_pdf_dpi,
    )
    .await
    .map_err(|err| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err)))?;
    let fit_config = payload.fit.unwrap_or(false).then_some(&settings.fit);
    build_output(pages, fit_config, state.font.as_ref())
        .map_err(|err| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> ServerState {
        ServerState {
            settings: settings::Settings::default(),
            font: None,
        }
    }

    fn page(content: &str) -> serde_json::Value {
        json!({
            "pages": [{
                "pageNumber": 1,
                "width": 400,
                "height": 300,
                "unit": "pixel",
                "lines": [{"content": content, "polygon": [10, 10, 210, 10, 210, 40, 10, 40]}]
            }]
        })
    }

    #[tokio::test]
    async fn reconciles_and_fits_regions() {
        let payload = ReconcileRequest {
            layout: Some(page("Hand wash")),
            read: Some(page("Hand washing")),
            fit: Some(true),
        };
        let output = reconcile_request(&state(), payload).await.expect("output");
        assert_eq!(output.pages.len(), 1);
        let page = &output.pages[0];
        assert_eq!(page.regions[0].display_text, "Hand washing");
        let fits = page.fits.as_ref().expect("fits");
        assert_eq!(fits.len(), 1);
        assert!(!fits[0].lines.is_empty());

        let value = serde_json::to_value(&output).expect("serialize");
        assert_eq!(value["pages"][0]["regions"][0]["source"]["kind"], "cluster");
    }

    #[tokio::test]
    async fn missing_read_result_is_bad_request() {
        let payload = ReconcileRequest {
            layout: Some(page("x")),
            ..ReconcileRequest::default()
        };
        let (status, Json(body)) = reconcile_request(&state(), payload).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("read result is required"));
    }

    #[tokio::test]
    async fn inverted_font_range_surfaces_as_server_error() {
        let mut state = state();
        state.settings.fit.min_font_size = 50;
        state.settings.fit.max_font_size = 10;
        let payload = ReconcileRequest {
            layout: Some(page("x")),
            read: Some(page("x")),
            fit: Some(true),
        };
        let (status, _) = reconcile_request(&state, payload).await.unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
