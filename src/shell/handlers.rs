use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

use crate::catalog::Item;
use crate::sampler::SamplerState;
use crate::server::AppState;
use crate::util::ImageResizerError;

use super::render::render_page;
use super::session::Session;
use super::types::{ImageParams, SessionView, ShuffleForm};

/// A new visit: load the catalog and pick a first item.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let session = new_session(&state).await;
    Html(render_page(&state.config, &session))
}

pub async fn shuffle(
    State(state): State<AppState>,
    Query(form): Query<ShuffleForm>,
) -> Html<String> {
    let carried = form.to_state();
    if carried.is_none() {
        warn!("Unreadable shuffle state {:?}, starting new session", form);
    }
    let session = advance(&state, carried).await;
    Html(render_page(&state.config, &session))
}

pub async fn list_movies(State(state): State<AppState>) -> Json<Vec<Item>> {
    Json(state.catalog_source.list_items().await)
}

pub async fn start_session(State(state): State<AppState>) -> Json<SessionView> {
    let session = new_session(&state).await;
    Json(session_view(&session))
}

pub async fn shuffle_session(
    State(state): State<AppState>,
    Json(carried): Json<SamplerState>,
) -> Json<SessionView> {
    let session = advance(&state, Some(carried)).await;
    Json(session_view(&session))
}

/// Resized poster of a catalog item. Only posters of the catalog in memory
/// are fetched, and only at the configured width and quality, so the cache
/// holds at most one file per poster.
pub async fn serve_image(
    State(state): State<AppState>,
    Query(params): Query<ImageParams>,
) -> Result<Response, StatusCode> {
    let width = state.config.display.poster_width;
    let quality = state.config.display.poster_quality;
    if params.h.is_some()
        || params.w.is_some_and(|w| w != width)
        || params.q.is_some_and(|q| q != quality)
    {
        warn!(
            "Rejecting image size w={:?} h={:?} q={:?}",
            params.w, params.h, params.q
        );
        return Err(StatusCode::BAD_REQUEST);
    }
    let catalog = state.current_catalog();
    if !catalog.items.iter().any(|item| item.poster_url == params.url) {
        warn!("Rejecting image not in catalog: {}", params.url);
        return Err(StatusCode::NOT_FOUND);
    }

    let path = state
        .image_resizer
        .resize_url(&params.url, Some(width), None, Some(quality))
        .await
        .map_err(|e| match e {
            ImageResizerError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ImageResizerError::Http(_)
            | ImageResizerError::Status(_)
            | ImageResizerError::TooLarge(_) => {
                error!("Failed to fetch image {}: {}", params.url, e);
                StatusCode::BAD_GATEWAY
            }
            _ => {
                error!("Failed to serve image {}: {}", params.url, e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();
    let etag = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| format!("\"{}\"", s))
        .unwrap_or_default();

    let file = File::open(&path)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
            (header::ETAG, etag),
        ],
        body,
    )
        .into_response())
}

async fn new_session(state: &AppState) -> Session {
    let catalog = state.load_catalog().await;
    Session::start(catalog, &mut rand::rng())
}

/// Pick the next item for a returning visit. State that does not fit the
/// catalog in memory (unparseable, tampered, or from before a reload)
/// starts a new visit instead.
async fn advance(state: &AppState, carried: Option<SamplerState>) -> Session {
    let resumed = carried.and_then(|carried| {
        Session::resume(state.current_catalog(), carried)
            .map_err(|e| warn!("Stale shuffle state, starting new session: {}", e))
            .ok()
    });
    match resumed {
        Some(session) => session.shuffle(&mut rand::rng()),
        None => new_session(state).await,
    }
}

fn session_view(session: &Session) -> SessionView {
    SessionView {
        state: session.state.clone(),
        movie: session.current_item().cloned(),
    }
}
