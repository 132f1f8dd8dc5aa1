use arc_swap::ArcSwap;
use axum::{
    extract::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

use crate::catalog::{Catalog, CatalogSource};
use crate::config::Config;
use crate::prefetch::Prefetcher;
use crate::util::ImageResizer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog_source: Arc<dyn CatalogSource>,
    pub catalog: Arc<ArcSwap<Catalog>>,
    pub image_resizer: Arc<ImageResizer>,
    pub prefetcher: Arc<Prefetcher>,
}

impl AppState {
    pub fn new(
        config: Config,
        catalog_source: Arc<dyn CatalogSource>,
        image_resizer: Arc<ImageResizer>,
    ) -> Self {
        let prefetcher = Arc::new(Prefetcher::new(
            Arc::clone(&image_resizer),
            config.display.poster_width,
            config.display.poster_quality,
        ));
        Self {
            config: Arc::new(config),
            catalog_source,
            catalog: Arc::new(ArcSwap::from_pointee(Catalog::empty())),
            image_resizer,
            prefetcher,
        }
    }

    /// Fetch the catalog, make it the one shuffles are checked against and
    /// start warming its posters.
    pub async fn load_catalog(&self) -> Arc<Catalog> {
        let items = self.catalog_source.list_items().await;
        let catalog = Arc::new(Catalog::new(items));
        info!("Loaded catalog with {} items at {}", catalog.len(), catalog.fetched_at);
        self.catalog.store(Arc::clone(&catalog));
        if self.config.display.preload_posters {
            self.prefetcher.spawn(Arc::clone(&catalog));
        }
        catalog
    }

    pub fn current_catalog(&self) -> Arc<Catalog> {
        self.catalog.load_full()
    }
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/movies", get(crate::shell::list_movies))
        .route("/api/session", get(crate::shell::start_session))
        .route("/api/shuffle", post(crate::shell::shuffle_session))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let image_routes = Router::new()
        .route("/image", get(crate::shell::serve_image))
        .layer(axum::middleware::from_fn(crate::middleware::etag_validation));

    let mut router = Router::new()
        .route("/", get(crate::shell::index))
        .route("/shuffle", get(crate::shell::shuffle))
        .route("/robots.txt", get(robots_txt_handler))
        .merge(api_routes)
        .merge(image_routes)
        .fallback(fallback_handler);

    if let Some(ref assets_dir) = state.config.display.assets_dir {
        router = router.nest_service("/assets", ServeDir::new(assets_dir));
    }

    let app = router
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Path rewriting has to happen before routing, so it wraps the whole app.
    Router::new()
        .fallback_service(app)
        .layer(axum::middleware::from_fn(crate::middleware::normalize_path))
}

async fn robots_txt_handler() -> &'static str {
    "User-agent: *\nAllow: /\n"
}

async fn fallback_handler(req: Request<axum::body::Body>) -> impl IntoResponse {
    if req.method() == axum::http::Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::item::test_item;
    use crate::catalog::{Item, StaticCatalog};
    use crate::sampler::SamplerState;
    use crate::shell::SessionView;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn app(items: Vec<Item>) -> (Router, AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let resizer = Arc::new(ImageResizer::new(dir.path().join("images")).unwrap());
        let mut config = Config::from_yaml("{}").unwrap();
        // Test posters point nowhere; skip the prefetch.
        config.display.preload_posters = false;
        let state = AppState::new(config, Arc::new(StaticCatalog::new(items)), resizer);
        (build_router(state.clone()), state, dir)
    }

    fn three() -> Vec<Item> {
        vec![test_item(1, "Alpha"), test_item(2, "Bravo"), test_item(3, "Charlie")]
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_string(response).await)
    }

    async fn post_shuffle(router: &Router, state: &SamplerState) -> SessionView {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/shuffle")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(state).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_a_movie() {
        let (router, state, _dir) = app(three());
        let (status, html) = get(&router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(["Alpha", "Bravo", "Charlie"]
            .iter()
            .any(|t| html.contains(&format!("<h2>{}</h2>", t))));
        assert_eq!(state.current_catalog().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_catalog_page() {
        let (router, _state, _dir) = app(vec![]);
        let (_, html) = get(&router, "/").await;
        assert!(html.contains("No movies found"));
        let (_, html) = get(&router, "/shuffle?size=0&unseen=").await;
        assert!(html.contains("No movies found"));
    }

    #[tokio::test]
    async fn test_shuffle_form_moves_on() {
        let (router, _state, _dir) = app(three());
        get(&router, "/").await;
        let (status, html) = get(&router, "/shuffle?size=3&current=1&unseen=0,2").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!html.contains("<h2>Bravo</h2>"));
        assert!(html.contains("name=\"unseen\" value=\"0\"") || html.contains("name=\"unseen\" value=\"2\""));
    }

    #[tokio::test]
    async fn test_mangled_shuffle_starts_over() {
        let (router, _state, _dir) = app(three());
        let (status, html) = get(&router, "/shuffle?size=banana").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("name=\"size\" value=\"3\""));
    }

    #[tokio::test]
    async fn test_stale_shuffle_starts_over() {
        let (router, _state, _dir) = app(three());
        get(&router, "/").await;
        let (status, html) = get(&router, "/shuffle?size=5&current=4&unseen=0,1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("name=\"size\" value=\"3\""));
        assert!(!html.contains("name=\"current\" value=\"4\""));
    }

    #[tokio::test]
    async fn test_api_session_cycle() {
        let (router, _state, _dir) = app(three());
        let (_, body) = get(&router, "/api/session").await;
        let view: SessionView = serde_json::from_str(&body).unwrap();
        let mut seen = vec![view.movie.unwrap().id];
        let mut current = view.state;
        for _ in 0..2 {
            let next = post_shuffle(&router, &current).await;
            let id = next.movie.unwrap().id;
            assert!(!seen.contains(&id));
            seen.push(id);
            current = next.state;
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3]);

        let after = post_shuffle(&router, &current).await;
        assert_ne!(after.state.current, current.current);
    }

    #[tokio::test]
    async fn test_api_movies_is_repeatable() {
        let (router, _state, _dir) = app(three());
        let (_, first) = get(&router, "/api/movies").await;
        let (_, second) = get(&router, "/api/movies").await;
        assert_eq!(first, second);
        let items: Vec<Item> = serde_json::from_str(&first).unwrap();
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_image_only_serves_catalog_posters() {
        let poster = crate::util::serve_once(b"poster".to_vec(), None).await;
        let (router, _state, dir) = app(vec![Item {
            poster_url: poster.clone(),
            ..test_item(1, "Alpha")
        }]);
        get(&router, "/").await;

        // Hosts outside the catalog are never contacted.
        let (status, _) = get(
            &router,
            "/image?url=http%3A%2F%2F127.0.0.1%3A1%2Fadmin%2Fsecret&w=640&q=75",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&router, "/image?url=file%3A%2F%2F%2Fetc%2Fpasswd&w=640").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&router, "/image").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Only the configured size; anything else would be a new cache file.
        let encoded = urlencoding::encode(&poster).into_owned();
        for query in ["&w=641&q=75", "&w=640&q=74", "&w=640&h=10"] {
            let (status, _) = get(&router, &format!("/image?url={}{}", encoded, query)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", query);
        }
        assert_eq!(std::fs::read_dir(dir.path().join("images")).unwrap().count(), 0);

        let (status, body) = get(&router, &format!("/image?url={}&w=640&q=75", encoded)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "poster");
        assert_eq!(std::fs::read_dir(dir.path().join("images")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (router, _state, _dir) = app(vec![]);
        let (status, _) = get(&router, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&router, "//robots.txt").await;
        assert_eq!(status, StatusCode::OK);
    }
}
