//! Public page rendering.
//!
//! HTML Endpoints:
//! - `GET /{slug}`        : a published page
//! - `GET {alias_route}`  : the configured alias page (default `/landing`)
//!
//! Rendered HTML is kept in the [`RenderedPageCache`] under the request path
//! until the gateway invalidates it.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use careon_core::blocks::render::{render_blocks, RenderOptions};
use careon_core::config::PagesConfig;
use careon_core::domain::page::Page;
use careon_core::errors::ApplicationError;
use tera::{Context, Tera};
use tracing::{debug, error};

use crate::gateway::PageGateway;
use crate::revalidation::RenderedPageCache;

const CACHE_HEADER: &str = "x-careon-cache";

#[derive(Clone)]
pub struct PublicState {
    gateway: Arc<PageGateway>,
    cache: Arc<RenderedPageCache>,
    templates: Arc<Tera>,
    render_options: RenderOptions,
    alias_route: String,
    alias_slug: String,
}

pub fn init_templates() -> Result<Arc<Tera>, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("page.html", include_str!("../../../templates/pages/page.html")),
        ("not_found.html", include_str!("../../../templates/pages/not_found.html")),
    ])?;
    Ok(Arc::new(tera))
}

pub fn router(
    gateway: Arc<PageGateway>,
    cache: Arc<RenderedPageCache>,
    templates: Arc<Tera>,
    pages: &PagesConfig,
) -> Router {
    let state = PublicState {
        gateway,
        cache,
        templates,
        render_options: RenderOptions { image_proxy: pages.image_proxy.clone() },
        alias_route: pages.alias_route.clone(),
        alias_slug: pages.alias_slug.clone(),
    };

    Router::new()
        .route("/{slug}", get(public_page))
        .route(&pages.alias_route, get(alias_page))
        .with_state(state)
}

async fn public_page(Path(slug): Path<String>, State(state): State<PublicState>) -> Response {
    let path = format!("/{slug}");
    render_path(&state, &path, &slug).await
}

async fn alias_page(State(state): State<PublicState>) -> Response {
    render_path(&state, &state.alias_route, &state.alias_slug).await
}

async fn render_path(state: &PublicState, path: &str, slug: &str) -> Response {
    if let Some(html) = state.cache.get(path).await {
        debug!(event_name = "page.public.cache_hit", path = %path, "serving cached page");
        return (StatusCode::OK, [(CACHE_HEADER, "hit")], Html(html)).into_response();
    }

    let page = match state.gateway.get_page_by_slug(slug).await {
        Ok(page) => page,
        Err(ApplicationError::NotFound(_)) => return not_found(&state.templates, path),
        Err(other) => {
            error!(event_name = "page.public.fetch_failed", path = %path, error = %other, "page fetch failed");
            return server_error();
        }
    };

    match render_page(&state.templates, &page, &state.render_options) {
        Ok(html) => {
            state.cache.insert(path, html.clone()).await;
            (StatusCode::OK, [(CACHE_HEADER, "miss")], Html(html)).into_response()
        }
        Err(error) => {
            error!(event_name = "page.public.render_failed", path = %path, error = %error, "page render failed");
            server_error()
        }
    }
}

pub fn render_page(
    templates: &Tera,
    page: &Page,
    options: &RenderOptions,
) -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("title", &page.title);
    context.insert("slug", &page.slug);
    context.insert("updated_at", &page.updated_at.to_rfc3339());
    context.insert("body", &render_blocks(&page.blocks, false, options));
    templates.render("page.html", &context)
}

fn not_found(templates: &Tera, path: &str) -> Response {
    let mut context = Context::new();
    context.insert("path", path);
    let body = templates
        .render("not_found.html", &context)
        .unwrap_or_else(|_| "<h1>Page not found</h1>".to_string());
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}

fn server_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>A server error occurred.</h1>".to_string()))
        .into_response()
}
