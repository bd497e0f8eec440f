pub mod auth;
pub mod books;
pub mod integrations;
pub mod library;
pub mod middleware;
pub mod reading;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{openapi::server::Server, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::web::rest::ApiDoc;
use crate::web::state::AppState;

pub use middleware::require_auth;

/// Private uploads are capped at 20 MiB by the catalog; leave room for the other form fields.
const BODY_LIMIT_BYTES: usize = 25 * 1024 * 1024;

/// Builds the complete application: the API under the configured prefix, health routes,
/// and the Swagger UI.
pub fn router(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let origin = state.config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/users/register", post(auth::register_handler))
        .route("/users/login", post(auth::login_handler))
        .route("/users/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/users/me", get(auth::me_handler))
        .route("/books", get(books::list_books_handler))
        .route(
            "/books/public",
            post(books::create_public_book_handler).get(books::list_public_books_handler),
        )
        .route("/books/private", post(books::create_private_book_handler))
        .route(
            "/books/{book_id}",
            get(books::get_book_handler).delete(books::delete_book_handler),
        )
        .route("/books/{book_id}/read", get(books::read_book_handler))
        .route("/users/me/library", get(library::list_library_handler))
        .route("/users/me/library/isbn", post(library::add_by_isbn_handler))
        .route("/users/me/library/public", post(library::add_public_book_handler))
        .route(
            "/users/me/library/{book_id}",
            delete(library::remove_from_library_handler),
        )
        .route(
            "/users/me/library/{book_id}/status",
            put(library::update_status_handler),
        )
        .route("/reading/progress", get(reading::list_progress_handler))
        .route(
            "/reading/progress/{book_id}",
            put(reading::update_progress_handler).get(reading::get_progress_handler),
        )
        .route(
            "/reading/habit",
            get(reading::get_habit_handler).put(reading::update_habit_handler),
        )
        .route("/reading/stats", get(reading::get_stats_handler))
        .route(
            "/integrations/google-books/search",
            get(integrations::search_handler),
        )
        .route(
            "/integrations/google-books/isbn/{isbn}",
            get(integrations::isbn_lookup_handler),
        )
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    let prefix = state.config.api_prefix.trim_end_matches('/');
    if !prefix.is_empty() && !prefix.starts_with('/') {
        return Err(ConfigError::InvalidValue(
            "API_PREFIX".to_string(),
            format!("'{}' must start with '/'", prefix),
        ));
    }
    let mut api_doc = ApiDoc::openapi();
    api_doc.servers = Some(vec![Server::new(if prefix.is_empty() { "/" } else { prefix })]);

    let app = if prefix.is_empty() {
        Router::new().merge(api_router)
    } else {
        Router::new().nest(prefix, api_router)
    };

    Ok(app
        .route("/", get(rest::root_handler))
        .route("/health", get(rest::health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc)))
}
