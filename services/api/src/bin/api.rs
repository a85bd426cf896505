//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{PgStore, SheetCatalog},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        comments::{
            begin_edit_handler, cancel_edit_handler, delete_comment_handler,
            list_comments_handler, post_comment_handler, save_comment_handler,
        },
        optional_auth, require_auth,
        rest::ApiDoc,
        state::{AppState, CatalogCache, SessionRegistry},
        add_favorite_handler, get_book_handler, list_books_handler, list_favorites_handler,
        list_levels_handler, random_book_handler, remove_favorite_handler, set_role_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Catalog Source & Cache ---
    let sheet = Arc::new(SheetCatalog::new(config.sheet_url.clone()));
    let catalog = Arc::new(CatalogCache::new(sheet, config.sheet_ttl));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        accounts: store.clone(),
        comments: store,
        config: config.clone(),
        catalog,
        sessions: Arc::new(SessionRegistry::default()),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {e}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required; comment reads see a guest viewer)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/books", get(list_books_handler))
        .route("/books/random", get(random_book_handler))
        .route("/books/levels", get(list_levels_handler))
        .route("/books/{title}", get(get_book_handler));

    let read_routes = Router::new()
        .route("/books/{title}/comments", get(list_comments_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required; permission predicates re-checked per mutation)
    let protected_routes = Router::new()
        .route("/books/{title}/comments", post(post_comment_handler))
        .route("/comments/{id}/edit", post(begin_edit_handler))
        .route("/comments/{id}/cancel", post(cancel_edit_handler))
        .route(
            "/comments/{id}",
            put(save_comment_handler).delete(delete_comment_handler),
        )
        .route("/favorites", get(list_favorites_handler))
        .route(
            "/favorites/{title}",
            put(add_favorite_handler).delete(remove_favorite_handler),
        )
        .route("/accounts/{email}/role", put(set_role_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(read_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
