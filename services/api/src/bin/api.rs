//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        cache::PageCache, db::DbAdapter, files::DiskFileStore, gif::GifExporter,
        imagegen::OpenAiImageAdapter, stt::OpenAiSttAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{
            anonymous_handler, change_password_handler, list_sessions_handler, login_handler,
            logout_handler, register_handler, revoke_session_handler, signup_handler,
        },
        canvas::{
            begin_drag_handler, close_canvas_handler, drag_move_handler, end_drag_handler,
            export_gif_handler, generate_image_handler, insert_image_handler,
            insert_text_handler, insert_video_handler, insert_voice_note_handler,
            open_canvas_handler, save_canvas_handler, select_item_handler,
        },
        delete_page_handler, export_page_html_handler, list_pages_handler,
        middleware::require_auth,
        state::AppState,
        ApiDoc,
    },
};
use async_openai::{config::OpenAIConfig, types::images::ImageModel, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, services::ServeDir};
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
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let files = Arc::new(DiskFileStore::new(&config.files_dir)?);
    let cache = Arc::new(PageCache::new(&config.cache_dir)?);

    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let stt_adapter = Arc::new(OpenAiSttAdapter::new(
        openai_client.clone(),
        config.stt_model.clone(),
    ));

    let image_model = match config.image_model.to_lowercase().as_str() {
        "dall-e-2" => ImageModel::DallE2,
        "dall-e-3" => ImageModel::DallE3,
        _ => {
            return Err(ApiError::Internal(format!(
                "Invalid image model specified in config: '{}'",
                config.image_model
            )))
        }
    };
    let image_adapter = Arc::new(OpenAiImageAdapter::new(openai_client.clone(), image_model));

    let gif = GifExporter::new(config.ffmpeg_path.clone());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store: db_adapter.clone(),
        identity: db_adapter,
        files,
        image_adapter,
        stt_adapter,
        cache,
        gif,
        config: config.clone(),
        active: Mutex::new(None),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/anonymous", post(anonymous_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/password", post(change_password_handler))
        .route("/auth/sessions", get(list_sessions_handler))
        .route("/auth/sessions/{id}", delete(revoke_session_handler))
        .route("/pages", get(list_pages_handler))
        .route("/pages/{id}", delete(delete_page_handler))
        .route("/pages/{id}/export/html", get(export_page_html_handler))
        .route("/canvas/open", post(open_canvas_handler))
        .route("/canvas/close", post(close_canvas_handler))
        .route("/canvas/save", post(save_canvas_handler))
        .route("/canvas/select", post(select_item_handler))
        .route("/canvas/drag/begin", post(begin_drag_handler))
        .route("/canvas/drag/move", post(drag_move_handler))
        .route("/canvas/drag/end", post(end_drag_handler))
        .route("/canvas/items/text", post(insert_text_handler))
        .route("/canvas/items/image", post(insert_image_handler))
        .route("/canvas/items/video", post(insert_video_handler))
        .route("/canvas/items/generate", post(generate_image_handler))
        .route("/canvas/items/voice", post(insert_voice_note_handler))
        .route("/canvas/items/{id}/gif", post(export_gif_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes. Recorded clips arrive inline, so the body limit is
    // generous.
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the stored-media directory and the Swagger UI
    // router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .nest_service("/files", ServeDir::new(&config.files_dir))
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
