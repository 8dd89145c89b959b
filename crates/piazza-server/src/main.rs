use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use piazza_api::middleware::{require_auth, verify_token};
use piazza_api::state::{AppState, AppStateInner};
use piazza_api::{auth, content, feed, messages};
use piazza_db::Database;
use piazza_gateway::connection;
use piazza_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "piazza=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PIAZZA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PIAZZA_DB_PATH").unwrap_or_else(|_| "piazza.db".into());
    let host = std::env::var("PIAZZA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PIAZZA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        broadcaster: Arc::new(dispatcher.clone()),
    });

    let state = ServerState {
        db,
        dispatcher,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/api/feed", post(feed::generate_feed).get(feed::get_feed))
        .route("/api/suggest-content", post(feed::suggest_content))
        .route("/api/posts", post(content::create_post))
        .route("/api/posts/{id}/like", post(content::like_post))
        .route("/api/posts/{id}/comments", post(content::comment_post))
        .route("/api/products", post(content::create_product))
        .route("/api/products/{id}/like", post(content::like_product))
        .route("/api/products/{id}/comments", post(content::comment_product))
        .route("/api/events", post(content::create_event))
        .route("/api/events/{id}/like", post(content::like_event))
        .route("/api/events/{id}/comments", post(content::comment_event))
        .route("/api/events/{id}/interested", post(content::toggle_interested))
        .route("/api/stories", post(content::create_story))
        .route("/api/messages", post(messages::send_message))
        .route(
            "/api/messages/conversation",
            post(messages::create_conversation),
        )
        .route(
            "/api/messages/conversation/{id}",
            get(messages::get_messages),
        )
        .route(
            "/api/messages/conversations",
            get(messages::get_conversations),
        )
        .route(
            "/api/messages/conversation/{id}/read",
            post(messages::mark_read),
        )
        .route(
            "/api/messages/message/{id}/delete",
            post(messages::delete_message),
        )
        .route(
            "/api/messages/message/{id}/react",
            post(messages::react_to_message),
        )
        .route(
            "/api/messages/message/{id}/pin",
            post(messages::pin_message),
        )
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Piazza server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// The token is checked before the upgrade completes, so an unauthenticated
/// client gets a 401 instead of an open-then-closed socket. The token comes
/// from `?token=` or a standard Authorization header.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(query): Query<GatewayQuery>,
    headers: axum::http::HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = query.token.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    });

    let claims = match token.as_deref().and_then(|t| verify_token(&state.jwt_secret, t).ok()) {
        Some(claims) => claims,
        None => return StatusCode::UNAUTHORIZED.into_response(),
    };

    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.dispatcher,
            state.db,
            claims.sub,
            claims.username,
        )
    })
    .into_response()
}
