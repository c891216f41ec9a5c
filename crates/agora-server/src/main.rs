use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use agora_api::state::AppStateInner;
use agora_api::{admin, assistant, auth, chats, files, posts, users};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    // Config + database
    let config = agora_api::config::Config::from_env()?;
    let db = agora_db::Database::open(&PathBuf::from(&config.database_path))?;

    // Bootstrap admin account, if configured
    auth::ensure_admin(&db, &config)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppStateInner::new(db, config);

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", get(auth::verify_email));

    let protected_routes = Router::new()
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/mine", get(posts::list_my_posts))
        .route(
            "/posts/{post_id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/comments", post(posts::create_comment))
        .route("/comments/{comment_id}", delete(posts::delete_comment))
        .route("/chats", get(chats::list_chats).post(chats::create_chat))
        .route("/chats/{chat_id}", get(chats::get_chat))
        .route("/chats/{chat_id}/messages", post(chats::send_message))
        .route("/chats/{chat_id}/participants", post(chats::add_participant))
        .route(
            "/chats/{chat_id}/participants/me",
            delete(chats::leave_chat),
        )
        .route("/assistant/chat", post(assistant::assistant_chat))
        .route("/assistant/chats", get(assistant::list_assistant_chats))
        .route(
            "/assistant/chats/{chat_id}",
            get(assistant::get_assistant_chat),
        )
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::get_me).put(users::update_me))
        .route("/users/{user_id}", get(users::get_user))
        .route("/files", post(files::upload_file))
        .route(
            "/files/{file_id}",
            get(files::download_file).delete(files::delete_file),
        )
        .route("/files/{file_id}/meta", get(files::file_metadata));

    let admin_routes = Router::new()
        .route("/admin/tables", get(admin::list_tables))
        .route("/admin/tables/{table}", get(admin::table_rows))
        .route("/admin/users", get(admin::list_users));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Agora server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
