use std::sync::LazyLock;

use axum::Json;
use axum::extract::{Path, Query, State};
use regex::Regex;
use serde::Deserialize;

use agora_types::api::{TableListResponse, TableRowsResponse, TableSummary, UserListResponse};

use crate::blocking;
use crate::dto::to_user_dtos;
use crate::error::ApiError;
use crate::posts::{PageQuery, total_pages};
use crate::session::AdminSession;
use crate::state::AppState;

/// Tables the browser is allowed to dump. `dump_table` interpolates the
/// name into SQL, so everything must pass through this list first.
const BROWSABLE_TABLES: &[&str] = &[
    "users",
    "verification_tokens",
    "posts",
    "comments",
    "chats",
    "chat_participants",
    "chat_messages",
    "assistant_chats",
    "assistant_messages",
    "files",
];

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier regex"));

const DEFAULT_ROW_LIMIT: u64 = 100;
const MAX_ROW_LIMIT: u64 = 1000;

fn browsable(table: &str) -> bool {
    IDENTIFIER_RE.is_match(table) && BROWSABLE_TABLES.contains(&table)
}

#[derive(Debug, Deserialize)]
pub struct RowsQuery {
    pub limit: Option<u64>,
}

/// GET /admin/tables — every application table with its row count.
pub async fn list_tables(
    State(state): State<AppState>,
    _session: AdminSession,
) -> Result<Json<TableListResponse>, ApiError> {
    let tables = blocking(move || state.db.list_tables().map_err(ApiError::from)).await?;

    Ok(Json(TableListResponse {
        tables: tables
            .into_iter()
            .map(|(name, count)| TableSummary { name, count })
            .collect(),
    }))
}

/// GET /admin/tables/{name} — raw rows of one table, newest-first as the
/// storage layer returns them.
pub async fn table_rows(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(table): Path<String>,
    Query(query): Query<RowsQuery>,
) -> Result<Json<TableRowsResponse>, ApiError> {
    if !browsable(&table) {
        return Err(ApiError::NotFound("unknown table".into()));
    }

    let limit = query.limit.unwrap_or(DEFAULT_ROW_LIMIT).min(MAX_ROW_LIMIT);
    let records =
        blocking(move || state.db.dump_table(&table, limit).map_err(ApiError::from)).await?;

    Ok(Json(TableRowsResponse { records }))
}

/// GET /admin/users — the user directory with admin-relevant fields.
pub async fn list_users(
    State(state): State<AppState>,
    _session: AdminSession,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let (limit, offset, _) = query.window();

    let response = blocking(move || {
        let users = state.db.list_users(limit, offset).map_err(ApiError::from)?;
        let count = state.db.count_users().map_err(ApiError::from)?;
        Ok(UserListResponse {
            users: to_user_dtos(users),
            total_pages: total_pages(count, limit),
        })
    })
    .await?;

    Ok(Json(response))
}
