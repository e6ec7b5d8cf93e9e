// ============================================================================
// Contract Routes
// ============================================================================
//
// Endpoints:
// - GET    /api/contracts/search
// - GET    /api/contracts/search/contratos
// - GET    /api/contracts/search/contratacoes
// - GET    /api/contracts/details/:contractId
// - POST   /api/contracts/comment/:contractId
// - GET    /api/contracts/comments/:contractId
// - DELETE /api/contracts/comment/:commentId
// - GET    /api/contracts/debug
//
// ============================================================================

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::AppContext;
use crate::db;
use crate::error::AppError;
use crate::metrics::{CONTRACT_CACHE_HITS_TOTAL, CONTRACT_CACHE_MISSES_TOTAL, SEARCHES_TOTAL};
use crate::pncp::{SearchFilters, UpdatePage, filter_by_keyword};
use crate::routes::extractors::AuthenticatedUser;

/// GET /api/contracts/search
/// Unified search kept for older clients; serves the contract feed.
pub async fn search(
    state: State<Arc<AppContext>>,
    filters: Query<SearchFilters>,
) -> Result<impl IntoResponse, AppError> {
    search_contratos(state, filters).await
}

/// GET /api/contracts/search/contratos
pub async fn search_contratos(
    State(ctx): State<Arc<AppContext>>,
    Query(filters): Query<SearchFilters>,
) -> Result<impl IntoResponse, AppError> {
    SEARCHES_TOTAL.inc();

    let mut page = ctx.pncp.contract_updates(&filters).await?;
    filter_by_keyword(&mut page, filters.keyword.as_deref());

    tracing::debug!(results = page.data.len(), "Contract search served");

    feed_envelope("contratos", &page)
}

/// GET /api/contracts/search/contratacoes
pub async fn search_contratacoes(
    State(ctx): State<Arc<AppContext>>,
    Query(filters): Query<SearchFilters>,
) -> Result<impl IntoResponse, AppError> {
    SEARCHES_TOTAL.inc();

    let mut page = ctx.pncp.procurement_updates(&filters).await?;
    filter_by_keyword(&mut page, filters.keyword.as_deref());

    tracing::debug!(results = page.data.len(), "Procurement search served");

    feed_envelope("contratacoes", &page)
}

/// Wraps a feed page in the response envelope: `success` and `type` are
/// added next to the page's own fields, the way clients already consume it.
fn feed_envelope<T: Serialize>(
    feed_type: &str,
    page: &UpdatePage<T>,
) -> Result<Json<Value>, AppError> {
    let mut body = match serde_json::to_value(page) {
        Ok(Value::Object(map)) => map,
        _ => return Err(AppError::internal("Failed to render search results")),
    };
    body.insert("success".to_string(), Value::Bool(true));
    body.insert("type".to_string(), Value::String(feed_type.to_string()));

    Ok(Json(Value::Object(body)))
}

/// GET /api/contracts/details/:contractId
///
/// Looks in the local cache first; on a miss the record is fetched from the
/// registry, mapped and cached before answering.
pub async fn details(
    State(ctx): State<Arc<AppContext>>,
    Path(contract_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(contract) = db::get_contract_by_pncp_id(&ctx.db_pool, &contract_id).await? {
        CONTRACT_CACHE_HITS_TOTAL.inc();
        tracing::debug!(pncp_id = %contract_id, "Contract details served from cache");
        return Ok(Json(json!({"success": true, "contract": contract})));
    }

    CONTRACT_CACHE_MISSES_TOTAL.inc();

    let detail = ctx.pncp.contract_detail(&contract_id).await?;
    let contract = db::insert_contract(&ctx.db_pool, &detail.into_cache_record(&contract_id)).await?;

    tracing::info!(pncp_id = %contract_id, "Contract details fetched and cached");

    Ok(Json(json!({"success": true, "contract": contract})))
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    #[serde(default)]
    pub text: String,
}

/// POST /api/contracts/comment/:contractId
/// Answers with the full comment list so clients can re-render in place.
pub async fn add_comment(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(contract_id): Path<String>,
    Json(payload): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(AppError::validation("Comment text is required"));
    }

    let contract = db::get_contract_by_pncp_id(&ctx.db_pool, &contract_id)
        .await?
        .ok_or_else(|| AppError::not_found("Contract not found"))?;

    db::add_comment(&ctx.db_pool, &contract.id, &user_id, text).await?;
    let comments = db::list_comments(&ctx.db_pool, &contract.id).await?;

    Ok(Json(json!({"success": true, "comments": comments})))
}

/// GET /api/contracts/comments/:contractId
pub async fn get_comments(
    State(ctx): State<Arc<AppContext>>,
    Path(contract_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let contract = db::get_contract_by_pncp_id(&ctx.db_pool, &contract_id)
        .await?
        .ok_or_else(|| AppError::not_found("Contract not found"))?;

    let comments = db::list_comments(&ctx.db_pool, &contract.id).await?;

    Ok(Json(json!({"success": true, "comments": comments})))
}

/// DELETE /api/contracts/comment/:commentId
///
/// Only the author can delete a comment. A missing comment and someone
/// else's comment are indistinguishable in the response.
pub async fn delete_comment(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_yours = || {
        AppError::not_found("Comment not found or you do not have permission to delete it")
    };

    let comment_id = Uuid::parse_str(&comment_id).map_err(|_| not_yours())?;

    let deleted = db::delete_comment(&ctx.db_pool, &comment_id, &user_id).await?;
    if !deleted {
        return Err(not_yours());
    }

    Ok(Json(json!({"success": true, "message": "Comment deleted"})))
}

#[derive(Debug, Deserialize)]
pub struct DebugQuery {
    pub endpoint: Option<String>,
    pub params: Option<String>,
}

/// GET /api/contracts/debug
///
/// Raw passthrough to an arbitrary registry endpoint, for poking at the
/// upstream API during development. `params` is a JSON object passed as the
/// query string.
pub async fn debug(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<DebugQuery>,
) -> Result<impl IntoResponse, AppError> {
    let endpoint = query
        .endpoint
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation("No endpoint specified"))?;

    // Registry paths are rooted
    let endpoint = if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    };

    let params = match query.params.as_deref() {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(AppError::validation("params must be a JSON object")),
            Err(e) => {
                return Err(AppError::validation(format!("Failed to parse params JSON: {e}")));
            }
        },
        None => Map::new(),
    };

    let data = ctx.pncp.raw_query(&endpoint, &params).await?;

    Ok(Json(json!({"success": true, "data": data})))
}
