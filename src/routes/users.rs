// ============================================================================
// User Account Routes
// ============================================================================
//
// Endpoints:
// - POST   /api/users/register
// - POST   /api/users/login
// - GET    /api/users/profile
// - PUT    /api/users/profile
// - GET    /api/users/saved-contracts
// - POST   /api/users/save-contract/:contractId
// - DELETE /api/users/save-contract/:contractId
//
// ============================================================================

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::db;
use crate::error::AppError;
use crate::routes::extractors::AuthenticatedUser;
use crate::utils::{extract_client_ip, log_safe_id, validate_email, validate_name, validate_password};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// POST /api/users/register
pub async fn register(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.trim();
    let name = payload.name.trim();

    validate_email(email).map_err(AppError::Validation)?;
    validate_password(&payload.password).map_err(AppError::Validation)?;
    validate_name(name).map_err(AppError::Validation)?;

    if db::get_user_by_email(&ctx.db_pool, email).await?.is_some() {
        return Err(AppError::validation("Email is already in use"));
    }

    let user = db::create_user(&ctx.db_pool, email, &payload.password, name).await?;
    let (token, _exp) = ctx.auth_manager.create_token(&user.id)?;

    tracing::info!(
        user_hash = %log_safe_id(&user.id.to_string(), &ctx.config.logging.hash_salt),
        ip = %extract_client_ip(&headers),
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": token,
            "user": {
                "id": user.id,
                "name": user.name,
                "email": user.email,
            }
        })),
    ))
}

/// POST /api/users/login
///
/// Unknown email and wrong password produce the same 401 so the endpoint
/// cannot be used to enumerate accounts.
pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.trim();
    let client_ip = extract_client_ip(&headers);

    let user = match db::get_user_by_email(&ctx.db_pool, email).await? {
        Some(user) => user,
        None => {
            tracing::warn!(ip = %client_ip, "Login attempt for unknown email");
            return Err(AppError::auth("Invalid email or password"));
        }
    };

    if !db::verify_password(&user, &payload.password).await? {
        tracing::warn!(
            user_hash = %log_safe_id(&user.id.to_string(), &ctx.config.logging.hash_salt),
            ip = %client_ip,
            "Login attempt with wrong password"
        );
        return Err(AppError::auth("Invalid email or password"));
    }

    let (token, _exp) = ctx.auth_manager.create_token(&user.id)?;

    tracing::info!(
        user_hash = %log_safe_id(&user.id.to_string(), &ctx.config.logging.hash_salt),
        ip = %client_ip,
        "User logged in"
    );

    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
        }
    })))
}

/// GET /api/users/profile
pub async fn get_profile(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let user = db::get_user_by_id(&ctx.db_pool, &user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let saved = db::saved_contract_ids(&ctx.db_pool, &user_id).await?;

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "savedContracts": saved,
            "createdAt": user.created_at,
            "updatedAt": user.updated_at,
        }
    })))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Blank strings are treated as "not provided", matching the optional
    // semantics of the endpoint
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(name) = name {
        validate_name(name).map_err(AppError::Validation)?;
    }
    if let Some(email) = email {
        validate_email(email).map_err(AppError::Validation)?;
    }

    let user = db::update_user_profile(&ctx.db_pool, &user_id, name, email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    tracing::info!(
        user_hash = %log_safe_id(&user.id.to_string(), &ctx.config.logging.hash_salt),
        "Profile updated"
    );

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
        }
    })))
}

/// GET /api/users/saved-contracts
pub async fn get_saved_contracts(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let contracts = db::list_saved_contracts(&ctx.db_pool, &user_id).await?;

    Ok(Json(json!({
        "success": true,
        "contracts": contracts,
    })))
}

/// POST /api/users/save-contract/:contractId
///
/// The contract must already be in the local cache (a detail view caches
/// it); saving twice is a no-op.
pub async fn save_contract(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(contract_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let contract = db::get_contract_by_pncp_id(&ctx.db_pool, &contract_id)
        .await?
        .ok_or_else(|| AppError::not_found("Contract not found"))?;

    db::save_contract(&ctx.db_pool, &user_id, &contract.id).await?;

    tracing::debug!(
        user_hash = %log_safe_id(&user_id.to_string(), &ctx.config.logging.hash_salt),
        pncp_id = %contract.pncp_id,
        "Contract saved"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Contract saved",
    })))
}

/// DELETE /api/users/save-contract/:contractId
///
/// Idempotent: unsaving a contract that is unknown or was never saved
/// still answers 200.
pub async fn remove_saved_contract(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(contract_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(contract) = db::get_contract_by_pncp_id(&ctx.db_pool, &contract_id).await? {
        db::unsave_contract(&ctx.db_pool, &user_id, &contract.id).await?;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Contract removed",
    })))
}
