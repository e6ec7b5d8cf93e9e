use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

pub type DbPool = Pool<Postgres>;

pub async fn create_pool(config: &Config) -> AppResult<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .acquire_timeout(Duration::from_secs(config.db.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.db.idle_timeout_secs))
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn create_user(pool: &DbPool, email: &str, password: &str, name: &str) -> AppResult<User> {
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, name)
        VALUES ($1, $2, $3)
        RETURNING id, email, password_hash, name, created_at, updated_at
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        // Backstop for two registrations racing past the existence check
        if is_unique_violation(&e) {
            AppError::validation("Email is already in use")
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(user)
}

pub async fn get_user_by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, created_at, updated_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn get_user_by_id(pool: &DbPool, user_id: &Uuid) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    Ok(bcrypt::verify(password, &user.password_hash)?)
}

/// Updates name and/or email; absent fields keep their current value.
/// Returns None if the user row no longer exists.
pub async fn update_user_profile(
    pool: &DbPool,
    user_id: &Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, email, password_hash, name, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::validation("Email is already in use")
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(user)
}

// ============================================================================
// Contracts (local cache of registry records)
// ============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub pncp_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub organization: Option<String>,
    pub status: Option<String>,
    pub region: Option<String>,
    pub modality: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub opening_date: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cache record fields mapped from the registry's detail payload.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub pncp_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub organization: Option<String>,
    pub status: Option<String>,
    pub region: Option<String>,
    pub modality: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub opening_date: Option<DateTime<Utc>>,
    pub value: Option<f64>,
}

pub async fn get_contract_by_pncp_id(pool: &DbPool, pncp_id: &str) -> AppResult<Option<Contract>> {
    let contract = sqlx::query_as::<_, Contract>(
        r#"
        SELECT id, pncp_id, title, description, organization, status, region,
               modality, publication_date, opening_date, value, created_at, updated_at
        FROM contracts
        WHERE pncp_id = $1
        "#,
    )
    .bind(pncp_id)
    .fetch_optional(pool)
    .await?;

    Ok(contract)
}

/// Inserts a cache record. When two detail requests race, the first insert
/// wins and the second gets the existing row back.
pub async fn insert_contract(pool: &DbPool, new: &NewContract) -> AppResult<Contract> {
    let contract = sqlx::query_as::<_, Contract>(
        r#"
        INSERT INTO contracts
            (pncp_id, title, description, organization, status, region,
             modality, publication_date, opening_date, value)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (pncp_id) DO UPDATE SET updated_at = NOW()
        RETURNING id, pncp_id, title, description, organization, status, region,
                  modality, publication_date, opening_date, value, created_at, updated_at
        "#,
    )
    .bind(&new.pncp_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.organization)
    .bind(&new.status)
    .bind(&new.region)
    .bind(&new.modality)
    .bind(new.publication_date)
    .bind(new.opening_date)
    .bind(new.value)
    .fetch_one(pool)
    .await?;

    Ok(contract)
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Author display name (joined from users)
    pub user_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

pub async fn add_comment(
    pool: &DbPool,
    contract_id: &Uuid,
    user_id: &Uuid,
    text: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO contract_comments (contract_id, user_id, body)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(contract_id)
    .bind(user_id)
    .bind(text)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_comments(pool: &DbPool, contract_id: &Uuid) -> AppResult<Vec<Comment>> {
    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT c.id, c.user_id, u.name AS user_name, c.body AS text, c.created_at
        FROM contract_comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.contract_id = $1
        ORDER BY c.created_at ASC
        "#,
    )
    .bind(contract_id)
    .fetch_all(pool)
    .await?;

    Ok(comments)
}

/// Deletes a comment only when it belongs to the given user.
/// Returns false when the comment is missing or owned by someone else.
pub async fn delete_comment(pool: &DbPool, comment_id: &Uuid, user_id: &Uuid) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM contract_comments
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(comment_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Saved contracts / watchers
// ============================================================================
//
// One join table backs both directions: the rows for a user are their saved
// list, the rows for a contract are its watchers.

pub async fn save_contract(pool: &DbPool, user_id: &Uuid, contract_id: &Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO saved_contracts (user_id, contract_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, contract_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(contract_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn unsave_contract(pool: &DbPool, user_id: &Uuid, contract_id: &Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        DELETE FROM saved_contracts
        WHERE user_id = $1 AND contract_id = $2
        "#,
    )
    .bind(user_id)
    .bind(contract_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_saved_contracts(pool: &DbPool, user_id: &Uuid) -> AppResult<Vec<Contract>> {
    let contracts = sqlx::query_as::<_, Contract>(
        r#"
        SELECT ct.id, ct.pncp_id, ct.title, ct.description, ct.organization, ct.status,
               ct.region, ct.modality, ct.publication_date, ct.opening_date, ct.value,
               ct.created_at, ct.updated_at
        FROM contracts ct
        JOIN saved_contracts sc ON sc.contract_id = ct.id
        WHERE sc.user_id = $1
        ORDER BY sc.saved_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(contracts)
}

/// The registry ids of everything the user saved (for the profile payload).
pub async fn saved_contract_ids(pool: &DbPool, user_id: &Uuid) -> AppResult<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        r#"
        SELECT ct.pncp_id
        FROM contracts ct
        JOIN saved_contracts sc ON sc.contract_id = ct.id
        WHERE sc.user_id = $1
        ORDER BY sc.saved_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
