//! Database helpers for accounts, refresh credentials, and one-time codes.
//!
//! Multi-row mutations that must be observed together run inside the caller's
//! transaction; everything here either takes a `Transaction` or is a single
//! atomic statement against the pool.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use tracing::Instrument;
use uuid::Uuid;

use super::identity::ProfilePatch;
use super::otp::CodePurpose;
use super::utils::is_unique_violation;

/// A full account row, password hash included. Response shaping strips the
/// hash before anything leaves the process.
#[derive(Clone, Debug)]
pub(super) struct AccountRecord {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) password_hash: Option<String>,
    pub(super) firstname: Option<String>,
    pub(super) lastname: Option<String>,
    pub(super) name: Option<String>,
    pub(super) organisation: Option<String>,
    pub(super) language: String,
    pub(super) picture: Option<String>,
    pub(super) email_verified_at: Option<DateTime<Utc>>,
}

/// Field values for a new account. Password-path signups carry a hash;
/// federated signups carry `None` and may arrive pre-verified.
#[derive(Debug)]
pub(super) struct NewAccount<'a> {
    pub(super) email: &'a str,
    pub(super) password_hash: Option<&'a str>,
    pub(super) firstname: Option<&'a str>,
    pub(super) lastname: Option<&'a str>,
    pub(super) name: Option<&'a str>,
    pub(super) organisation: Option<&'a str>,
    pub(super) language: &'a str,
    pub(super) picture: Option<&'a str>,
    pub(super) email_verified: bool,
}

#[derive(Debug)]
pub(super) enum InsertAccountOutcome {
    Created(AccountRecord),
    Conflict,
}

/// A consumed verification code row.
#[derive(Debug)]
pub(super) struct CodeRecord {
    pub(super) id: Uuid,
    pub(super) account_id: Option<Uuid>,
}

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, firstname, lastname, name, \
                               organisation, language, picture, email_verified_at";

fn account_from_row(row: &PgRow) -> AccountRecord {
    AccountRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        firstname: row.get("firstname"),
        lastname: row.get("lastname"),
        name: row.get("name"),
        organisation: row.get("organisation"),
        language: row.get("language"),
        picture: row.get("picture"),
        email_verified_at: row.get("email_verified_at"),
    }
}

fn db_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(super) async fn insert_account(
    tx: &mut Transaction<'_, Postgres>,
    account: &NewAccount<'_>,
) -> Result<InsertAccountOutcome> {
    let query = r"
        INSERT INTO accounts
            (email, password_hash, firstname, lastname, name, organisation, language, picture,
             email_verified_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CASE WHEN $9 THEN NOW() END)
        RETURNING id, email, password_hash, firstname, lastname, name, organisation, language,
                  picture, email_verified_at
    ";
    let row = sqlx::query(query)
        .bind(account.email)
        .bind(account.password_hash)
        .bind(account.firstname)
        .bind(account.lastname)
        .bind(account.name)
        .bind(account.organisation)
        .bind(account.language)
        .bind(account.picture)
        .bind(account.email_verified)
        .fetch_one(&mut **tx)
        .instrument(db_span("INSERT", query))
        .await;

    match row {
        Ok(row) => Ok(InsertAccountOutcome::Created(account_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(InsertAccountOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert account"),
    }
}

pub(super) async fn lookup_account_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await
        .context("failed to lookup account by email")?;
    Ok(row.as_ref().map(account_from_row))
}

/// Same lookup, but inside a transaction and holding the row lock so
/// concurrent flows cannot interleave their updates.
pub(super) async fn lookup_account_by_email_for_update(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1 FOR UPDATE");
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(&mut **tx)
        .instrument(db_span("SELECT", &query))
        .await
        .context("failed to lookup account for update")?;
    Ok(row.as_ref().map(account_from_row))
}

pub(super) async fn lookup_account_by_id(
    pool: &PgPool,
    account_id: Uuid,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await
        .context("failed to lookup account by id")?;
    Ok(row.as_ref().map(account_from_row))
}

/// Apply a merged profile after a federated login and return the fresh row.
pub(super) async fn update_account_profile(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    patch: &ProfilePatch,
) -> Result<AccountRecord> {
    let query = r"
        UPDATE accounts
        SET firstname = $2,
            lastname = $3,
            name = $4,
            picture = $5,
            email_verified_at = CASE WHEN $6 THEN NOW() ELSE email_verified_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, email, password_hash, firstname, lastname, name, organisation, language,
                  picture, email_verified_at
    ";
    let row = sqlx::query(query)
        .bind(account_id)
        .bind(patch.firstname.as_deref())
        .bind(patch.lastname.as_deref())
        .bind(patch.name.as_deref())
        .bind(patch.picture.as_deref())
        .bind(patch.mark_verified)
        .fetch_one(&mut **tx)
        .instrument(db_span("UPDATE", query))
        .await
        .context("failed to update account profile")?;
    Ok(account_from_row(&row))
}

pub(super) async fn update_account_password(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    sqlx::query(query)
        .bind(account_id)
        .bind(password_hash)
        .execute(&mut **tx)
        .instrument(db_span("UPDATE", query))
        .await
        .context("failed to update account password")?;
    Ok(())
}

pub(super) async fn set_email_verified(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET email_verified_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
          AND email_verified_at IS NULL
    ";
    sqlx::query(query)
        .bind(account_id)
        .execute(&mut **tx)
        .instrument(db_span("UPDATE", query))
        .await
        .context("failed to mark email verified")?;
    Ok(())
}

pub(super) async fn insert_refresh_token(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO refresh_tokens (account_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    sqlx::query(query)
        .bind(account_id)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(&mut **tx)
        .instrument(db_span("INSERT", query))
        .await
        .context("failed to insert refresh token")?;
    Ok(())
}

/// Revoke the presented credential if it is still usable, returning its
/// account. The single UPDATE is the compare-and-swap: of two concurrent
/// renewals presenting the same secret, exactly one sees a row.
pub(super) async fn consume_refresh_token(
    tx: &mut Transaction<'_, Postgres>,
    token_hash: &[u8],
) -> Result<Option<Uuid>> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE token_hash = $1
          AND revoked_at IS NULL
          AND expires_at > NOW()
        RETURNING account_id
    ";
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .instrument(db_span("UPDATE", query))
        .await
        .context("failed to consume refresh token")?;
    Ok(row.map(|row| row.get("account_id")))
}

/// Revoke every outstanding credential for the account (password reset).
pub(super) async fn revoke_all_refresh_tokens(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<u64> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE account_id = $1
          AND revoked_at IS NULL
    ";
    let result = sqlx::query(query)
        .bind(account_id)
        .execute(&mut **tx)
        .instrument(db_span("UPDATE", query))
        .await
        .context("failed to revoke refresh tokens")?;
    Ok(result.rows_affected())
}

/// Issuing a code does not invalidate earlier outstanding codes for the same
/// (email, purpose); each expires on its own clock.
pub(super) async fn insert_verification_code(
    pool: &PgPool,
    account_id: Option<Uuid>,
    email: &str,
    purpose: CodePurpose,
    code_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO verification_codes (account_id, email, purpose, code_hash, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
    ";
    sqlx::query(query)
        .bind(account_id)
        .bind(email)
        .bind(purpose.as_db())
        .bind(code_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(db_span("INSERT", query))
        .await
        .context("failed to insert verification code")?;
    Ok(())
}

/// Consume the newest matching, unconsumed, unexpired code. Consumption sets
/// the timestamp exactly once; the same digest never matches again, expired
/// or not. Commits together with whatever side effect the caller performs in
/// the same transaction.
pub(super) async fn consume_verification_code(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    purpose: CodePurpose,
    code_hash: &[u8],
) -> Result<Option<CodeRecord>> {
    let query = r"
        UPDATE verification_codes
        SET consumed_at = NOW()
        WHERE id = (
            SELECT id
            FROM verification_codes
            WHERE email = $1
              AND purpose = $2
              AND code_hash = $3
              AND consumed_at IS NULL
              AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
        )
        RETURNING id, account_id
    ";
    let row = sqlx::query(query)
        .bind(email)
        .bind(purpose.as_db())
        .bind(code_hash)
        .fetch_optional(&mut **tx)
        .instrument(db_span("UPDATE", query))
        .await
        .context("failed to consume verification code")?;
    Ok(row.map(|row| CodeRecord {
        id: row.get("id"),
        account_id: row.get("account_id"),
    }))
}
