use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime, UtcOffset};

use crate::{AppError, AppResult};

// swaps
//   unique: id
//   check: offered_by_user_id <> requested_from_user_id
// reviews
//   unique: id
//   unique: swap_id, reviewer_id

pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// A private in-memory database. Pinned to one connection that never
/// expires, since every new sqlite memory connection starts empty.
pub async fn connect_in_memory() -> AppResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// RFC 3339 in UTC with a fixed-width fraction, so stored text sorts in time
/// order.
pub(crate) fn encode_timestamp(at: OffsetDateTime) -> AppResult<String> {
    at.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
        ))
        .map_err(|e| AppError::Internal(format!("cannot format timestamp: {e}")))
}

pub(crate) fn decode_timestamp(raw: &str) -> AppResult<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|e| AppError::Internal(format!("bad timestamp {raw:?} in store: {e}")))
}
