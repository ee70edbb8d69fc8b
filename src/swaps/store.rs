use std::collections::HashMap;

use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{db::{decode_timestamp, encode_timestamp}, users::RatingSummary, AppError, AppResult};

use super::{Review, Swap, SwapRole, SwapStatus};

/// Swap and review records, kept in the relational store.
#[derive(Clone)]
pub struct SwapStore {
    db_pool: SqlitePool,
}

#[derive(FromRow)]
struct SwapRow {
    id: String,
    offered_by_user_id: String,
    requested_from_user_id: String,
    skill_offered: String,
    skill_requested: String,
    message: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SwapRow> for Swap {
    type Error = AppError;

    fn try_from(row: SwapRow) -> AppResult<Swap> {
        Ok(Swap {
            id: parse_id(&row.id)?,
            offered_by_user_id: row.offered_by_user_id,
            requested_from_user_id: row.requested_from_user_id,
            skill_offered: row.skill_offered,
            skill_requested: row.skill_requested,
            message: row.message,
            status: row.status.parse()?,
            created_at: decode_timestamp(&row.created_at)?,
            updated_at: decode_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct ReviewRow {
    id: String,
    swap_id: String,
    reviewer_id: String,
    reviewee_id: String,
    rating: i64,
    comment: String,
    created_at: String,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> AppResult<Review> {
        Ok(Review {
            id: parse_id(&row.id)?,
            swap_id: parse_id(&row.swap_id)?,
            reviewer_id: row.reviewer_id,
            reviewee_id: row.reviewee_id,
            rating: u8::try_from(row.rating)
                .map_err(|_| AppError::Internal(format!("bad rating {} in store", row.rating)))?,
            comment: row.comment,
            created_at: decode_timestamp(&row.created_at)?,
        })
    }
}

fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::Internal(format!("bad id {raw:?} in store: {e}")))
}

const SWAP_COLUMNS: &str = "id,offered_by_user_id,requested_from_user_id,skill_offered,skill_requested,message,status,created_at,updated_at";
const REVIEW_COLUMNS: &str = "id,swap_id,reviewer_id,reviewee_id,rating,comment,created_at";

fn into_swaps(rows: Vec<SwapRow>) -> AppResult<Vec<Swap>> {
    rows.into_iter().map(Swap::try_from).collect()
}

fn into_reviews(rows: Vec<ReviewRow>) -> AppResult<Vec<Review>> {
    rows.into_iter().map(Review::try_from).collect()
}

impl SwapStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn insert_swap(&self, swap: &Swap) -> AppResult<()> {
        sqlx::query(&format!("INSERT INTO swaps ({SWAP_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?)"))
            .bind(swap.id.to_string())
            .bind(&swap.offered_by_user_id)
            .bind(&swap.requested_from_user_id)
            .bind(&swap.skill_offered)
            .bind(&swap.skill_requested)
            .bind(&swap.message)
            .bind(swap.status.as_str())
            .bind(encode_timestamp(swap.created_at)?)
            .bind(encode_timestamp(swap.updated_at)?)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn find_swap(&self, id: Uuid) -> AppResult<Option<Swap>> {
        sqlx::query_as::<_, SwapRow>(&format!("SELECT {SWAP_COLUMNS} FROM swaps WHERE id=?"))
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?
            .map(Swap::try_from)
            .transpose()
    }

    /// Swaps where `user_id` is on the given side, in store order.
    pub async fn swaps_for_user(&self, user_id: &str, role: SwapRole) -> AppResult<Vec<Swap>> {
        let filter = match role {
            SwapRole::Offered => "offered_by_user_id=?1",
            SwapRole::Received => "requested_from_user_id=?1",
            SwapRole::All => "offered_by_user_id=?1 OR requested_from_user_id=?1",
        };
        let rows = sqlx::query_as::<_, SwapRow>(&format!(
            "SELECT {SWAP_COLUMNS} FROM swaps WHERE {filter} ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;
        into_swaps(rows)
    }

    pub async fn all_swaps(&self) -> AppResult<Vec<Swap>> {
        let rows = sqlx::query_as::<_, SwapRow>(&format!(
            "SELECT {SWAP_COLUMNS} FROM swaps ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.db_pool)
        .await?;
        into_swaps(rows)
    }

    /// Moves a swap to `next` only if it is still in `expected`. Returns
    /// whether a row changed.
    pub async fn update_status(
        &self,
        id: Uuid,
        expected: SwapStatus,
        next: SwapStatus,
        at: OffsetDateTime,
    ) -> AppResult<bool> {
        let result = sqlx::query("UPDATE swaps SET status=?, updated_at=? WHERE id=? AND status=?")
            .bind(next.as_str())
            .bind(encode_timestamp(at)?)
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.db_pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Inserts a review. Returns `false` when the reviewer already reviewed
    /// that swap.
    pub async fn insert_review(&self, review: &Review) -> AppResult<bool> {
        let result = sqlx::query(&format!(
            "INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES (?,?,?,?,?,?,?) ON CONFLICT (swap_id, reviewer_id) DO NOTHING"
        ))
        .bind(review.id.to_string())
        .bind(review.swap_id.to_string())
        .bind(&review.reviewer_id)
        .bind(&review.reviewee_id)
        .bind(i64::from(review.rating))
        .bind(&review.comment)
        .bind(encode_timestamp(review.created_at)?)
        .execute(&self.db_pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find_review(&self, swap_id: Uuid, reviewer_id: &str) -> AppResult<Option<Review>> {
        sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE swap_id=? AND reviewer_id=?"
        ))
        .bind(swap_id.to_string())
        .bind(reviewer_id)
        .fetch_optional(&self.db_pool)
        .await?
        .map(Review::try_from)
        .transpose()
    }

    pub async fn reviews_for(&self, reviewee_id: &str) -> AppResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE reviewee_id=? ORDER BY created_at DESC, id DESC"
        ))
        .bind(reviewee_id)
        .fetch_all(&self.db_pool)
        .await?;
        into_reviews(rows)
    }

    pub async fn all_reviews(&self) -> AppResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.db_pool)
        .await?;
        into_reviews(rows)
    }

    pub async fn rating_for(&self, reviewee_id: &str) -> AppResult<Option<RatingSummary>> {
        let (sum, count): (Option<i64>, i64) =
            sqlx::query_as("SELECT SUM(rating), COUNT(*) FROM reviews WHERE reviewee_id=?")
                .bind(reviewee_id)
                .fetch_one(&self.db_pool)
                .await?;
        Ok(sum.and_then(|sum| RatingSummary::from_totals(sum, count)))
    }

    /// (rating sum, review count) per reviewee.
    pub async fn rating_totals(&self) -> AppResult<HashMap<String, (i64, i64)>> {
        let rows: Vec<(String, i64, i64)> =
            sqlx::query_as("SELECT reviewee_id, SUM(rating), COUNT(*) FROM reviews GROUP BY reviewee_id")
                .fetch_all(&self.db_pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(reviewee_id, sum, count)| (reviewee_id, (sum, count)))
            .collect())
    }
}
