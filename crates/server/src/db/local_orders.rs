//! Local order repository.
//!
//! Structured parts of an order (customer, lines, totals, metadata) live in
//! JSONB columns; the columns needed for lookups and rate limiting are plain.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use codform_core::{LocalOrderId, LocalOrderStatus, OrderType, PlatformId};

use super::{RepositoryError, from_json, to_json};
use crate::models::{LocalOrder, NewLocalOrder};

#[derive(sqlx::FromRow)]
struct LocalOrderRow {
    id: i32,
    shop: String,
    status: String,
    customer: serde_json::Value,
    shipping: Option<serde_json::Value>,
    line_items: serde_json::Value,
    totals: serde_json::Value,
    client_ip: Option<String>,
    order_type: Option<String>,
    platform_order_id: Option<String>,
    platform_order_number: Option<String>,
    note: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LocalOrderRow> for LocalOrder {
    type Error = RepositoryError;

    fn try_from(row: LocalOrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<LocalOrderStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid status in database: {e}"))
        })?;
        let order_type = row
            .order_type
            .as_deref()
            .map(str::parse::<OrderType>)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid order_type in database: {e}"))
            })?;

        Ok(Self {
            id: LocalOrderId::new(row.id),
            shop: row.shop,
            status,
            customer: from_json("customer", row.customer)?,
            shipping: row
                .shipping
                .map(|value| from_json("shipping", value))
                .transpose()?,
            line_items: from_json("line_items", row.line_items)?,
            totals: from_json("totals", row.totals)?,
            client_ip: row.client_ip,
            order_type,
            platform_order_id: row.platform_order_id.as_deref().map(PlatformId::new),
            platform_order_number: row.platform_order_number,
            note: row.note,
            metadata: from_json("metadata", row.metadata)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str = r"
    id, shop, status, customer, shipping, line_items, totals, client_ip,
    order_type, platform_order_id, platform_order_number, note, metadata,
    created_at, updated_at
";

/// Repository for locally persisted orders.
pub struct LocalOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LocalOrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new order with status `pending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, order: &NewLocalOrder) -> Result<LocalOrder, RepositoryError> {
        let shipping = order
            .shipping
            .as_ref()
            .map(|rate| to_json("shipping", rate))
            .transpose()?;
        let email = order.customer.email.trim().to_lowercase();

        let row = sqlx::query_as::<_, LocalOrderRow>(&format!(
            r"
            INSERT INTO codform.local_orders (
                shop, status, customer, shipping, line_items, totals, client_ip, email, metadata
            )
            VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "
        ))
        .bind(&order.shop)
        .bind(to_json("customer", &order.customer)?)
        .bind(shipping)
        .bind(to_json("line_items", &order.line_items)?)
        .bind(to_json("totals", &order.totals)?)
        .bind(order.client_ip.as_deref())
        .bind((!email.is_empty()).then_some(email))
        .bind(to_json("metadata", &order.metadata)?)
        .fetch_one(self.pool)
        .await?;

        LocalOrder::try_from(row)
    }

    /// Write back the mutable part of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, order: &LocalOrder) -> Result<LocalOrder, RepositoryError> {
        let row = sqlx::query_as::<_, LocalOrderRow>(&format!(
            r"
            UPDATE codform.local_orders
            SET status = $3,
                line_items = $4,
                totals = $5,
                order_type = $6,
                platform_order_id = $7,
                platform_order_number = $8,
                note = $9,
                metadata = $10,
                updated_at = NOW()
            WHERE shop = $1 AND id = $2
            RETURNING {COLUMNS}
            "
        ))
        .bind(&order.shop)
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(to_json("line_items", &order.line_items)?)
        .bind(to_json("totals", &order.totals)?)
        .bind(order.order_type.as_ref().map(OrderType::as_str))
        .bind(order.platform_order_id.as_ref().map(PlatformId::as_str))
        .bind(order.platform_order_number.as_deref())
        .bind(order.note.as_deref())
        .bind(to_json("metadata", &order.metadata)?)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        LocalOrder::try_from(row)
    }

    /// Get an order by id, scoped to its shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored column is invalid.
    pub async fn get(
        &self,
        shop: &str,
        id: LocalOrderId,
    ) -> Result<Option<LocalOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, LocalOrderRow>(&format!(
            r"
            SELECT {COLUMNS}
            FROM codform.local_orders
            WHERE shop = $1 AND id = $2
            "
        ))
        .bind(shop)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(LocalOrder::try_from).transpose()
    }

    /// Count orders placed from this IP or email since `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_recent(
        &self,
        shop: &str,
        client_ip: Option<&str>,
        email: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let email = email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        if client_ip.is_none() && email.is_none() {
            return Ok(0);
        }

        let (count,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(DISTINCT id)
            FROM codform.local_orders
            WHERE shop = $1
              AND created_at >= $4
              AND (client_ip = $2 OR email = $3)
            ",
        )
        .bind(shop)
        .bind(client_ip)
        .bind(email)
        .bind(since)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Claim an upsell for an order. Returns `false` when it was already
    /// claimed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn claim_upsell(
        &self,
        id: LocalOrderId,
        upsell_id: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO codform.applied_upsells (local_order_id, upsell_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(id)
        .bind(upsell_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Drop a claim so a failed upsell can be retried.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn release_upsell(
        &self,
        id: LocalOrderId,
        upsell_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            DELETE FROM codform.applied_upsells
            WHERE local_order_id = $1 AND upsell_id = $2
            ",
        )
        .bind(id)
        .bind(upsell_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

}
