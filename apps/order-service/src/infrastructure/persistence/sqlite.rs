//! SQLite order repository (sqlx).
//!
//! One row per order in table `orders`. Decimals are stored as text and
//! timestamps as unix milliseconds. Status writes are a single
//! `UPDATE ... WHERE order_id = ? AND status = ?`; the write happened iff
//! exactly one row was affected.

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Pool, Sqlite};
use tracing::debug;

use crate::domain::order_lifecycle::{
    CancelReason, CasOutcome, ExecutionRecord, HistoryQuery, Order, OrderRepository, OrderStatus,
    ReconstitutedOrderParams, RepositoryError, SortField, StatusTransition,
};
use crate::domain::shared::{DomainError, OrderId, Price, Quantity, Symbol, Timestamp, UserId};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS orders (
    order_id                   TEXT PRIMARY KEY,
    user_id                    TEXT NOT NULL,
    symbol                     TEXT NOT NULL,
    side                       TEXT NOT NULL,
    order_type                 TEXT NOT NULL,
    quantity                   TEXT NOT NULL,
    price                      TEXT,
    status                     TEXT NOT NULL,
    created_at                 INTEGER NOT NULL,
    updated_at                 INTEGER NOT NULL,
    executed_at                INTEGER,
    execution_price            TEXT,
    market_price_at_submission TEXT,
    market_data_timestamp      INTEGER,
    failure_reason             TEXT,
    cancel_reason              TEXT
);
CREATE INDEX IF NOT EXISTS idx_orders_user_created ON orders (user_id, created_at);
";

const SELECT_COLUMNS: &str = "SELECT order_id, user_id, symbol, side, order_type, quantity, \
     price, status, created_at, updated_at, executed_at, execution_price, \
     market_price_at_submission, market_data_timestamp, failure_reason, cancel_reason \
     FROM orders";

/// Order row as stored.
#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    order_id: String,
    user_id: String,
    symbol: String,
    side: String,
    order_type: String,
    quantity: String,
    price: Option<String>,
    status: String,
    created_at: i64,
    updated_at: i64,
    executed_at: Option<i64>,
    execution_price: Option<String>,
    market_price_at_submission: Option<String>,
    market_data_timestamp: Option<i64>,
    failure_reason: Option<String>,
    cancel_reason: Option<String>,
}

impl OrderRow {
    fn from_domain(order: &Order) -> Self {
        let price_text = |p: Option<Price>| p.map(|p| p.amount().to_string());
        Self {
            order_id: order.order_id().to_string(),
            user_id: order.user_id().to_string(),
            symbol: order.symbol().to_string(),
            side: order.side().as_str().to_string(),
            order_type: order.order_type().as_str().to_string(),
            quantity: order.quantity().amount().to_string(),
            price: price_text(order.price()),
            status: order.status().as_str().to_string(),
            created_at: order.created_at().unix_millis(),
            updated_at: order.updated_at().unix_millis(),
            executed_at: order.executed_at().map(|t| t.unix_millis()),
            execution_price: price_text(order.execution_price()),
            market_price_at_submission: price_text(order.market_price_at_submission()),
            market_data_timestamp: order.market_data_timestamp().map(|t| t.unix_millis()),
            failure_reason: order.failure_reason().map(str::to_string),
            cancel_reason: order.cancel_reason().map(|r| r.as_str().to_string()),
        }
    }

    fn to_domain(&self) -> Result<Order, RepositoryError> {
        let corrupt = |message: String| RepositoryError::Corrupt {
            order_id: self.order_id.clone(),
            message,
        };
        let decimal = |field: &str, raw: &str| {
            Decimal::from_str(raw).map_err(|e| corrupt(format!("{field}: {e}")))
        };
        let optional_price = |field: &str, raw: &Option<String>| {
            raw.as_deref()
                .map(|s| decimal(field, s).map(Price::new))
                .transpose()
        };
        let timestamp = |field: &str, millis: i64| {
            Timestamp::from_unix_millis(millis)
                .ok_or_else(|| corrupt(format!("{field}: {millis} out of range")))
        };
        let optional_timestamp =
            |field: &str, millis: Option<i64>| millis.map(|m| timestamp(field, m)).transpose();

        Ok(Order::reconstitute(ReconstitutedOrderParams {
            order_id: OrderId::new(self.order_id.clone()),
            user_id: UserId::new(self.user_id.clone()),
            symbol: Symbol::new(&self.symbol),
            side: self.side.parse().map_err(|e| corrupt(format!("side: {e}")))?,
            order_type: self
                .order_type
                .parse()
                .map_err(|e| corrupt(format!("order_type: {e}")))?,
            quantity: Quantity::new(decimal("quantity", &self.quantity)?),
            price: optional_price("price", &self.price)?,
            status: self
                .status
                .parse()
                .map_err(|e| corrupt(format!("status: {e}")))?,
            created_at: timestamp("created_at", self.created_at)?,
            updated_at: timestamp("updated_at", self.updated_at)?,
            executed_at: optional_timestamp("executed_at", self.executed_at)?,
            execution_price: optional_price("execution_price", &self.execution_price)?,
            market_price_at_submission: optional_price(
                "market_price_at_submission",
                &self.market_price_at_submission,
            )?,
            market_data_timestamp: optional_timestamp(
                "market_data_timestamp",
                self.market_data_timestamp,
            )?,
            failure_reason: self.failure_reason.clone(),
            cancel_reason: self.cancel_reason.as_deref().map(CancelReason::parse),
        }))
    }
}

/// Map a sqlx error onto the repository taxonomy.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Duplicate(db.message().to_string())
        }
        sqlx::Error::Database(db)
            if db.message().contains("locked") || db.message().contains("busy") =>
        {
            RepositoryError::Transient(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut => RepositoryError::Transient(err.to_string()),
        _ => RepositoryError::Unavailable(err.to_string()),
    }
}

/// Order repository backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteOrderRepository {
    pool: Pool<Sqlite>,
}

impl SqliteOrderRepository {
    /// Wrap an existing pool. Call [`Self::migrate`] before use.
    #[must_use]
    pub const fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open a pool and create the schema.
    ///
    /// `sqlite::memory:` databases are private to a connection, so use
    /// `max_connections = 1` with them.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the database cannot be opened.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    /// Create the `orders` table if absent.
    ///
    /// # Errors
    ///
    /// Returns error if the DDL fails.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Get the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn current_status(&self, id: &OrderId) -> Result<Option<OrderStatus>, RepositoryError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        status
            .map(|s| {
                s.parse().map_err(|e: DomainError| {
                    RepositoryError::Corrupt {
                        order_id: id.to_string(),
                        message: e.to_string(),
                    }
                })
            })
            .transpose()
    }

    /// Write `updated` over the row iff its status is still `expected`.
    async fn compare_and_set(
        &self,
        updated: &Order,
        expected: OrderStatus,
    ) -> Result<CasOutcome, RepositoryError> {
        let row = OrderRow::from_domain(updated);
        let result = sqlx::query(
            "UPDATE orders SET status = ?, updated_at = ?, executed_at = ?, \
             execution_price = ?, failure_reason = ?, cancel_reason = ? \
             WHERE order_id = ? AND status = ?",
        )
        .bind(&row.status)
        .bind(row.updated_at)
        .bind(row.executed_at)
        .bind(&row.execution_price)
        .bind(&row.failure_reason)
        .bind(&row.cancel_reason)
        .bind(&row.order_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 1 {
            Ok(CasOutcome::Applied(updated.clone()))
        } else {
            let actual = self.current_status(updated.order_id()).await?;
            debug!(order_id = %updated.order_id(), ?actual, "CAS lost");
            Ok(CasOutcome::Conflict { actual })
        }
    }

    async fn load_expecting(
        &self,
        id: &OrderId,
        expected: OrderStatus,
    ) -> Result<Result<Order, CasOutcome>, RepositoryError> {
        match self.find_by_id(id).await? {
            None => Ok(Err(CasOutcome::Conflict { actual: None })),
            Some(order) if order.status() != expected => Ok(Err(CasOutcome::Conflict {
                actual: Some(order.status()),
            })),
            Some(order) => Ok(Ok(order)),
        }
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let row = OrderRow::from_domain(order);
        sqlx::query(
            "INSERT INTO orders (order_id, user_id, symbol, side, order_type, quantity, price, \
             status, created_at, updated_at, executed_at, execution_price, \
             market_price_at_submission, market_data_timestamp, failure_reason, cancel_reason) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.order_id)
        .bind(&row.user_id)
        .bind(&row.symbol)
        .bind(&row.side)
        .bind(&row.order_type)
        .bind(&row.quantity)
        .bind(&row.price)
        .bind(&row.status)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.executed_at)
        .bind(&row.execution_price)
        .bind(&row.market_price_at_submission)
        .bind(row.market_data_timestamp)
        .bind(&row.failure_reason)
        .bind(&row.cancel_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error(e) {
            RepositoryError::Duplicate(_) => RepositoryError::Duplicate(row.order_id.clone()),
            other => other,
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_COLUMNS} WHERE order_id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| r.to_domain()).transpose()
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ? ORDER BY created_at DESC, order_id DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(OrderRow::to_domain).collect()
    }

    async fn update_status(
        &self,
        id: &OrderId,
        transition: &StatusTransition,
    ) -> Result<CasOutcome, RepositoryError> {
        let mut order = match self.load_expecting(id, transition.from()).await? {
            Ok(order) => order,
            Err(conflict) => return Ok(conflict),
        };
        order
            .apply_transition(transition)
            .map_err(|e| RepositoryError::Corrupt {
                order_id: id.to_string(),
                message: e.to_string(),
            })?;
        self.compare_and_set(&order, transition.from()).await
    }

    async fn update_execution(
        &self,
        id: &OrderId,
        execution: &ExecutionRecord,
    ) -> Result<CasOutcome, RepositoryError> {
        let mut order = match self.load_expecting(id, OrderStatus::Processing).await? {
            Ok(order) => order,
            Err(conflict) => return Ok(conflict),
        };
        order
            .apply_execution(execution)
            .map_err(|e| RepositoryError::Corrupt {
                order_id: id.to_string(),
                message: e.to_string(),
            })?;
        self.compare_and_set(&order, OrderStatus::Processing).await
    }

    async fn find_history(
        &self,
        user_id: &UserId,
        query: &HistoryQuery,
    ) -> Result<Vec<Order>, RepositoryError> {
        // Sort column and direction come from closed enums, never from input text.
        let column = match query.sort_by() {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Symbol => "symbol",
            SortField::Status => "status",
        };
        let direction = query.sort_order().as_sql();
        let sql = format!(
            "{SELECT_COLUMNS} WHERE user_id = ? ORDER BY {column} {direction}, \
             order_id {direction} LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id.as_str())
            .bind(i64::from(query.limit()))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(OrderRow::to_domain).collect()
    }

    async fn count_by_user(&self, user_id: &UserId) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?")
            .bind(user_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE order_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}
