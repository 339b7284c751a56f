//! Order Repository Trait
//!
//! Defines the persistence abstraction for orders.
//! Implemented by adapters in the infrastructure layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use super::aggregate::Order;
use super::services::{ExecutionRecord, StatusTransition};
use super::value_objects::OrderStatus;
use crate::domain::shared::{DomainError, OrderId, UserId};

/// Default page size for history queries.
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
/// Hard maximum page size for history queries.
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Errors raised by order repositories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The store cannot be reached.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    /// A transient failure worth retrying (lock contention, busy database).
    #[error("Transient order store failure: {0}")]
    Transient(String),

    /// An order with this ID already exists.
    #[error("Duplicate order ID: {0}")]
    Duplicate(String),

    /// A persisted row could not be decoded.
    #[error("Corrupt order record {order_id}: {message}")]
    Corrupt {
        /// Order ID of the bad row.
        order_id: String,
        /// Decode failure.
        message: String,
    },
}

/// Result of a compare-and-set status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write happened; the order as now stored.
    Applied(Order),
    /// The order's status did not match the expected one; nothing changed.
    Conflict {
        /// Status actually stored, `None` if the order does not exist.
        actual: Option<OrderStatus>,
    },
}

impl CasOutcome {
    /// Returns true if the write happened.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Column history queries sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Creation time.
    #[default]
    CreatedAt,
    /// Last update time.
    UpdatedAt,
    /// Ticker symbol.
    Symbol,
    /// Lifecycle status.
    Status,
}

impl SortField {
    /// Column name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Symbol => "symbol",
            Self::Status => "status",
        }
    }
}

impl FromStr for SortField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            "symbol" => Ok(Self::Symbol),
            "status" => Ok(Self::Status),
            _ => Err(DomainError::UnknownVariant {
                kind: "SortField",
                value: s.to_string(),
            }),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(DomainError::UnknownVariant {
                kind: "SortOrder",
                value: s.to_string(),
            }),
        }
    }
}

/// A page of a user's order history, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    limit: u32,
    offset: u64,
    sort_by: SortField,
    sort_order: SortOrder,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
            offset: 0,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl HistoryQuery {
    /// Build a query from raw caller input.
    ///
    /// A non-positive limit becomes the default, a limit above the hard
    /// maximum becomes the maximum, and a negative offset becomes zero.
    #[must_use]
    pub fn new(limit: i64, offset: i64, sort_by: SortField, sort_order: SortOrder) -> Self {
        let limit = if limit <= 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            u32::try_from(limit.min(i64::from(MAX_HISTORY_LIMIT))).unwrap_or(MAX_HISTORY_LIMIT)
        };
        let offset = u64::try_from(offset).unwrap_or(0);
        Self {
            limit,
            offset,
            sort_by,
            sort_order,
        }
    }

    /// Page size.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Sort column.
    #[must_use]
    pub const fn sort_by(&self) -> SortField {
        self.sort_by
    }

    /// Sort direction.
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }
}

/// Repository trait for Order persistence.
///
/// This is a domain interface (port) that is implemented by
/// infrastructure adapters (SQLite, in-memory).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if the ID exists, or a store failure.
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Find an order by its ID.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// All orders of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Compare-and-set the status of an order.
    ///
    /// Applies only if the stored status equals `transition.from()`.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails. A status mismatch is not an error.
    async fn update_status(
        &self,
        id: &OrderId,
        transition: &StatusTransition,
    ) -> Result<CasOutcome, RepositoryError>;

    /// Compare-and-set PROCESSING -> EXECUTED with the execution fields.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails. A status mismatch is not an error.
    async fn update_execution(
        &self,
        id: &OrderId,
        execution: &ExecutionRecord,
    ) -> Result<CasOutcome, RepositoryError>;

    /// One page of a user's orders.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_history(
        &self,
        user_id: &UserId,
        query: &HistoryQuery,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Number of orders a user has.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn count_by_user(&self, user_id: &UserId) -> Result<u64, RepositoryError>;

    /// Administrative delete. Returns true if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 20 ; "zero becomes default")]
    #[test_case(-5, 20 ; "negative becomes default")]
    #[test_case(50, 50 ; "in range kept")]
    #[test_case(100, 100 ; "maximum kept")]
    #[test_case(500, 100 ; "above maximum clamped")]
    fn history_limit_clamping(raw: i64, expected: u32) {
        let q = HistoryQuery::new(raw, 0, SortField::CreatedAt, SortOrder::Desc);
        assert_eq!(q.limit(), expected);
    }

    #[test]
    fn negative_offset_becomes_zero() {
        let q = HistoryQuery::new(10, -3, SortField::CreatedAt, SortOrder::Desc);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn default_sort_is_created_at_desc() {
        let q = HistoryQuery::default();
        assert_eq!(q.sort_by(), SortField::CreatedAt);
        assert_eq!(q.sort_order(), SortOrder::Desc);
        assert_eq!(q.limit(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn sort_parsing() {
        assert_eq!("UPDATED_AT".parse::<SortField>().unwrap(), SortField::UpdatedAt);
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("price".parse::<SortField>().is_err());
    }
}
