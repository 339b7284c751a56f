//! In-memory order repository for testing and development.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::order_lifecycle::{
    CasOutcome, ExecutionRecord, HistoryQuery, Order, OrderError, OrderRepository, OrderStatus,
    RepositoryError, SortField, SortOrder, StatusTransition,
};
use crate::domain::shared::{OrderId, UserId};

/// In-memory implementation of `OrderRepository`.
///
/// Every compare-and-set runs under the write lock, so it is atomic with
/// respect to every other operation on the same repository.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of orders in the repository.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    /// Check if the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }

    fn cas<F>(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        apply: F,
    ) -> Result<CasOutcome, RepositoryError>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError>,
    {
        let mut orders = self.orders.write();
        let Some(stored) = orders.get_mut(id.as_str()) else {
            return Ok(CasOutcome::Conflict { actual: None });
        };
        if stored.status() != expected {
            return Ok(CasOutcome::Conflict {
                actual: Some(stored.status()),
            });
        }
        let mut updated = stored.clone();
        apply(&mut updated).map_err(|e| RepositoryError::Corrupt {
            order_id: id.to_string(),
            message: e.to_string(),
        })?;
        *stored = updated.clone();
        Ok(CasOutcome::Applied(updated))
    }
}

fn compare(a: &Order, b: &Order, field: SortField) -> Ordering {
    let primary = match field {
        SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
        SortField::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
        SortField::Symbol => a.symbol().cmp(b.symbol()),
        SortField::Status => a.status().as_str().cmp(b.status().as_str()),
    };
    primary.then_with(|| a.order_id().as_str().cmp(b.order_id().as_str()))
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write();
        let key = order.order_id().to_string();
        if orders.contains_key(&key) {
            return Err(RepositoryError::Duplicate(key));
        }
        orders.insert(key, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().get(id.as_str()).cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut found: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| compare(b, a, SortField::CreatedAt));
        Ok(found)
    }

    async fn update_status(
        &self,
        id: &OrderId,
        transition: &StatusTransition,
    ) -> Result<CasOutcome, RepositoryError> {
        self.cas(id, transition.from(), |order| order.apply_transition(transition))
    }

    async fn update_execution(
        &self,
        id: &OrderId,
        execution: &ExecutionRecord,
    ) -> Result<CasOutcome, RepositoryError> {
        self.cas(id, OrderStatus::Processing, |order| {
            order.apply_execution(execution)
        })
    }

    async fn find_history(
        &self,
        user_id: &UserId,
        query: &HistoryQuery,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut found: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| match query.sort_order() {
            SortOrder::Asc => compare(a, b, query.sort_by()),
            SortOrder::Desc => compare(b, a, query.sort_by()),
        });
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        Ok(found
            .into_iter()
            .skip(offset)
            .take(query.limit() as usize)
            .collect())
    }

    async fn count_by_user(&self, user_id: &UserId) -> Result<u64, RepositoryError> {
        let count = self
            .orders
            .read()
            .values()
            .filter(|o| o.user_id() == user_id)
            .count();
        Ok(count as u64)
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
        Ok(self.orders.write().remove(id.as_str()).is_some())
    }
}
