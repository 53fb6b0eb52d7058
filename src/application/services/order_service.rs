//! Order Service
//!
//! Customer order history and store-admin fulfilment actions. Every status
//! change goes through the order lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{
    DownloadRepository, Order, OrderItem, OrderRepository, OrderStatus, Transition,
};

use super::download_service::DownloadDto;

/// Default admin page size
pub const DEFAULT_ORDER_PAGE: i64 = 50;

/// Order service trait
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Orders the user placed, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderError>;

    /// One of the user's orders with items and download links
    async fn get_for_user(&self, user_id: i64, order_id: i64) -> Result<OrderDetailDto, OrderError>;

    /// Orders in any state, optionally filtered
    async fn admin_list(&self, status: Option<OrderStatus>, limit: i64, offset: i64) -> Result<Vec<Order>, OrderError>;

    async fn admin_get(&self, order_id: i64) -> Result<OrderDetailDto, OrderError>;

    async fn mark_shipped(&self, order_id: i64, tracking_number: Option<String>) -> Result<Order, OrderError>;

    async fn mark_delivered(&self, order_id: i64) -> Result<Order, OrderError>;

    /// Record a refund issued outside the store
    async fn mark_refunded(&self, order_id: i64) -> Result<Order, OrderError>;
}

/// Order with its lines and download grants
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetailDto {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub downloads: Vec<DownloadDto>,
}

/// Order service errors
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found")]
    NotFound,

    #[error("{0}")]
    InvalidTransition(#[from] crate::domain::InvalidTransition),

    #[error("Order was modified concurrently")]
    Conflict,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// OrderService implementation
pub struct OrderServiceImpl<O, D>
where
    O: OrderRepository,
    D: DownloadRepository,
{
    order_repo: Arc<O>,
    download_repo: Arc<D>,
    public_base_url: String,
}

impl<O, D> OrderServiceImpl<O, D>
where
    O: OrderRepository,
    D: DownloadRepository,
{
    pub fn new(order_repo: Arc<O>, download_repo: Arc<D>, public_base_url: impl Into<String>) -> Self {
        Self {
            order_repo,
            download_repo,
            public_base_url: public_base_url.into(),
        }
    }

    async fn load(&self, order_id: i64) -> Result<Order, OrderError> {
        self.order_repo
            .find_by_id(order_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?
            .ok_or(OrderError::NotFound)
    }

    async fn detail(&self, order: Order) -> Result<OrderDetailDto, OrderError> {
        let items = self
            .order_repo
            .items(order.id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?;
        let downloads = self
            .download_repo
            .list_for_order(order.id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?
            .iter()
            .map(|d| DownloadDto::from_download(d, &self.public_base_url))
            .collect();

        Ok(OrderDetailDto {
            order,
            items,
            downloads,
        })
    }

    async fn move_to(
        &self,
        order_id: i64,
        next: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;

        if order.status.transition(next)? == Transition::Unchanged {
            return Ok(order);
        }

        let moved = self
            .order_repo
            .update_status(order_id, order.status, next, tracking_number)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?;
        if !moved {
            return Err(OrderError::Conflict);
        }

        tracing::info!(order_id, from = %order.status, to = %next, "Order status changed");
        self.load(order_id).await
    }
}

#[async_trait]
impl<O, D> OrderService for OrderServiceImpl<O, D>
where
    O: OrderRepository + 'static,
    D: DownloadRepository + 'static,
{
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderError> {
        self.order_repo
            .list_for_user(user_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))
    }

    async fn get_for_user(&self, user_id: i64, order_id: i64) -> Result<OrderDetailDto, OrderError> {
        let order = self.load(order_id).await?;
        // Someone else's order looks the same as a missing one
        if !order.is_owned_by(user_id) {
            return Err(OrderError::NotFound);
        }
        self.detail(order).await
    }

    async fn admin_list(&self, status: Option<OrderStatus>, limit: i64, offset: i64) -> Result<Vec<Order>, OrderError> {
        let limit = if limit <= 0 { DEFAULT_ORDER_PAGE } else { limit.min(200) };
        self.order_repo
            .list(status, limit, offset.max(0))
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))
    }

    async fn admin_get(&self, order_id: i64) -> Result<OrderDetailDto, OrderError> {
        let order = self.load(order_id).await?;
        self.detail(order).await
    }

    #[tracing::instrument(skip(self))]
    async fn mark_shipped(&self, order_id: i64, tracking_number: Option<String>) -> Result<Order, OrderError> {
        self.move_to(order_id, OrderStatus::Shipped, tracking_number.as_deref())
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn mark_delivered(&self, order_id: i64) -> Result<Order, OrderError> {
        self.move_to(order_id, OrderStatus::Delivered, None).await
    }

    #[tracing::instrument(skip(self))]
    async fn mark_refunded(&self, order_id: i64) -> Result<Order, OrderError> {
        self.move_to(order_id, OrderStatus::Refunded, None).await
    }
}
