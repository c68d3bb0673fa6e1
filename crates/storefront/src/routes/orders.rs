//! Order history route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use neoshop_core::OrderId;

use crate::backend::Order;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireCustomer;
use crate::routes::Loaded;
use crate::state::AppState;

/// An order with the actions the customer may take on it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub can_cancel: bool,
    pub can_return: bool,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            can_cancel: order.status.can_cancel(),
            can_return: order.status.can_return(),
            order,
        }
    }
}

/// List orders.
#[instrument(skip(state, customer))]
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Loaded<Vec<OrderView>>>> {
    let orders = Loaded::from_result(
        state.backend().orders(&customer.token).await,
        "We couldn't load your orders. Please try again.",
    )?;
    Ok(Json(
        orders.map(|orders| orders.into_iter().map(OrderView::from).collect()),
    ))
}

/// Cancel an order.
#[instrument(skip(state, customer))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>> {
    let order = state.backend().cancel_order(&customer.token, &id).await?;
    add_breadcrumb(
        "orders",
        "Cancelled order",
        Some(&[("order_id", id.as_str())]),
    );
    Ok(Json(OrderView::from(order)))
}

/// Request a return.
#[instrument(skip(state, customer))]
pub async fn request_return(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>> {
    let order = state.backend().return_order(&customer.token, &id).await?;
    add_breadcrumb(
        "orders",
        "Requested return",
        Some(&[("order_id", id.as_str())]),
    );
    Ok(Json(OrderView::from(order)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use neoshop_core::{Money, OrderStatus};

    use super::*;

    #[test]
    fn test_order_view_flags() {
        let order = Order {
            id: OrderId::new("ord_1"),
            status: OrderStatus::Delivered,
            placed_at: Utc::now(),
            total: Money::from_cents(1000),
            lines: Vec::new(),
        };

        let json = serde_json::to_value(OrderView::from(order)).unwrap();
        assert_eq!(json["id"], "ord_1");
        assert_eq!(json["status"], "delivered");
        assert_eq!(json["canCancel"], false);
        assert_eq!(json["canReturn"], true);
    }
}
