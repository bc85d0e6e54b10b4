/*
[INPUT]:  Order ticket fields entered by the operator
[OUTPUT]: OrderRequestFromUi commands on the SubmitNewOrder topic
[POS]:    View component - manual order entry form
[UPDATE]: When order ticket fields or validation change
*/

use anyhow::{Result, bail};
use rust_decimal::Decimal;
use tracing::info;
use tribeca_messaging::topics::SUBMIT_NEW_ORDER;
use tribeca_messaging::{
    OrderRequestFromUi, OrderType, Publisher, PublisherFactory, Side, TimeInForce,
};

/// Manual order ticket.
///
/// Price and quantity start empty; side, time in force and order type start
/// at the first option of each list.
#[derive(Debug, Clone)]
pub struct DisplayOrder {
    pub side: Side,
    pub price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub order_type: OrderType,
    publisher: Publisher<OrderRequestFromUi>,
}

impl DisplayOrder {
    pub fn new(publishers: &PublisherFactory) -> Self {
        Self {
            side: Side::ALL[0],
            price: None,
            quantity: None,
            time_in_force: TimeInForce::ALL[0],
            order_type: OrderType::ALL[0],
            publisher: publishers.get_publisher(SUBMIT_NEW_ORDER),
        }
    }

    pub fn available_sides(&self) -> &'static [&'static str] {
        Side::VARIANTS
    }

    pub fn available_tifs(&self) -> &'static [&'static str] {
        TimeInForce::VARIANTS
    }

    pub fn available_order_types(&self) -> &'static [&'static str] {
        OrderType::VARIANTS
    }

    /// Build the request from the current ticket.
    pub fn request(&self) -> Result<OrderRequestFromUi> {
        let Some(price) = self.price else {
            bail!("order price is required");
        };
        let Some(quantity) = self.quantity else {
            bail!("order quantity is required");
        };
        if quantity <= Decimal::ZERO {
            bail!("order quantity must be positive, got {quantity}");
        }
        if price < Decimal::ZERO {
            bail!("order price must not be negative, got {price}");
        }

        Ok(OrderRequestFromUi {
            side: self.side,
            price,
            quantity,
            time_in_force: self.time_in_force,
            order_type: self.order_type,
        })
    }

    /// Publish the ticket. Returns whether the command reached the transport.
    pub fn submit(&self) -> Result<bool> {
        let request = self.request()?;
        info!(
            side = %request.side,
            price = %request.price,
            quantity = %request.quantity,
            tif = %request.time_in_force,
            order_type = %request.order_type,
            "submitting order"
        );
        Ok(self.publisher.send(&request))
    }
}
