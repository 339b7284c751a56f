//! Limit price band checks applied at submission.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::order_lifecycle::errors::OrderError;
use crate::domain::order_lifecycle::value_objects::{OrderSide, OrderType};
use crate::domain::shared::Price;

/// Accepted band for limit prices relative to the current market price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSanityPolicy {
    /// Maximum `|price - market| / market`.
    pub max_deviation: Decimal,
    /// Buy limits above `market * buy_limit_ceiling` are rejected.
    pub buy_limit_ceiling: Decimal,
    /// Sell limits below `market * sell_limit_floor` are rejected.
    pub sell_limit_floor: Decimal,
}

impl Default for PriceSanityPolicy {
    fn default() -> Self {
        Self {
            max_deviation: dec!(0.10),
            buy_limit_ceiling: dec!(1.05),
            sell_limit_floor: dec!(0.95),
        }
    }
}

impl PriceSanityPolicy {
    /// Check a requested price against the market.
    ///
    /// Orders without a limit price pass unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `PriceOutOfRange` if the price leaves the band.
    pub fn check(
        &self,
        order_type: OrderType,
        side: OrderSide,
        price: Option<Price>,
        market_price: Price,
    ) -> Result<(), OrderError> {
        let Some(price) = price else {
            return Ok(());
        };
        if !order_type.has_limit_price() {
            return Ok(());
        }
        let market = market_price.amount();
        if market <= Decimal::ZERO {
            return Err(OrderError::InvalidParameters {
                field: "market_price".to_string(),
                message: "Market price must be positive".to_string(),
            });
        }

        let limit = price.amount();
        let out_of_range = |reason: String| OrderError::PriceOutOfRange {
            price: limit.to_string(),
            market_price: market.to_string(),
            reason,
        };

        let deviation = (limit - market).abs() / market;
        if deviation > self.max_deviation {
            return Err(out_of_range(format!(
                "deviation {} exceeds {}",
                deviation.round_dp(4),
                self.max_deviation
            )));
        }

        match side {
            OrderSide::Buy if limit > market * self.buy_limit_ceiling => Err(out_of_range(
                format!("buy limit above {}x market", self.buy_limit_ceiling),
            )),
            OrderSide::Sell if limit < market * self.sell_limit_floor => Err(out_of_range(
                format!("sell limit below {}x market", self.sell_limit_floor),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn check(order_type: OrderType, side: OrderSide, price: Decimal) -> Result<(), OrderError> {
        PriceSanityPolicy::default().check(
            order_type,
            side,
            Some(Price::new(price)),
            Price::new(dec!(150.00)),
        )
    }

    #[test_case(OrderSide::Buy, dec!(150.50) ; "buy slightly above")]
    #[test_case(OrderSide::Buy, dec!(157.50) ; "buy at ceiling")]
    #[test_case(OrderSide::Buy, dec!(140.00) ; "buy below market")]
    #[test_case(OrderSide::Sell, dec!(142.50) ; "sell at floor")]
    #[test_case(OrderSide::Sell, dec!(160.00) ; "sell above market")]
    fn accepted_prices(side: OrderSide, price: Decimal) {
        assert!(check(OrderType::Limit, side, price).is_ok());
    }

    #[test_case(OrderSide::Buy, dec!(200.00) ; "far above")]
    #[test_case(OrderSide::Buy, dec!(158.00) ; "buy above ceiling")]
    #[test_case(OrderSide::Sell, dec!(142.00) ; "sell below floor")]
    #[test_case(OrderSide::Sell, dec!(100.00) ; "far below")]
    fn rejected_prices(side: OrderSide, price: Decimal) {
        assert!(matches!(
            check(OrderType::Limit, side, price),
            Err(OrderError::PriceOutOfRange { .. })
        ));
    }

    #[test]
    fn stop_limit_is_checked() {
        assert!(check(OrderType::StopLimit, OrderSide::Buy, dec!(200)).is_err());
    }

    #[test]
    fn stop_loss_trigger_is_not_banded() {
        assert!(check(OrderType::StopLoss, OrderSide::Sell, dec!(100)).is_ok());
    }

    #[test]
    fn market_orders_pass() {
        let policy = PriceSanityPolicy::default();
        assert!(
            policy
                .check(OrderType::Market, OrderSide::Buy, None, Price::new(dec!(150)))
                .is_ok()
        );
    }
}
