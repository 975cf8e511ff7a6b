//! # Courier Settlement
//!
//! What a courier hands in at the end of the day, split by payment method.
//!
//! ```text
//!   efectivo        Σ amount
//! + transferencia   Σ amount + 10%
//! + tarjeta         Σ amount + 10%
//! - extra expense   (fuel, tolls)
//! ─────────────────────────────────
//! = net
//! ```
//! Orders without a payment method contribute nothing and are counted apart.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{order_amount_with, Money, SurchargeRate};
use crate::types::{DateKey, Order, PaymentMethod};

/// One delivered order as it appears on the settlement sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettlementLine {
    pub order_id: String,
    pub customer_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub payment_method: PaymentMethod,
    /// Amount including the surcharge when it applies.
    pub amount: Money,
}

/// A courier's money settlement for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CourierSettlement {
    pub courier: String,
    #[ts(as = "String")]
    pub date_key: DateKey,
    pub cash_total: Money,
    pub transfer_total: Money,
    pub card_total: Money,
    /// Delivered orders with no payment method recorded yet.
    pub unpaid_orders: u32,
    pub extra_expense: Money,
    pub net_total: Money,
    pub lines: Vec<SettlementLine>,
}

impl CourierSettlement {
    /// Builds the settlement from a courier's orders. Undelivered ones are skipped.
    pub fn from_orders<'a, I>(
        courier: impl Into<String>,
        date_key: DateKey,
        orders: I,
        extra_expense: Money,
        rate: SurchargeRate,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Order>,
    {
        let mut settlement = CourierSettlement {
            courier: courier.into(),
            date_key,
            cash_total: Money::zero(),
            transfer_total: Money::zero(),
            card_total: Money::zero(),
            unpaid_orders: 0,
            extra_expense,
            net_total: Money::zero(),
            lines: Vec::new(),
        };

        for order in orders.into_iter().filter(|o| o.delivered) {
            let amount = order_amount_with(order, rate);
            match order.payment_method {
                PaymentMethod::Cash => settlement.cash_total += amount,
                PaymentMethod::Transfer => settlement.transfer_total += amount,
                PaymentMethod::Card => settlement.card_total += amount,
                PaymentMethod::Unspecified => settlement.unpaid_orders += 1,
            }
            settlement.lines.push(SettlementLine {
                order_id: order.id.clone(),
                customer_name: order.customer_name.clone(),
                address: order.address.clone(),
                phone: order.phone.clone(),
                payment_method: order.payment_method,
                amount,
            });
        }

        settlement.net_total = settlement.collected() - extra_expense;
        settlement
    }

    /// Σ of the three payment buckets, before expenses.
    pub fn collected(&self) -> Money {
        self.cash_total + self.transfer_total + self.card_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn paid(id: &str, total: i64, method: PaymentMethod) -> Order {
        let mut order = Order::new(id, Utc::now());
        order.delivered = true;
        order.assigned_to = vec!["r1".into()];
        order.summary_text = Some(format!("A x1 (${total}) | TOTAL: ${total}"));
        order.payment_method = method;
        order
    }

    #[test]
    fn test_settlement_buckets_and_net() {
        let mut undelivered = paid("o-5", 9999, PaymentMethod::Cash);
        undelivered.delivered = false;

        let orders = vec![
            paid("o-1", 1000, PaymentMethod::Cash),
            paid("o-2", 1000, PaymentMethod::Transfer),
            paid("o-3", 2000, PaymentMethod::Card),
            paid("o-4", 500, PaymentMethod::Unspecified),
            undelivered,
        ];

        let settlement = CourierSettlement::from_orders(
            "r1",
            DateKey::parse("2024-06-01").unwrap(),
            &orders,
            Money::from_units(300),
            SurchargeRate::default(),
        );

        assert_eq!(settlement.cash_total.units(), 1000);
        assert_eq!(settlement.transfer_total.units(), 1100);
        assert_eq!(settlement.card_total.units(), 2200);
        assert_eq!(settlement.unpaid_orders, 1);
        assert_eq!(settlement.collected().units(), 4300);
        assert_eq!(settlement.net_total.units(), 4000);
        assert_eq!(settlement.lines.len(), 4);
        assert_eq!(settlement.lines[3].amount.units(), 500);
    }

    #[test]
    fn test_net_may_go_negative() {
        let settlement = CourierSettlement::from_orders(
            "r1",
            DateKey::parse("2024-06-01").unwrap(),
            std::iter::empty::<&Order>(),
            Money::from_units(150),
            SurchargeRate::default(),
        );
        assert_eq!(settlement.net_total.units(), -150);
        assert!(settlement.lines.is_empty());
    }
}
