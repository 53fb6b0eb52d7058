//! Cart and order pricing domain service.

use serde::Serialize;

use crate::config::StoreSettings;
use crate::domain::entities::{Product, ProductKind};
use crate::domain::value_objects::money::apply_basis_points;

/// One line to be priced.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLine {
    pub product_id: i64,
    pub kind: ProductKind,
    pub unit_price_cents: i64,
    pub member_price_cents: Option<i64>,
    pub quantity: i32,
}

impl PriceLine {
    pub fn from_product(product: &Product, quantity: i32) -> Self {
        Self {
            product_id: product.id,
            kind: product.kind,
            unit_price_cents: product.price_cents,
            member_price_cents: product.member_price_cents,
            quantity,
        }
    }

    /// Unit price after member pricing.
    pub fn effective_unit_price(&self, context: PricingContext) -> i64 {
        match self.member_price_cents {
            Some(member) if context.is_member && member < self.unit_price_cents => member,
            _ => self.unit_price_cents,
        }
    }
}

/// Who is buying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PricingContext {
    /// Customer owns an active subscription
    pub is_member: bool,
}

/// Store-wide rules applied on top of line prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingRules {
    pub tax_rate_bps: u32,
    pub flat_shipping_cents: i64,
    /// 0 disables free shipping
    pub free_shipping_threshold_cents: i64,
}

impl From<&StoreSettings> for PricingRules {
    fn from(store: &StoreSettings) -> Self {
        Self {
            tax_rate_bps: store.tax_rate_bps,
            flat_shipping_cents: store.flat_shipping_cents,
            free_shipping_threshold_cents: store.free_shipping_threshold_cents,
        }
    }
}

/// Computed totals, all in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal_cents: i64,
    pub member_savings_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Domain service for cart and order totals.
pub struct PricingService;

impl PricingService {
    /// Price a set of lines.
    pub fn calculate_totals(
        lines: &[PriceLine],
        context: PricingContext,
        rules: PricingRules,
    ) -> CartTotals {
        if lines.is_empty() {
            return CartTotals::default();
        }

        let mut subtotal = 0i64;
        let mut savings = 0i64;
        for line in lines {
            let quantity = i64::from(line.quantity);
            let effective = line.effective_unit_price(context);
            subtotal += effective * quantity;
            savings += (line.unit_price_cents - effective) * quantity;
        }

        let shipping = Self::shipping_for(lines, subtotal, rules);
        let tax = apply_basis_points(subtotal, rules.tax_rate_bps);

        CartTotals {
            subtotal_cents: subtotal,
            member_savings_cents: savings,
            shipping_cents: shipping,
            tax_cents: tax,
            total_cents: subtotal + shipping + tax,
        }
    }

    fn shipping_for(lines: &[PriceLine], subtotal: i64, rules: PricingRules) -> i64 {
        let has_physical = lines.iter().any(|line| line.kind == ProductKind::Physical);
        if !has_physical {
            return 0;
        }
        if rules.free_shipping_threshold_cents > 0 && subtotal >= rules.free_shipping_threshold_cents
        {
            return 0;
        }
        rules.flat_shipping_cents
    }
}
