use crate::models::{ItemCategory, LineItem, TotalsBreakdown};

/// Compute the itemized breakdown for a set of line items.
///
/// Pure and deterministic, so the composition form can call it on every
/// keystroke for live recalculation. Lines with a blank description are
/// skipped. Assumes quantities and rates are already-validated finite
/// numbers; only the tax rate is sanitized here.
pub fn compute_totals(
    items: &[LineItem],
    tax_rate: f64,
    senior_discount: bool,
    veteran_discount: bool,
) -> TotalsBreakdown {
    let tax_rate = if tax_rate.is_finite() { tax_rate } else { 0.0 };

    if items.is_empty() {
        return TotalsBreakdown::zero(tax_rate);
    }

    let mut labor_total = 0.0;
    let mut materials_total = 0.0;
    for item in items.iter().filter(|i| i.is_billable()) {
        match item.category {
            ItemCategory::Labor => labor_total += item.amount(),
            ItemCategory::Materials => materials_total += item.amount(),
        }
    }

    let subtotal = labor_total + materials_total;
    let tax = subtotal * tax_rate;
    let total_before_discounts = subtotal + tax;

    // The senior discount comes off the post-tax total; the veteran
    // discount comes off labor only, pre-tax. Both are subtracted from
    // the same base rather than compounding.
    let senior_savings = if senior_discount {
        total_before_discounts * 0.10
    } else {
        0.0
    };
    let veteran_savings = if veteran_discount {
        labor_total * 0.15
    } else {
        0.0
    };

    let total_due = (total_before_discounts - senior_savings - veteran_savings).max(0.0);

    TotalsBreakdown {
        labor_total,
        materials_total,
        subtotal,
        tax_rate,
        tax,
        total_before_discounts,
        senior_savings,
        veteran_savings,
        total_due,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labor(desc: &str, qty: f64, rate: f64) -> LineItem {
        LineItem::new(ItemCategory::Labor, desc.to_string(), qty, rate)
    }

    fn materials(desc: &str, qty: f64, rate: f64) -> LineItem {
        LineItem::new(ItemCategory::Materials, desc.to_string(), qty, rate)
    }

    #[test]
    fn empty_items_yield_all_zero_breakdown() {
        let b = compute_totals(&[], 0.06, true, true);
        assert_eq!(b, TotalsBreakdown::zero(0.06));
    }

    #[test]
    fn non_finite_tax_rate_is_treated_as_zero() {
        let b = compute_totals(&[], f64::NAN, false, false);
        assert_eq!(b.tax_rate, 0.0);
        let b = compute_totals(&[labor("Mowing", 1.0, 40.0)], f64::INFINITY, false, false);
        assert_eq!(b.tax_rate, 0.0);
        assert_eq!(b.tax, 0.0);
        assert_eq!(b.total_due, 40.0);
    }

    #[test]
    fn worked_example_with_veteran_discount() {
        let items = [labor("Mowing", 2.0, 50.0), materials("Mulch", 1.0, 30.0)];
        let b = compute_totals(&items, 0.06, false, true);
        assert_eq!(b.labor_total, 100.0);
        assert_eq!(b.materials_total, 30.0);
        assert_eq!(b.subtotal, 130.0);
        assert!((b.tax - 7.80).abs() < 1e-9);
        assert!((b.total_before_discounts - 137.80).abs() < 1e-9);
        assert_eq!(b.senior_savings, 0.0);
        assert_eq!(b.veteran_savings, 15.0);
        assert!((b.total_due - 122.80).abs() < 1e-9);
    }

    #[test]
    fn subtotal_is_exactly_labor_plus_materials() {
        let items = [
            labor("Edge trim", 1.5, 33.33),
            materials("Seed", 2.0, 12.49),
            labor("Leaf removal", 0.75, 60.0),
        ];
        let b = compute_totals(&items, 0.06, false, false);
        assert_eq!(b.subtotal, b.labor_total + b.materials_total);
    }

    #[test]
    fn discounts_apply_to_independent_bases() {
        let items = [labor("Mowing", 2.0, 50.0), materials("Mulch", 1.0, 30.0)];
        let b = compute_totals(&items, 0.06, true, true);
        assert_eq!(b.senior_savings, b.total_before_discounts * 0.10);
        assert_eq!(b.veteran_savings, b.labor_total * 0.15);

        // Each discount is unchanged by the presence of the other.
        let senior_only = compute_totals(&items, 0.06, true, false);
        let veteran_only = compute_totals(&items, 0.06, false, true);
        assert_eq!(b.senior_savings, senior_only.senior_savings);
        assert_eq!(b.veteran_savings, veteran_only.veteran_savings);
    }

    #[test]
    fn total_due_is_clamped_at_zero() {
        // Zero tax, all labor: senior 10% + veteran 15% leaves a positive
        // total, so force the clamp with a negative-rate edge instead.
        let items = [labor("Mowing", 1.0, 100.0)];
        let b = compute_totals(&items, -2.0, true, true);
        assert!(b.total_before_discounts < 0.0);
        assert_eq!(b.total_due, 0.0);
    }

    #[test]
    fn blank_description_lines_do_not_count() {
        let items = [labor("", 5.0, 100.0), labor("Mowing", 1.0, 40.0)];
        let b = compute_totals(&items, 0.0, false, false);
        assert_eq!(b.subtotal, 40.0);
    }

    #[test]
    fn recomputation_is_deterministic() {
        let items = [labor("Mowing", 2.0, 50.0), materials("Mulch", 3.0, 9.99)];
        let first = compute_totals(&items, 0.06, true, false);
        let second = compute_totals(&items, 0.06, true, false);
        assert_eq!(first, second);
    }
}
