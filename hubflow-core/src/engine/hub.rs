//! Stage 1: free supply at the hub.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::{HubInventoryFact, ProductId};

/// Σ(stock − reserved − in_transit) per product over rows dated `run_date`.
///
/// Products without a row on that date are absent. Negative totals are kept;
/// the matcher is what drops non-positive supply.
pub fn aggregate_hub_availability(
    facts: &[HubInventoryFact],
    run_date: NaiveDate,
) -> BTreeMap<ProductId, f64> {
    let mut out = BTreeMap::new();
    for fact in facts.iter().filter(|f| f.date == run_date) {
        *out.entry(fact.product_id).or_insert(0.0) += fact.available();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(product: u128, date: NaiveDate, stock: f64, reserved: f64) -> HubInventoryFact {
        HubInventoryFact {
            product_id: ProductId::from_u128(product),
            date,
            stock,
            reserved,
            in_transit: 0.0,
        }
    }

    #[test]
    fn sums_duplicates_and_ignores_other_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let other = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let facts = vec![
            fact(1, d, 50.0, 10.0),
            fact(1, d, 30.0, 0.0),
            fact(1, other, 1000.0, 0.0),
            fact(2, d, 5.0, 20.0),
        ];
        let avail = aggregate_hub_availability(&facts, d);
        assert_eq!(avail[&ProductId::from_u128(1)], 70.0);
        assert_eq!(avail[&ProductId::from_u128(2)], -15.0);
        assert_eq!(avail.len(), 2);
    }

    #[test]
    fn no_rows_means_absent() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(aggregate_hub_availability(&[], d).is_empty());
    }
}
