use super::classify::Bucket;
use super::fifo::Sale;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals of one Verlusttopf for a year
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketTotals {
    pub sale_count: usize,
    pub total_pnl: Decimal,
    pub total_proceeds: Decimal,
    pub total_cost_basis: Decimal,
    pub warning_count: usize,
}

impl BucketTotals {
    fn add(&mut self, sale: &Sale) {
        self.sale_count += 1;
        self.total_pnl += sale.pnl;
        self.total_proceeds += sale.proceeds;
        self.total_cost_basis += sale.cost_basis;
        if sale.has_warning() {
            self.warning_count += 1;
        }
    }
}

/// Sales realized in one tax year, grouped by bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearReport {
    pub year: i32,
    pub totals: BTreeMap<Bucket, BucketTotals>,
    pub details: Vec<Sale>,
}

impl YearReport {
    /// Totals for a bucket, zero when it had no sales
    pub fn bucket(&self, bucket: Bucket) -> BucketTotals {
        self.totals.get(&bucket).cloned().unwrap_or_default()
    }

    pub fn total_pnl(&self) -> Decimal {
        self.totals.values().map(|t| t.total_pnl).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.totals.values().map(|t| t.warning_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Sale> {
        self.details.iter().filter(|s| s.has_warning())
    }
}

/// Keep sales of `year` (by sell date) and sum them per bucket.
pub fn aggregate(sales: &[Sale], year: i32) -> YearReport {
    let details: Vec<Sale> = sales.iter().filter(|s| s.year() == year).cloned().collect();
    let mut totals: BTreeMap<Bucket, BucketTotals> = BTreeMap::new();
    for sale in &details {
        totals.entry(sale.bucket).or_default().add(sale);
    }
    log::debug!(
        "Aggregated {} of {} sales for {}",
        details.len(),
        sales.len(),
        year
    );
    YearReport {
        year,
        totals,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::parse_datetime;
    use crate::core::warnings::Warning;
    use rust_decimal_macros::dec;

    fn sale(date: &str, bucket: Bucket, proceeds: Decimal, cost: Decimal) -> Sale {
        Sale {
            instrument_id: "X".to_string(),
            name: None,
            bucket,
            sell_timestamp: parse_datetime(date).unwrap(),
            quantity: dec!(1),
            proceeds,
            cost_basis: cost,
            pnl: proceeds - cost,
            warning: None,
        }
    }

    fn warned(mut s: Sale) -> Sale {
        s.warning = Some(Warning::InsufficientCostBasis {
            instrument_id: s.instrument_id.clone(),
            unmatched: s.quantity,
        });
        s
    }

    fn sample() -> Vec<Sale> {
        vec![
            sale("2024-12-31T23:00:00+00:00", Bucket::Stock, dec!(100), dec!(50)),
            sale("2025-01-02", Bucket::Stock, dec!(200), dec!(150)),
            sale("2025-02-01", Bucket::Stock, dec!(80), dec!(100)),
            warned(sale("2025-03-01", Bucket::Other, dec!(30), dec!(0))),
            sale("2025-04-01", Bucket::Other, dec!(10), dec!(40)),
        ]
    }

    #[test]
    fn totals_grouped_by_bucket() {
        let report = aggregate(&sample(), 2025);
        let stock = report.bucket(Bucket::Stock);
        assert_eq!(stock.sale_count, 2);
        assert_eq!(stock.total_proceeds, dec!(280));
        assert_eq!(stock.total_cost_basis, dec!(250));
        assert_eq!(stock.total_pnl, dec!(30));
        assert_eq!(stock.warning_count, 0);

        let other = report.bucket(Bucket::Other);
        assert_eq!(other.sale_count, 2);
        assert_eq!(other.total_pnl, dec!(0));
        assert_eq!(other.warning_count, 1);

        assert_eq!(report.total_pnl(), dec!(30));
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn other_years_excluded() {
        let report = aggregate(&sample(), 2024);
        assert_eq!(report.details.len(), 1);
        assert_eq!(report.bucket(Bucket::Stock).total_pnl, dec!(50));
        assert_eq!(report.bucket(Bucket::Other), BucketTotals::default());

        let report = aggregate(&sample(), 2025);
        assert!(report.details.iter().all(|s| s.year() == 2025));
    }

    #[test]
    fn empty_year_is_not_an_error() {
        let report = aggregate(&sample(), 2030);
        assert!(report.is_empty());
        assert!(report.totals.is_empty());
        assert_eq!(report.total_pnl(), Decimal::ZERO);
        assert_eq!(aggregate(&[], 2025).warning_count(), 0);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let sales = sample();
        let first = aggregate(&sales, 2025);
        let second = aggregate(&sales, 2025);
        assert_eq!(first, second);
        assert_eq!(sales, sample());
    }

    #[test]
    fn details_keep_input_order() {
        let report = aggregate(&sample(), 2025);
        let dates: Vec<_> = report.details.iter().map(|s| s.date().to_string()).collect();
        assert_eq!(dates, ["2025-01-02", "2025-02-01", "2025-03-01", "2025-04-01"]);
    }
}
