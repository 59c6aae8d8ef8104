use super::classify::{Bucket, Classifier};
use super::transaction::{Side, Transaction, TransactionError};
use super::warnings::Warning;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Open (partially) unconsumed purchase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    pub instrument_id: String,
    pub remaining_quantity: Decimal,
    /// Cost basis per unit, acquisition fees included
    pub unit_cost: Decimal,
    pub acquired: DateTime<FixedOffset>,
}

impl Lot {
    fn from_buy(tx: &Transaction) -> Self {
        Lot {
            instrument_id: tx.instrument_id.clone(),
            remaining_quantity: tx.quantity,
            unit_cost: (tx.gross() + tx.fees) / tx.quantity,
            acquired: tx.timestamp,
        }
    }

    pub fn remaining_cost(&self) -> Decimal {
        self.remaining_quantity * self.unit_cost
    }
}

/// FIFO queue and metadata for one instrument
#[derive(Debug, Default)]
struct Position {
    lots: VecDeque<Lot>,
    instrument_type: Option<String>,
    name: Option<String>,
    last_seen: Option<DateTime<FixedOffset>>,
}

impl Position {
    fn observe(&mut self, tx: &Transaction) {
        if let Some(tag) = tx.type_tag() {
            self.instrument_type = Some(tag.to_string());
        }
        if let Some(name) = tx.name.as_ref().filter(|n| !n.trim().is_empty()) {
            self.name = Some(name.clone());
        }
        match self.last_seen {
            Some(last) if tx.timestamp < last => {
                log::warn!(
                    "Transactions for {} are out of order: {} after {}",
                    tx.instrument_id,
                    tx.timestamp,
                    last
                );
            }
            _ => self.last_seen = Some(tx.timestamp),
        }
    }
}

/// One realized disposal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sale {
    pub instrument_id: String,
    pub name: Option<String>,
    pub bucket: Bucket,
    pub sell_timestamp: DateTime<FixedOffset>,
    pub quantity: Decimal,
    /// Sale value net of fees
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub pnl: Decimal,
    pub warning: Option<Warning>,
}

impl Sale {
    pub fn date(&self) -> NaiveDate {
        self.sell_timestamp.date_naive()
    }

    pub fn year(&self) -> i32 {
        self.sell_timestamp.year()
    }

    pub fn has_warning(&self) -> bool {
        self.warning.is_some()
    }
}

/// A transaction rejected before reaching the FIFO queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTransaction {
    /// Position in the input sequence
    pub index: usize,
    pub instrument_id: String,
    pub error: TransactionError,
}

#[derive(Debug, Default)]
pub struct LedgerOutcome {
    pub sales: Vec<Sale>,
    pub skipped: Vec<SkippedTransaction>,
}

/// Remaining open position of an instrument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub instrument_id: String,
    pub name: Option<String>,
    pub bucket: Bucket,
    pub quantity: Decimal,
    pub cost: Decimal,
    pub lots: usize,
    /// Acquisition time of the oldest open lot
    pub since: DateTime<FixedOffset>,
}

/// Per-instrument FIFO lot matching
#[derive(Debug, Default)]
pub struct Ledger {
    classifier: Classifier,
    positions: BTreeMap<String, Position>,
}

impl Ledger {
    pub fn new(classifier: Classifier) -> Self {
        Ledger {
            classifier,
            positions: BTreeMap::new(),
        }
    }

    /// Validate and apply transactions in the given order.
    ///
    /// Transactions are expected sorted by timestamp within each instrument.
    /// Invalid records are skipped and reported, they never abort the run.
    pub fn process(&mut self, transactions: &[Transaction]) -> LedgerOutcome {
        let mut outcome = LedgerOutcome::default();
        for (index, tx) in transactions.iter().enumerate() {
            if let Err(error) = tx.validate() {
                log::warn!(
                    "Skipping transaction #{} ({} {}): {}",
                    index,
                    tx.side,
                    tx.instrument_id,
                    error
                );
                outcome.skipped.push(SkippedTransaction {
                    index,
                    instrument_id: tx.instrument_id.clone(),
                    error,
                });
                continue;
            }
            match tx.side {
                Side::Buy => self.apply_buy(tx),
                Side::Sell => outcome.sales.extend(self.apply_sell(tx)),
            }
        }
        outcome
    }

    /// Append a lot for a buy. Non-positive quantities are ignored; use
    /// [`Ledger::process`] to have them reported.
    pub fn apply_buy(&mut self, tx: &Transaction) {
        if tx.quantity <= Decimal::ZERO {
            log::warn!("Ignoring buy of {} with quantity {}", tx.instrument_id, tx.quantity);
            return;
        }
        let position = self.positions.entry(tx.instrument_id.clone()).or_default();
        position.observe(tx);
        let lot = Lot::from_buy(tx);
        log::debug!(
            "Lot {} ADD: qty={}, unit_cost={}. Open lots: {}",
            lot.instrument_id,
            lot.remaining_quantity,
            lot.unit_cost,
            position.lots.len() + 1
        );
        position.lots.push_back(lot);
    }

    /// Match a sell against the oldest open lots.
    ///
    /// Any quantity not covered by open lots is booked at zero cost basis
    /// and flagged with [`Warning::InsufficientCostBasis`]. Non-positive
    /// quantities are ignored and yield no sale.
    pub fn apply_sell(&mut self, tx: &Transaction) -> Option<Sale> {
        if tx.quantity <= Decimal::ZERO {
            log::warn!("Ignoring sell of {} with quantity {}", tx.instrument_id, tx.quantity);
            return None;
        }
        let position = self.positions.entry(tx.instrument_id.clone()).or_default();
        position.observe(tx);

        let mut remaining = tx.quantity;
        let mut cost_basis = Decimal::ZERO;
        while remaining > Decimal::ZERO {
            let Some(lot) = position.lots.front_mut() else {
                break;
            };
            let take = remaining.min(lot.remaining_quantity);
            cost_basis += take * lot.unit_cost;
            lot.remaining_quantity -= take;
            remaining -= take;
            log::debug!(
                "Lot {} CONSUME: qty={} at unit_cost={}. Lot remaining: {}",
                lot.instrument_id,
                take,
                lot.unit_cost,
                lot.remaining_quantity
            );
            if lot.remaining_quantity <= Decimal::ZERO {
                position.lots.pop_front();
            }
        }

        let warning = if remaining > Decimal::ZERO {
            log::warn!(
                "Insufficient holdings for {}: {} units sold on {} assumed at zero cost basis",
                tx.instrument_id,
                remaining,
                tx.timestamp.date_naive()
            );
            Some(Warning::InsufficientCostBasis {
                instrument_id: tx.instrument_id.clone(),
                unmatched: remaining,
            })
        } else {
            None
        };

        let proceeds = tx.gross() - tx.fees;
        Some(Sale {
            instrument_id: tx.instrument_id.clone(),
            name: position.name.clone(),
            bucket: self.classifier.classify(position.instrument_type.as_deref()),
            sell_timestamp: tx.timestamp,
            quantity: tx.quantity,
            proceeds,
            cost_basis,
            pnl: proceeds - cost_basis,
            warning,
        })
    }

    /// Open lots of an instrument, oldest first
    pub fn open_lots<'a>(&'a self, instrument_id: &str) -> impl Iterator<Item = &'a Lot> + 'a {
        self.positions
            .get(instrument_id)
            .into_iter()
            .flat_map(|p| p.lots.iter())
    }

    /// Instruments with open lots, ordered by instrument id
    pub fn holdings(&self) -> Vec<Holding> {
        self.positions
            .iter()
            .filter_map(|(id, p)| p.lots.front().map(|oldest| (id, p, oldest.acquired)))
            .map(|(id, p, since)| Holding {
                instrument_id: id.clone(),
                name: p.name.clone(),
                bucket: self.classifier.classify(p.instrument_type.as_deref()),
                quantity: p.lots.iter().map(|l| l.remaining_quantity).sum(),
                cost: p.lots.iter().map(Lot::remaining_cost).sum(),
                lots: p.lots.len(),
                since,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::parse_datetime;
    use rust_decimal_macros::dec;

    fn order(side: Side, date: &str, id: &str, qty: Decimal, price: Decimal) -> Transaction {
        Transaction {
            instrument_id: id.to_string(),
            instrument_type: None,
            name: None,
            side,
            timestamp: parse_datetime(date).unwrap(),
            quantity: qty,
            unit_price: price,
            fees: Decimal::ZERO,
        }
    }

    fn buy(date: &str, id: &str, qty: Decimal, price: Decimal) -> Transaction {
        order(Side::Buy, date, id, qty, price)
    }

    fn sell(date: &str, id: &str, qty: Decimal, price: Decimal) -> Transaction {
        order(Side::Sell, date, id, qty, price)
    }

    fn with_fees(mut tx: Transaction, fees: Decimal) -> Transaction {
        tx.fees = fees;
        tx
    }

    fn with_type(mut tx: Transaction, tag: &str) -> Transaction {
        tx.instrument_type = Some(tag.to_string());
        tx
    }

    fn run(transactions: &[Transaction]) -> (Ledger, LedgerOutcome) {
        let mut ledger = Ledger::default();
        let outcome = ledger.process(transactions);
        (ledger, outcome)
    }

    #[test]
    fn oldest_lots_consumed_first() {
        let (_, outcome) = run(&[
            buy("2024-01-01", "A", dec!(10), dec!(100)),
            buy("2024-02-01", "A", dec!(10), dec!(200)),
            sell("2024-03-01", "A", dec!(12), dec!(250)),
        ]);
        let sale = &outcome.sales[0];
        assert_eq!(sale.cost_basis, dec!(1400));
        assert_eq!(sale.proceeds, dec!(3000));
        assert_eq!(sale.pnl, dec!(1600));
        assert!(!sale.has_warning());
    }

    #[test]
    fn oversell_books_unmatched_at_zero_cost() {
        let (ledger, outcome) = run(&[
            buy("2024-01-01", "A", dec!(5), dec!(50)),
            sell("2024-03-01", "A", dec!(8), dec!(60)),
        ]);
        let sale = &outcome.sales[0];
        assert_eq!(sale.cost_basis, dec!(250));
        assert_eq!(sale.proceeds, dec!(480));
        assert_eq!(sale.pnl, dec!(230));
        assert_eq!(
            sale.warning,
            Some(Warning::InsufficientCostBasis {
                instrument_id: "A".to_string(),
                unmatched: dec!(3),
            })
        );
        assert_eq!(ledger.open_lots("A").count(), 0);
    }

    #[test]
    fn sell_without_history_has_zero_cost() {
        let (_, outcome) = run(&[sell("2024-03-01", "A", dec!(2), dec!(12))]);
        let sale = &outcome.sales[0];
        assert_eq!(sale.cost_basis, Decimal::ZERO);
        assert_eq!(sale.pnl, dec!(24));
        assert!(sale.has_warning());
    }

    #[test]
    fn end_to_end_scenario() {
        let (ledger, outcome) = run(&[
            buy("2020-01-01", "X", dec!(10), dec!(10)),
            buy("2020-06-01", "X", dec!(10), dec!(20)),
            sell("2021-03-01", "X", dec!(15), dec!(30)),
        ]);
        assert_eq!(outcome.sales.len(), 1);
        let sale = &outcome.sales[0];
        assert_eq!(sale.proceeds, dec!(450));
        assert_eq!(sale.cost_basis, dec!(200));
        assert_eq!(sale.pnl, dec!(250));
        assert_eq!(sale.bucket, Bucket::Stock);
        assert_eq!(sale.warning, None);
        assert_eq!(sale.year(), 2021);

        let lots: Vec<_> = ledger.open_lots("X").collect();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].remaining_quantity, dec!(5));
        assert_eq!(lots[0].unit_cost, dec!(20));
    }

    #[test]
    fn fees_in_cost_basis_and_proceeds() {
        let (_, outcome) = run(&[
            with_fees(buy("2024-01-01", "A", dec!(10), dec!(100)), dec!(10)),
            with_fees(sell("2024-03-01", "A", dec!(5), dec!(120)), dec!(5)),
        ]);
        let sale = &outcome.sales[0];
        assert_eq!(sale.proceeds, dec!(595));
        assert_eq!(sale.cost_basis, dec!(505));
        assert_eq!(sale.pnl, dec!(90));
    }

    #[test]
    fn exact_match_drains_all_lots() {
        let (ledger, outcome) = run(&[
            buy("2024-01-01", "A", dec!(3), dec!(10)),
            buy("2024-01-02", "A", dec!(7), dec!(20)),
            sell("2024-02-01", "A", dec!(10), dec!(25)),
            sell("2024-03-01", "A", dec!(1), dec!(25)),
        ]);
        assert_eq!(outcome.sales[0].cost_basis, dec!(170));
        assert!(!outcome.sales[0].has_warning());
        assert_eq!(outcome.sales[1].cost_basis, Decimal::ZERO);
        assert!(outcome.sales[1].has_warning());
        assert!(ledger.holdings().is_empty());
    }

    #[test]
    fn same_timestamp_buys_keep_input_order() {
        let (_, outcome) = run(&[
            buy("2024-01-01T10:00:00Z", "A", dec!(1), dec!(300)),
            buy("2024-01-01T10:00:00Z", "A", dec!(1), dec!(100)),
            sell("2024-02-01", "A", dec!(1), dec!(200)),
        ]);
        assert_eq!(outcome.sales[0].cost_basis, dec!(300));
    }

    #[test]
    fn zero_price_grant_flows_through() {
        let (_, outcome) = run(&[
            buy("2024-01-01", "A", dec!(2), dec!(0)),
            sell("2024-02-01", "A", dec!(2), dec!(10)),
        ]);
        let sale = &outcome.sales[0];
        assert_eq!(sale.cost_basis, Decimal::ZERO);
        assert_eq!(sale.pnl, dec!(20));
        assert!(!sale.has_warning());
    }

    #[test]
    fn fractional_quantities() {
        let (ledger, outcome) = run(&[
            buy("2024-01-01", "A", dec!(0.5), dec!(100)),
            buy("2024-01-02", "A", dec!(0.25), dec!(200)),
            sell("2024-02-01", "A", dec!(0.6), dec!(300)),
        ]);
        assert_eq!(outcome.sales[0].cost_basis, dec!(70));
        assert_eq!(outcome.sales[0].proceeds, dec!(180));
        let holdings = ledger.holdings();
        assert_eq!(holdings[0].quantity, dec!(0.15));
        assert_eq!(holdings[0].cost, dec!(30));
        // the first lot is drained, the partial second lot remains
        assert_eq!(holdings[0].lots, 1);
        assert_eq!(holdings[0].since, parse_datetime("2024-01-02").unwrap());
    }

    #[test]
    fn direct_non_positive_sell_is_ignored() {
        let mut ledger = Ledger::default();
        ledger.apply_buy(&buy("2024-01-01", "A", dec!(5), dec!(10)));
        assert_eq!(ledger.apply_sell(&sell("2024-02-01", "A", dec!(-2), dec!(10))), None);
        assert_eq!(ledger.apply_sell(&sell("2024-02-01", "A", dec!(0), dec!(10))), None);
        let lots: Vec<_> = ledger.open_lots("A").collect();
        assert_eq!(lots[0].remaining_quantity, dec!(5));

        let sale = ledger
            .apply_sell(&sell("2024-03-01", "A", dec!(2), dec!(15)))
            .unwrap();
        assert_eq!(sale.cost_basis, dec!(20));
    }

    #[test]
    fn bucket_uses_last_known_type() {
        let (_, outcome) = run(&[
            with_type(buy("2024-01-01", "D", dec!(2), dec!(10)), "derivative"),
            sell("2024-02-01", "D", dec!(1), dec!(15)),
            buy("2024-01-01", "S", dec!(1), dec!(30)),
            sell("2024-02-01", "S", dec!(1), dec!(50)),
        ]);
        assert_eq!(outcome.sales[0].bucket, Bucket::Other);
        assert_eq!(outcome.sales[1].bucket, Bucket::Stock);
    }

    #[test]
    fn instruments_have_separate_queues() {
        let (ledger, outcome) = run(&[
            buy("2024-01-01", "A", dec!(1), dec!(10)),
            buy("2024-01-01", "B", dec!(1), dec!(99)),
            sell("2024-02-01", "B", dec!(1), dec!(100)),
        ]);
        assert_eq!(outcome.sales[0].cost_basis, dec!(99));
        let holdings = ledger.holdings();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].instrument_id, "A");
    }

    #[test]
    fn invalid_transactions_are_skipped_and_reported() {
        let mut bad = buy("2024-01-01", "A", dec!(0), dec!(10));
        let (_, outcome) = run(&[
            bad.clone(),
            buy("2024-01-02", "A", dec!(1), dec!(10)),
            {
                bad.quantity = dec!(1);
                bad.unit_price = dec!(-1);
                bad
            },
            sell("2024-02-01", "A", dec!(1), dec!(12)),
        ]);
        assert_eq!(outcome.sales.len(), 1);
        assert!(!outcome.sales[0].has_warning());
        assert_eq!(
            outcome.skipped,
            vec![
                SkippedTransaction {
                    index: 0,
                    instrument_id: "A".to_string(),
                    error: TransactionError::NonPositiveQuantity(dec!(0)),
                },
                SkippedTransaction {
                    index: 2,
                    instrument_id: "A".to_string(),
                    error: TransactionError::NegativePrice(dec!(-1)),
                },
            ]
        );
        let kept: Vec<SkippedTransaction> = outcome.skipped.to_vec();
        assert_eq!(kept[1].error, TransactionError::NegativePrice(dec!(-1)));
    }

    #[test]
    fn sold_quantity_never_exceeds_bought_plus_unmatched() {
        let transactions = [
            buy("2024-01-01", "A", dec!(4), dec!(10)),
            sell("2024-01-05", "A", dec!(3), dec!(11)),
            buy("2024-01-10", "A", dec!(2.5), dec!(12)),
            sell("2024-01-15", "A", dec!(5), dec!(13)),
            sell("2024-01-20", "A", dec!(1), dec!(14)),
        ];
        let (ledger, outcome) = run(&transactions);
        let bought: Decimal = transactions
            .iter()
            .filter(|t| t.side == Side::Buy)
            .map(|t| t.quantity)
            .sum();
        let sold: Decimal = outcome.sales.iter().map(|s| s.quantity).sum();
        let unmatched: Decimal = outcome
            .sales
            .iter()
            .filter_map(|s| match &s.warning {
                Some(Warning::InsufficientCostBasis { unmatched, .. }) => Some(*unmatched),
                None => None,
            })
            .sum();
        let open: Decimal = ledger.holdings().iter().map(|h| h.quantity).sum();
        assert_eq!(unmatched, dec!(2.5));
        assert!(sold <= bought + unmatched);
        assert_eq!(sold - unmatched + open, bought);
    }
}
