use serde::Serialize;
use std::collections::BTreeMap;

use super::category::Category;
use super::money::Money;
use super::transaction::Transaction;

/// Income and spending totals over a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub total_income: Money,
    pub income_count: usize,
    /// Absolute value of all outflows.
    pub total_spend: Money,
    pub spend_count: usize,
    /// Outflows per spending category; `Income` never appears here.
    pub spend_by_category: BTreeMap<Category, Money>,
}

impl TransactionSummary {
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut summary = TransactionSummary {
            total_income: Money::zero(),
            income_count: 0,
            total_spend: Money::zero(),
            spend_count: 0,
            spend_by_category: BTreeMap::new(),
        };

        for tx in transactions {
            if tx.amount.is_inflow() {
                summary.total_income = summary.total_income + tx.amount;
                summary.income_count += 1;
            } else if tx.amount.is_outflow() {
                let spent = tx.amount.abs();
                summary.total_spend = summary.total_spend + spent;
                summary.spend_count += 1;
                if tx.category.is_spending() {
                    let entry = summary
                        .spend_by_category
                        .entry(tx.category)
                        .or_insert_with(Money::zero);
                    *entry = *entry + spent;
                }
            }
        }

        summary.total_income = summary.total_income.round_cents();
        summary.total_spend = summary.total_spend.round_cents();
        for amount in summary.spend_by_category.values_mut() {
            *amount = amount.round_cents();
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{ExtractedWith, TransactionId, TransactionSource};
    use chrono::NaiveDate;

    fn tx(amount: f64, category: Category) -> Transaction {
        Transaction {
            id: TransactionId::generate(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description_raw: "x".to_string(),
            amount: Money::from_f64(amount).unwrap(),
            currency: "IDR".to_string(),
            merchant_canonical: "x".to_string(),
            category,
            category_confidence: 0.9,
            is_recurring: false,
            recurring_frequency: None,
            source: TransactionSource { file: "a.pdf".to_string() },
            extracted_with: ExtractedWith {
                model: "m".to_string(),
                schema_version: "txn.v1".to_string(),
            },
        }
    }

    #[test]
    fn totals_split_by_direction() {
        let txs = vec![
            tx(5_000_000.0, Category::Income),
            tx(-50_000.0, Category::FoodDining),
            tx(-25_000.0, Category::FoodDining),
            tx(-100_000.0, Category::BillsUtilities),
            tx(0.0, Category::Other),
        ];
        let s = TransactionSummary::from_transactions(&txs);
        assert_eq!(s.total_income.to_f64(), 5_000_000.0);
        assert_eq!(s.income_count, 1);
        assert_eq!(s.total_spend.to_f64(), 175_000.0);
        assert_eq!(s.spend_count, 3);
        assert_eq!(s.spend_by_category[&Category::FoodDining].to_f64(), 75_000.0);
        assert!(!s.spend_by_category.contains_key(&Category::Other));
    }

    #[test]
    fn totals_are_rounded_to_cents_after_summing() {
        let s = TransactionSummary::from_transactions(&[
            tx(-12.3456, Category::FoodDining),
            tx(-0.0044, Category::FoodDining),
        ]);
        assert_eq!(s.total_spend.to_f64(), 12.35);
        assert_eq!(s.spend_by_category[&Category::FoodDining].to_f64(), 12.35);
    }

    #[test]
    fn refund_labelled_income_but_negative_is_not_in_category_map() {
        let s = TransactionSummary::from_transactions(&[tx(-10.0, Category::Income)]);
        assert_eq!(s.spend_count, 1);
        assert!(s.spend_by_category.is_empty());
    }

    #[test]
    fn category_keys_serialize_as_names() {
        let s = TransactionSummary::from_transactions(&[tx(-10.0, Category::TransportMobility)]);
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["spend_by_category"]["Transport & Mobility"], 10.0);
    }
}
