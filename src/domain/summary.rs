use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Cents, Transaction, TransactionType};

/// Aggregate statistics over a sequence of transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_income: Cents,
    pub total_expense: Cents,
    /// `total_income - total_expense`, may be negative
    pub net_balance: Cents,
    /// Spend per category, computed over expenses only
    pub category_spending: BTreeMap<String, Cents>,
}

/// One row of the category breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub total: Cents,
    /// Share of total expenses, 0-100
    pub percentage: f64,
}

/// Compute totals, net balance and per-category spending.
///
/// An empty input yields the zero summary. Income never contributes to the
/// category breakdown, even when it carries a category label.
///
/// Totals saturate at the bounds of [Cents] instead of overflowing.
pub fn summarize(transactions: &[Transaction]) -> Summary {
    let mut summary = Summary::default();

    for transaction in transactions {
        match transaction.kind {
            TransactionType::Income => {
                summary.total_income = summary.total_income.saturating_add(transaction.amount);
            }
            TransactionType::Expense => {
                summary.total_expense = summary.total_expense.saturating_add(transaction.amount);
                let spent = summary
                    .category_spending
                    .entry(transaction.category.clone())
                    .or_insert(0);
                *spent = spent.saturating_add(transaction.amount);
            }
        }
    }

    summary.net_balance = summary.total_income.saturating_sub(summary.total_expense);
    summary
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        *self == Summary::default()
    }

    /// Categories ordered by spend (largest first, ties by name).
    pub fn category_breakdown(&self) -> Vec<CategoryShare> {
        let mut shares: Vec<CategoryShare> = self
            .category_spending
            .iter()
            .map(|(category, &total)| CategoryShare {
                category: category.clone(),
                total,
                percentage: if self.total_expense > 0 {
                    total as f64 / self.total_expense as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        // BTreeMap iteration is already sorted by name, so a stable sort keeps ties alphabetical
        shares.sort_by(|a, b| b.total.cmp(&a.total));
        shares
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::domain::{format_cents, make_transaction, NewTransaction, MAX_AMOUNT};

    fn tx(kind: &str, amount: &str, category: &str) -> Transaction {
        make_transaction("user1", kind, amount, category, "2024-01-01", "")
            .unwrap()
            .into_transaction("tx".to_string(), Utc::now())
    }

    fn fixture() -> Vec<Transaction> {
        vec![
            tx("income", "1000", "salary"),
            tx("expense", "100", "food"),
            tx("expense", "50", "transport"),
            tx("expense", "50", "food"),
        ]
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);

        assert_eq!(summary.total_income, 0);
        assert_eq!(summary.total_expense, 0);
        assert_eq!(summary.net_balance, 0);
        assert!(summary.category_spending.is_empty());
        assert!(summary.is_empty());
    }

    #[test]
    fn test_summarize_mixed() {
        let summary = summarize(&fixture());

        assert_eq!(summary.total_income, 100000);
        assert_eq!(summary.total_expense, 20000);
        assert_eq!(summary.net_balance, 80000);
        assert_eq!(
            summary.category_spending,
            BTreeMap::from([("food".to_string(), 15000), ("transport".to_string(), 5000)])
        );
    }

    #[test]
    fn test_income_category_is_excluded() {
        let summary = summarize(&[tx("income", "1000", "salary")]);

        assert_eq!(summary.total_income, 100000);
        assert!(!summary.category_spending.contains_key("salary"));
        assert!(summary.category_spending.is_empty());
    }

    #[test]
    fn test_net_balance_can_be_negative() {
        let summary = summarize(&[tx("income", "10", ""), tx("expense", "25.75", "rent")]);
        assert_eq!(summary.net_balance, -1575);
    }

    #[test]
    fn test_categories_sum_to_total_expense() {
        let transactions = vec![
            tx("expense", "0.10", "a"),
            tx("expense", "0.20", "b"),
            tx("expense", "0.30", "a"),
            tx("income", "3.33", "a"),
            tx("expense", "19.99", "c"),
        ];
        let summary = summarize(&transactions);

        let category_total: Cents = summary.category_spending.values().sum();
        assert_eq!(category_total, summary.total_expense);
        assert_eq!(summary.total_expense, 2059);
        assert_eq!(
            summary.net_balance,
            summary.total_income - summary.total_expense
        );
    }

    #[test]
    fn test_input_is_not_mutated() {
        let transactions = fixture();
        let before = transactions.clone();
        let _ = summarize(&transactions);
        assert_eq!(transactions, before);
    }

    #[test]
    fn test_dates_do_not_bucket() {
        let mut late = tx("expense", "5", "food");
        late.date = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        let summary = summarize(&[tx("expense", "5", "food"), late]);

        assert_eq!(summary.category_spending.get("food"), Some(&1000));
    }

    #[test]
    fn test_category_breakdown() {
        let summary = summarize(&fixture());
        let breakdown = summary.category_breakdown();

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, "food");
        assert_eq!(breakdown[0].total, 15000);
        assert!((breakdown[0].percentage - 75.0).abs() < 1e-9);
        assert_eq!(breakdown[1].category, "transport");
        assert!((breakdown[1].percentage - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_huge_totals_saturate() {
        let rent = tx("expense", &format_cents(MAX_AMOUNT), "rent");
        let mut huge = rent.clone();
        huge.amount = Cents::MAX - 1;

        let summary = summarize(&[huge.clone(), rent.clone(), huge]);
        assert_eq!(summary.total_expense, Cents::MAX);
        assert_eq!(summary.category_spending["rent"], Cents::MAX);
        assert_eq!(summary.net_balance, -Cents::MAX);

        let mut income = rent;
        income.kind = TransactionType::Income;
        income.amount = Cents::MAX;
        let summary = summarize(&[income.clone(), income]);
        assert_eq!(summary.total_income, Cents::MAX);
        assert_eq!(summary.net_balance, Cents::MAX);
    }

    #[test]
    fn test_category_breakdown_zero_expense() {
        let summary = summarize(&[tx("expense", "0", "misc")]);
        let breakdown = summary.category_breakdown();

        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].percentage, 0.0);
    }

    fn transaction_strategy() -> impl Strategy<Value = Transaction> {
        (
            prop_oneof![Just(TransactionType::Income), Just(TransactionType::Expense)],
            0..=MAX_AMOUNT,
            prop_oneof![Just("food"), Just("rent"), Just("salary"), Just("")],
        )
            .prop_map(|(kind, amount, category)| {
                NewTransaction {
                    user_id: "user1".to_string(),
                    kind,
                    amount,
                    category: category.to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    description: None,
                }
                .into_transaction("tx".to_string(), Utc::now())
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Net balance is income minus expenses, and categories partition expenses.
        #[test]
        fn prop_summary_totals_are_consistent(
            transactions in prop::collection::vec(transaction_strategy(), 0..64)
        ) {
            let summary = summarize(&transactions);

            prop_assert_eq!(summary.net_balance, summary.total_income - summary.total_expense);
            let category_total: Cents = summary.category_spending.values().sum();
            prop_assert_eq!(category_total, summary.total_expense);

            let income: Cents = transactions.iter().filter(|t| t.is_income()).map(|t| t.amount).sum();
            prop_assert_eq!(summary.total_income, income);
        }

        /// Categories that only ever appear on income never show up in the breakdown.
        #[test]
        fn prop_income_never_in_category_spending(
            transactions in prop::collection::vec(transaction_strategy(), 0..64)
        ) {
            let summary = summarize(&transactions);

            for category in summary.category_spending.keys() {
                prop_assert!(transactions
                    .iter()
                    .any(|t| t.is_expense() && &t.category == category));
            }
            for transaction in transactions.iter().filter(|t| t.is_income()) {
                let spent_as_expense = transactions
                    .iter()
                    .any(|t| t.is_expense() && t.category == transaction.category);
                prop_assert_eq!(
                    summary.category_spending.contains_key(&transaction.category),
                    spent_as_expense
                );
            }
        }
    }
}
