use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{parse_cents, Cents};

pub type TransactionId = String;
pub type UserId = String;

/// Date format accepted and produced for transaction dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest accepted amount in cents (one trillion units).
pub const MAX_AMOUNT: Cents = 100_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in (salary, interest, refunds)
    Income,
    /// Money going out; always carries a category
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid transaction type '{0}' (expected income or expense)")]
    InvalidType(String),

    #[error("Invalid amount '{0}' (expected a non-negative number with at most two decimals)")]
    InvalidAmount(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// A validated transaction that has not been persisted yet.
/// The store assigns `id` and `created_at` when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Magnitude in cents; the sign is implied by `kind`
    pub amount: Cents,
    pub category: String,
    pub date: NaiveDate,
    pub description: Option<String>,
}

/// A persisted income or expense record owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Cents,
    pub category: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    /// Assigned by the store, never user-settable
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// Attach the store-assigned identity, producing the persisted record.
    pub fn into_transaction(self, id: TransactionId, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            kind: self.kind,
            amount: self.amount,
            category: self.category,
            date: self.date,
            description: self.description,
            created_at,
        }
    }
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.kind == TransactionType::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionType::Expense
    }

    /// Return a copy of this transaction with the patch applied.
    /// `id`, `user_id` and `created_at` are carried over untouched.
    pub fn apply(&self, patch: &TransactionPatch) -> Transaction {
        Transaction {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            kind: patch.kind.unwrap_or(self.kind),
            amount: patch.amount.unwrap_or(self.amount),
            category: patch
                .category
                .clone()
                .unwrap_or_else(|| self.category.clone()),
            date: patch.date.unwrap_or(self.date),
            description: match &patch.description {
                Some(description) => description.clone(),
                None => self.description.clone(),
            },
            created_at: self.created_at,
        }
    }

    /// Check the cross-field rules that a merged record must still satisfy.
    pub fn check(&self) -> Result<(), ValidationError> {
        check_category(self.kind, &self.category)
    }
}

/// Validate raw input and build a transaction ready to be persisted.
pub fn make_transaction(
    user_id: &str,
    kind: &str,
    amount: &str,
    category: &str,
    date: &str,
    description: &str,
) -> Result<NewTransaction, ValidationError> {
    let kind = parse_kind(kind)?;
    let amount = parse_amount(amount)?;

    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ValidationError::MissingField("user_id"));
    }
    let date = parse_date(date)?;
    let category = category.trim().to_string();
    check_category(kind, &category)?;

    Ok(NewTransaction {
        user_id: user_id.to_string(),
        kind,
        amount,
        category,
        date,
        description: non_blank(description),
    })
}

pub fn parse_kind(input: &str) -> Result<TransactionType, ValidationError> {
    TransactionType::from_str(input).ok_or_else(|| ValidationError::InvalidType(input.to_string()))
}

/// Parse a non-negative decimal amount, at most [MAX_AMOUNT], into cents.
pub fn parse_amount(input: &str) -> Result<Cents, ValidationError> {
    match parse_cents(input) {
        Ok(cents) if (0..=MAX_AMOUNT).contains(&cents) => Ok(cents),
        _ => Err(ValidationError::InvalidAmount(input.to_string())),
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::MissingField("date"));
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(input.to_string()))
}

fn check_category(kind: TransactionType, category: &str) -> Result<(), ValidationError> {
    if kind == TransactionType::Expense && category.trim().is_empty() {
        return Err(ValidationError::MissingField("category"));
    }
    Ok(())
}

fn non_blank(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Raw, unvalidated changes to the mutable fields of a transaction.
///
/// Only `type`, `amount`, `category`, `date` and `description` can be set.
/// Identity fields are dropped, every other key is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdates {
    pub kind: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field by name, as typed by a user.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<(), ValidationError> {
        let value = value.into();
        match field.trim().to_lowercase().as_str() {
            "type" => self.kind = Some(value),
            "amount" => self.amount = Some(value),
            "category" => self.category = Some(value),
            "date" => self.date = Some(value),
            "description" => self.description = Some(value),
            "id" | "user_id" | "created_at" => {
                tracing::debug!(field, "ignoring update to immutable field");
            }
            other => return Err(ValidationError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Build updates from `(field, value)` pairs, stopping at the first unknown field.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut updates = Self::new();
        for (field, value) in pairs {
            updates.set(field, value)?;
        }
        Ok(updates)
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate every present field. Any failure rejects the whole update.
    pub fn validate(&self) -> Result<TransactionPatch, ValidationError> {
        Ok(TransactionPatch {
            kind: self.kind.as_deref().map(parse_kind).transpose()?,
            amount: self.amount.as_deref().map(parse_amount).transpose()?,
            // Whether a blank category is allowed depends on the merged type
            category: self.category.as_deref().map(|c| c.trim().to_string()),
            date: self.date.as_deref().map(parse_date).transpose()?,
            description: self.description.as_deref().map(non_blank),
        })
    }
}

/// Validated changes to a transaction. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub kind: Option<TransactionType>,
    pub amount: Option<Cents>,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::format_cents;

    fn lunch() -> NewTransaction {
        make_transaction("user1", "expense", "100", "food", "2023-10-01", "lunch").unwrap()
    }

    #[test]
    fn test_make_transaction() {
        let tx = lunch();

        assert_eq!(tx.user_id, "user1");
        assert_eq!(tx.kind, TransactionType::Expense);
        assert_eq!(tx.amount, 10000);
        assert_eq!(tx.category, "food");
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2023, 10, 1).unwrap());
        assert_eq!(tx.description, Some("lunch".to_string()));
    }

    #[test]
    fn test_make_transaction_income_without_category() {
        let tx = make_transaction("user1", "Income", "2500.50", "", "2024-01-31", "").unwrap();

        assert_eq!(tx.kind, TransactionType::Income);
        assert_eq!(tx.amount, 250050);
        assert_eq!(tx.category, "");
        assert_eq!(tx.description, None);
    }

    #[test]
    fn test_zero_amount_is_valid() {
        let tx = make_transaction("user1", "expense", "0", "misc", "2024-01-01", "").unwrap();
        assert_eq!(tx.amount, 0);
    }

    #[test]
    fn test_invalid_type() {
        let result = make_transaction("user1", "invalid", "10", "food", "2024-01-01", "");
        assert_eq!(
            result,
            Err(ValidationError::InvalidType("invalid".to_string()))
        );
    }

    #[test]
    fn test_invalid_amount() {
        for amount in ["-5", "abc", "", "1,000"] {
            let result = make_transaction("user1", "expense", amount, "food", "2024-01-01", "");
            assert!(
                matches!(result, Err(ValidationError::InvalidAmount(_))),
                "amount {amount:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            make_transaction("", "expense", "10", "food", "2024-01-01", ""),
            Err(ValidationError::MissingField("user_id"))
        );
        assert_eq!(
            make_transaction("user1", "expense", "10", "food", "  ", ""),
            Err(ValidationError::MissingField("date"))
        );
        assert_eq!(
            make_transaction("user1", "expense", "10", "", "2024-01-01", ""),
            Err(ValidationError::MissingField("category"))
        );
    }

    #[test]
    fn test_amount_ceiling() {
        let max = format_cents(MAX_AMOUNT);
        assert_eq!(parse_amount(&max), Ok(MAX_AMOUNT));
        for amount in ["1000000000000.01", "90000000000000000", "1.239"] {
            assert_eq!(
                make_transaction("user1", "expense", amount, "rent", "2024-01-01", ""),
                Err(ValidationError::InvalidAmount(amount.to_string()))
            );
        }
    }

    #[test]
    fn test_invalid_date() {
        let result = make_transaction("user1", "expense", "10", "food", "2024-02-30", "");
        assert_eq!(
            result,
            Err(ValidationError::InvalidDate("2024-02-30".to_string()))
        );
    }

    #[test]
    fn test_field_updates_drop_identity_fields() {
        let updates =
            FieldUpdates::from_pairs([("id", "other"), ("user_id", "u2"), ("created_at", "now")])
                .unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn test_field_updates_reject_unknown_field() {
        let result = FieldUpdates::from_pairs([("amount", "5"), ("colour", "red")]);
        assert_eq!(
            result,
            Err(ValidationError::UnknownField("colour".to_string()))
        );
    }

    #[test]
    fn test_validate_updates() {
        let patch = FieldUpdates::new()
            .with_kind("income")
            .with_amount("12.5")
            .with_description("")
            .validate()
            .unwrap();

        assert_eq!(patch.kind, Some(TransactionType::Income));
        assert_eq!(patch.amount, Some(1250));
        assert_eq!(patch.category, None);
        assert_eq!(patch.description, Some(None));
    }

    #[test]
    fn test_validate_updates_fails_as_a_whole() {
        let result = FieldUpdates::new()
            .with_category("rent")
            .with_amount("-1")
            .validate();
        assert!(matches!(result, Err(ValidationError::InvalidAmount(_))));
    }

    #[test]
    fn test_apply_patch_keeps_identity() {
        let created_at = Utc::now();
        let tx = lunch().into_transaction("tx-1".to_string(), created_at);
        let patch = FieldUpdates::new()
            .with_amount("42")
            .with_category("dining")
            .validate()
            .unwrap();

        let updated = tx.apply(&patch);

        assert_eq!(updated.id, "tx-1");
        assert_eq!(updated.user_id, "user1");
        assert_eq!(updated.created_at, created_at);
        assert_eq!(updated.amount, 4200);
        assert_eq!(updated.category, "dining");
        assert_eq!(updated.description, Some("lunch".to_string()));
        // The receiver is untouched
        assert_eq!(tx.amount, 10000);
    }

    #[test]
    fn test_blank_category_is_left_to_the_merged_check() {
        let patch = FieldUpdates::new().with_category("  ").validate().unwrap();
        assert_eq!(patch.category, Some(String::new()));

        let income = make_transaction("user1", "income", "10", "bonus", "2024-01-01", "")
            .unwrap()
            .into_transaction("tx-1".to_string(), Utc::now());
        let cleared = income.apply(&patch);
        assert_eq!(cleared.category, "");
        assert_eq!(cleared.check(), Ok(()));

        let expense = lunch().into_transaction("tx-2".to_string(), Utc::now());
        assert_eq!(
            expense.apply(&patch).check(),
            Err(ValidationError::MissingField("category"))
        );
    }

    #[test]
    fn test_merged_expense_needs_category() {
        let income = make_transaction("user1", "income", "10", "", "2024-01-01", "")
            .unwrap()
            .into_transaction("tx-1".to_string(), Utc::now());
        let patch = FieldUpdates::new().with_kind("expense").validate().unwrap();

        assert_eq!(
            income.apply(&patch).check(),
            Err(ValidationError::MissingField("category"))
        );
    }

    #[test]
    fn test_transaction_type_roundtrip() {
        for kind in [TransactionType::Income, TransactionType::Expense] {
            assert_eq!(TransactionType::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionType::from_str(" EXPENSE "), Some(TransactionType::Expense));
        assert_eq!(TransactionType::from_str("transfer"), None);
    }
}
