use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{format_cents, summarize, Summary, Transaction, DATE_FORMAT};

/// Column layout shared by CSV export and import.
pub const CSV_HEADER: [&str; 7] = [
    "id",
    "date",
    "type",
    "amount",
    "category",
    "description",
    "created_at",
];

/// A user's full ledger, as written by the JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub user_id: String,
    pub transactions: Vec<Transaction>,
    pub summary: Summary,
}

/// Exporter for converting a user's ledger to CSV or JSON.
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export transactions to CSV, most recent first. Returns the row count.
    pub async fn export_transactions_csv<W: Write>(&self, user_id: &str, writer: W) -> Result<usize> {
        let transactions = self.service.list_transactions(user_id).await?;
        write_transactions_csv(&transactions, writer)?;
        Ok(transactions.len())
    }

    /// Export transactions and their summary as one JSON document.
    pub async fn export_ledger_json<W: Write>(
        &self,
        user_id: &str,
        writer: W,
    ) -> Result<LedgerSnapshot> {
        let transactions = self.service.list_transactions(user_id).await?;
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            user_id: user_id.to_string(),
            summary: summarize(&transactions),
            transactions,
        };

        serde_json::to_writer_pretty(writer, &snapshot)?;
        Ok(snapshot)
    }
}

/// Write transactions as CSV with [CSV_HEADER] columns.
pub fn write_transactions_csv<W: Write>(transactions: &[Transaction], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for transaction in transactions {
        csv_writer.write_record([
            transaction.id.clone(),
            transaction.date.format(DATE_FORMAT).to_string(),
            transaction.kind.to_string(),
            format_cents(transaction.amount),
            transaction.category.clone(),
            transaction.description.clone().unwrap_or_default(),
            transaction.created_at.to_rfc3339(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}
