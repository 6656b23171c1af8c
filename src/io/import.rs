use anyhow::Result;
use serde::Deserialize;
use std::io::Read;

use crate::application::{AppError, LedgerService};
use crate::domain::make_transaction;

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Validate every row without writing anything
    pub dry_run: bool,
}

/// One CSV row. Columns are matched by header name; `id` and `created_at`
/// are ignored because the store assigns them.
#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    #[serde(rename = "type")]
    kind: String,
    amount: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: String,
}

/// Importer for loading transactions into a user's ledger
pub struct Importer<'a> {
    service: &'a LedgerService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Import transactions from CSV in the export layout.
    ///
    /// Every row goes through the same validation as a manual entry. Invalid
    /// rows are reported and skipped; store failures abort the import.
    pub async fn import_transactions_csv<R: Read>(
        &self,
        user_id: &str,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut result = ImportResult::default();

        for (line_num, record) in csv_reader.deserialize::<CsvRow>().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing

            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    result.errors.push(ImportError {
                        line,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            if options.dry_run {
                match make_transaction(
                    user_id,
                    &row.kind,
                    &row.amount,
                    &row.category,
                    &row.date,
                    &row.description,
                ) {
                    Ok(_) => result.imported += 1,
                    Err(e) => result.errors.push(ImportError {
                        line,
                        error: e.to_string(),
                    }),
                }
                continue;
            }

            match self
                .service
                .add_transaction(
                    user_id,
                    &row.kind,
                    &row.amount,
                    &row.category,
                    &row.date,
                    &row.description,
                )
                .await
            {
                Ok(_) => result.imported += 1,
                Err(AppError::Validation(e)) => result.errors.push(ImportError {
                    line,
                    error: e.to_string(),
                }),
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            imported = result.imported,
            errors = result.errors.len(),
            dry_run = options.dry_run,
            "import finished"
        );
        Ok(result)
    }
}
