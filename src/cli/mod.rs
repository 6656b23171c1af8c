pub mod render;
pub mod shell;

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use crate::application::LedgerService;
use crate::auth::{AuthSession, LocalAuth};
use crate::domain::{FieldUpdates, DATE_FORMAT};
use crate::io::{write_transactions_csv, Exporter, ImportOptions, Importer};

use shell::Shell;

const PASSWORD_ENV: &str = "FINTRACK_PASSWORD";

/// fintrack - Personal Finance Ledger
#[derive(Parser)]
#[command(name = "fintrack")]
#[command(about = "Record income and expenses and summarize where the money goes")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "FINTRACK_DATABASE", default_value = "fintrack.db")]
    pub database: String,

    /// Account email for commands that act on a ledger
    #[arg(long, env = "FINTRACK_EMAIL", global = true)]
    pub email: Option<String>,

    /// bcrypt work factor for new password hashes
    #[arg(long, env = "FINTRACK_BCRYPT_COST", default_value_t = LocalAuth::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Create an account
    Register,

    /// Record an income or expense
    Add {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Transaction type: income or expense
        #[arg(short = 't', long = "type")]
        kind: String,

        /// Category (required for expenses)
        #[arg(short, long, default_value = "")]
        category: String,

        /// Date of the transaction (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Description of the transaction
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List transactions, most recent first
    List {
        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Change fields of a transaction
    Edit {
        /// Transaction ID
        id: String,

        /// New type: income or expense
        #[arg(long = "type")]
        kind: Option<String>,

        /// New amount
        #[arg(long)]
        amount: Option<String>,

        /// New category
        #[arg(long)]
        category: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// New description (empty to clear)
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a transaction
    Remove {
        /// Transaction ID
        id: String,
    },

    /// Show income, expenses, net balance and spending by category
    Summary {
        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Export the ledger to CSV or JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },

    /// Import transactions from CSV
    Import {
        /// Input file (stdin if omitted)
        input: Option<String>,

        /// Validate rows without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Interactive menu
    Shell,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database, self.bcrypt_cost).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Register => {
                let service = self.connect().await?;
                let email = self.require_email()?;
                let password = read_password("Password: ")?;
                if std::env::var(PASSWORD_ENV).is_err() {
                    let confirm = read_password("Confirm password: ")?;
                    if confirm != password {
                        bail!("Passwords do not match");
                    }
                }
                let user_id = service.register(email, &password).await?;
                println!("Registered {} ({})", email, user_id);
            }

            Commands::Add {
                ref amount,
                ref kind,
                ref category,
                ref date,
                ref description,
            } => {
                let service = self.connect().await?;
                let session = self.login(&service).await?;
                let date = date
                    .clone()
                    .unwrap_or_else(|| Local::now().date_naive().format(DATE_FORMAT).to_string());

                let id = service
                    .add_transaction(
                        &session.user_id,
                        kind,
                        amount,
                        category,
                        &date,
                        description.as_deref().unwrap_or(""),
                    )
                    .await?;
                println!("Transaction created with ID: {}", id);
            }

            Commands::List { ref format } => {
                let service = self.connect().await?;
                let session = self.login(&service).await?;
                let transactions = service.list_transactions(&session.user_id).await?;

                match format.as_str() {
                    "table" => render::transactions_table(&mut io::stdout(), &transactions)?,
                    "json" => println!("{}", serde_json::to_string_pretty(&transactions)?),
                    "csv" => write_transactions_csv(&transactions, io::stdout())?,
                    other => bail!("Invalid format '{}'. Valid formats: table, json, csv", other),
                }
            }

            Commands::Edit {
                ref id,
                ref kind,
                ref amount,
                ref category,
                ref date,
                ref description,
            } => {
                let updates = FieldUpdates {
                    kind: kind.clone(),
                    amount: amount.clone(),
                    category: category.clone(),
                    date: date.clone(),
                    description: description.clone(),
                };
                if updates.is_empty() {
                    bail!("Nothing to update. Pass at least one of --type, --amount, --category, --date, --description");
                }

                let service = self.connect().await?;
                self.login(&service).await?;
                service.edit_transaction(id, updates).await?;
                println!("Transaction {} updated.", id);
            }

            Commands::Remove { ref id } => {
                let service = self.connect().await?;
                self.login(&service).await?;
                service.remove_transaction(id).await?;
                println!("Transaction {} deleted.", id);
            }

            Commands::Summary { ref format } => {
                let service = self.connect().await?;
                let session = self.login(&service).await?;
                let summary = service.summary(&session.user_id).await?;

                match format.as_str() {
                    "table" => render::summary_table(&mut io::stdout(), &summary)?,
                    "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
                    "csv" => render::summary_csv(io::stdout(), &summary)?,
                    other => bail!("Invalid format '{}'. Valid formats: table, json, csv", other),
                }
            }

            Commands::Export {
                ref output,
                ref format,
            } => {
                let service = self.connect().await?;
                let session = self.login(&service).await?;
                run_export_command(&service, &session, output.as_deref(), format).await?;
            }

            Commands::Import {
                ref input,
                dry_run,
            } => {
                let service = self.connect().await?;
                let session = self.login(&service).await?;
                run_import_command(&service, &session, input.as_deref(), dry_run).await?;
            }

            Commands::Shell => {
                let service = self.connect().await?;
                let stdin = io::stdin();
                let hide = stdin.is_terminal();
                let mut shell = Shell::new(&service, stdin.lock(), io::stdout());
                if hide {
                    shell = shell.with_hidden_passwords();
                }
                shell.run().await?;
            }
        }

        Ok(())
    }

    async fn connect(&self) -> Result<LedgerService> {
        LedgerService::connect(&self.database, self.bcrypt_cost)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database '{}'. Run 'fintrack init' first",
                    self.database
                )
            })
    }

    fn require_email(&self) -> Result<&str> {
        self.email
            .as_deref()
            .context("No account given. Pass --email or set FINTRACK_EMAIL")
    }

    async fn login(&self, service: &LedgerService) -> Result<AuthSession> {
        let email = self.require_email()?;
        let password = read_password("Password: ")?;
        let session = service.login(email, &password).await?;
        if self.verbose {
            eprintln!("Logged in as {}", session.email);
        }
        Ok(session)
    }
}

/// Password from the environment, or an echo-free prompt.
fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    io::stdout().flush()?;
    rpassword::prompt_password(prompt).context("Failed to read password")
}

async fn run_export_command(
    service: &LedgerService,
    session: &AuthSession,
    output: Option<&str>,
    format: &str,
) -> Result<()> {
    use std::fs::File;

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(io::stdout()),
    };

    match format {
        "csv" => {
            let count = exporter
                .export_transactions_csv(&session.user_id, writer)
                .await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "json" => {
            let snapshot = exporter.export_ledger_json(&session.user_id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", snapshot.transactions.len());
            }
        }
        other => bail!("Invalid export format '{}'. Valid formats: csv, json", other),
    }

    Ok(())
}

async fn run_import_command(
    service: &LedgerService,
    session: &AuthSession,
    input: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    use std::fs::File;
    use std::io::Read;

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(io::stdin()),
    };

    let result = Importer::new(service)
        .import_transactions_csv(&session.user_id, reader, ImportOptions { dry_run })
        .await?;

    if dry_run {
        println!("Validation finished");
    } else {
        println!("Import complete");
    }
    println!("  Imported: {}", result.imported);
    println!("  Errors:   {}", result.errors.len());
    for error in &result.errors {
        println!("  Line {}: {}", error.line, error.error);
    }

    Ok(())
}
