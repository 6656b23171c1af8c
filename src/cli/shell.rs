use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::Local;

use crate::application::LedgerService;
use crate::auth::AuthSession;
use crate::domain::{FieldUpdates, DATE_FORMAT};

use super::render;

enum Flow {
    Continue,
    Exit,
}

/// Interactive menu over a [LedgerService].
///
/// The logged-in session exists only inside the shell and is dropped on
/// logout or exit. Failed operations are reported and the menu continues.
pub struct Shell<'a, R, W> {
    service: &'a LedgerService,
    input: R,
    output: W,
    session: Option<AuthSession>,
    hide_passwords: bool,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    pub fn new(service: &'a LedgerService, input: R, output: W) -> Self {
        Self {
            service,
            input,
            output,
            session: None,
            hide_passwords: false,
        }
    }

    /// Read passwords from the terminal without echo instead of from `input`.
    pub fn with_hidden_passwords(mut self) -> Self {
        self.hide_passwords = true;
        self
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    /// Run the menu until the user exits or input ends.
    pub async fn run(&mut self) -> Result<()> {
        writeln!(self.output, "Welcome to fintrack")?;
        loop {
            let flow = match self.session.clone() {
                Some(session) => self.account_menu(&session).await?,
                None => self.login_menu().await?,
            };
            if let Flow::Exit = flow {
                writeln!(self.output, "Exiting...")?;
                break;
            }
        }
        if let Some(session) = self.session.take() {
            if let Err(e) = self.service.logout(&session.token).await {
                tracing::warn!("logout failed: {e}");
            }
        }
        Ok(())
    }

    /// Prompt for a line. `None` means the input is exhausted.
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{}", label)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read input")?;
        if read == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string()))
    }

    fn prompt_password(&mut self, label: &str) -> Result<Option<String>> {
        if self.hide_passwords {
            self.output.flush()?;
            let password = rpassword::prompt_password(label).context("Failed to read password")?;
            return Ok(Some(password));
        }
        self.prompt(label)
    }

    fn credentials(&mut self) -> Result<Option<(String, String)>> {
        let Some(email) = self.prompt("Email: ")? else {
            return Ok(None);
        };
        let Some(password) = self.prompt_password("Password: ")? else {
            return Ok(None);
        };
        Ok(Some((email, password)))
    }

    async fn login_menu(&mut self) -> Result<Flow> {
        writeln!(self.output)?;
        writeln!(self.output, "1. Login")?;
        writeln!(self.output, "2. Register")?;
        writeln!(self.output, "3. Exit")?;
        let Some(choice) = self.prompt("Select an option: ")? else {
            return Ok(Flow::Exit);
        };

        match choice.trim() {
            "1" => {
                let Some((email, password)) = self.credentials()? else {
                    return Ok(Flow::Exit);
                };
                match self.service.login(&email, &password).await {
                    Ok(session) => {
                        writeln!(self.output, "Login successful.")?;
                        self.session = Some(session);
                    }
                    Err(e) => writeln!(self.output, "Login failed: {}", e)?,
                }
            }
            "2" => {
                let Some((email, password)) = self.credentials()? else {
                    return Ok(Flow::Exit);
                };
                match self.service.register(&email, &password).await {
                    Ok(_) => writeln!(self.output, "Registration successful. Please login.")?,
                    Err(e) => writeln!(self.output, "Registration failed: {}", e)?,
                }
            }
            "3" => return Ok(Flow::Exit),
            _ => writeln!(self.output, "Invalid option.")?,
        }
        Ok(Flow::Continue)
    }

    async fn account_menu(&mut self, session: &AuthSession) -> Result<Flow> {
        writeln!(self.output)?;
        writeln!(self.output, "Logged in as: {}", session.email)?;
        writeln!(self.output, "1. Add a transaction")?;
        writeln!(self.output, "2. View all transactions")?;
        writeln!(self.output, "3. Edit a transaction")?;
        writeln!(self.output, "4. Delete a transaction")?;
        writeln!(self.output, "5. View summary")?;
        writeln!(self.output, "6. Logout")?;
        writeln!(self.output, "7. Exit")?;
        let Some(choice) = self.prompt("Select an option: ")? else {
            return Ok(Flow::Exit);
        };

        match choice.trim() {
            "1" => self.add(session).await,
            "2" => {
                match self.service.list_transactions(&session.user_id).await {
                    Ok(transactions) => render::transactions_table(&mut self.output, &transactions)?,
                    Err(e) => writeln!(self.output, "Error retrieving transactions: {}", e)?,
                }
                Ok(Flow::Continue)
            }
            "3" => self.edit().await,
            "4" => {
                let Some(id) = self.prompt("Enter Transaction ID to delete: ")? else {
                    return Ok(Flow::Exit);
                };
                match self.service.remove_transaction(id.trim()).await {
                    Ok(()) => writeln!(self.output, "Transaction {} deleted.", id.trim())?,
                    Err(e) => writeln!(self.output, "Error deleting transaction: {}", e)?,
                }
                Ok(Flow::Continue)
            }
            "5" => {
                match self.service.summary(&session.user_id).await {
                    Ok(summary) => render::summary_table(&mut self.output, &summary)?,
                    Err(e) => writeln!(self.output, "Error computing summary: {}", e)?,
                }
                Ok(Flow::Continue)
            }
            "6" => {
                if let Err(e) = self.service.logout(&session.token).await {
                    tracing::warn!("logout failed: {e}");
                }
                self.session = None;
                writeln!(self.output, "Logged out.")?;
                Ok(Flow::Continue)
            }
            "7" => Ok(Flow::Exit),
            _ => {
                writeln!(self.output, "Invalid option.")?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn add(&mut self, session: &AuthSession) -> Result<Flow> {
        let today = Local::now().date_naive().format(DATE_FORMAT).to_string();
        let fields = [
            "Type (income/expense): ".to_string(),
            "Amount: ".to_string(),
            "Category: ".to_string(),
            format!("Date (YYYY-MM-DD) [{}]: ", today),
            "Description: ".to_string(),
        ];

        let mut answers = Vec::with_capacity(fields.len());
        for label in &fields {
            let Some(answer) = self.prompt(label)? else {
                return Ok(Flow::Exit);
            };
            answers.push(answer);
        }
        let date = if answers[3].trim().is_empty() {
            today
        } else {
            answers[3].clone()
        };

        match self
            .service
            .add_transaction(
                &session.user_id,
                &answers[0],
                &answers[1],
                &answers[2],
                &date,
                &answers[4],
            )
            .await
        {
            Ok(id) => writeln!(self.output, "Transaction created with ID: {}", id)?,
            Err(e) => writeln!(self.output, "Error creating transaction: {}", e)?,
        }
        Ok(Flow::Continue)
    }

    async fn edit(&mut self) -> Result<Flow> {
        let Some(id) = self.prompt("Enter Transaction ID to edit: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(field) = self.prompt("Field to update (amount/category/date/description/type): ")?
        else {
            return Ok(Flow::Exit);
        };
        let Some(value) = self.prompt(&format!("New value for {}: ", field.trim()))? else {
            return Ok(Flow::Exit);
        };

        let mut updates = FieldUpdates::new();
        if let Err(e) = updates.set(&field, value) {
            writeln!(self.output, "Error updating transaction: {}", e)?;
            return Ok(Flow::Continue);
        }

        match self.service.edit_transaction(id.trim(), updates).await {
            Ok(()) => writeln!(self.output, "Transaction {} updated.", id.trim())?,
            Err(e) => writeln!(self.output, "Error updating transaction: {}", e)?,
        }
        Ok(Flow::Continue)
    }
}
