use std::io::{self, Write};

use crate::domain::{format_cents, Summary, Transaction, DATE_FORMAT};

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Transactions as an aligned table, or a notice when there are none.
pub fn transactions_table<W: Write>(out: &mut W, transactions: &[Transaction]) -> io::Result<()> {
    if transactions.is_empty() {
        return writeln!(out, "No transactions found.");
    }

    writeln!(out, "--- Transactions ({}) ---", transactions.len())?;
    writeln!(
        out,
        "{:<36} {:<10} {:<8} {:>12} {:<15} {}",
        "ID", "DATE", "TYPE", "AMOUNT", "CATEGORY", "DESCRIPTION"
    )?;
    writeln!(out, "{}", "-".repeat(100))?;
    for t in transactions {
        writeln!(
            out,
            "{:<36} {:<10} {:<8} {:>12} {:<15} {}",
            t.id,
            t.date.format(DATE_FORMAT),
            t.kind,
            format_cents(t.amount),
            truncate(&t.category, 15),
            t.description.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

/// Totals followed by the per-category spending breakdown.
pub fn summary_table<W: Write>(out: &mut W, summary: &Summary) -> io::Result<()> {
    if summary.is_empty() {
        writeln!(out, "No transactions found to summarize.")?;
    }

    writeln!(out, "--- Budget Summary ---")?;
    writeln!(out, "Total Income:   {:>15}", format_cents(summary.total_income))?;
    writeln!(out, "Total Expenses: {:>15}", format_cents(summary.total_expense))?;
    writeln!(out, "{}", "-".repeat(31))?;
    writeln!(out, "Net Balance:    {:>15}", format_cents(summary.net_balance))?;

    let breakdown = summary.category_breakdown();
    if !breakdown.is_empty() {
        writeln!(out)?;
        writeln!(out, "Spending by Category:")?;
        for share in breakdown {
            writeln!(
                out,
                "  {:<20} {:>12} {:>6.1}%",
                truncate(&share.category, 20),
                format_cents(share.total),
                share.percentage
            )?;
        }
    }
    Ok(())
}

/// Summary as `metric,value` CSV rows; amounts are in cents.
pub fn summary_csv<W: Write>(out: W, summary: &Summary) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["metric", "category", "amount_cents"])?;
    let totals = [
        ("total_income", summary.total_income),
        ("total_expense", summary.total_expense),
        ("net_balance", summary.net_balance),
    ];
    for (metric, amount) in totals {
        writer.write_record([metric, "", amount.to_string().as_str()])?;
    }
    for (category, total) in &summary.category_spending {
        writer.write_record(["category_spending", category.as_str(), total.to_string().as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
