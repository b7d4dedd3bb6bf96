use clap::{Parser, Subcommand};
use std::path::Path;
use thiserror::Error;

use crate::config::Config;
use crate::media::{self, MediaError};
use crate::models::{LineItem, NewClient, NewInvoice, NewScheduleEntry, TotalsBreakdown, Weekday};
use crate::store::{RecordStore, StoreError};
use crate::summary::compose_invoice_message;
use crate::totals::compute_totals;
use crate::utils::{parse_date, parse_time};

#[derive(Parser)]
#[command(name = "omc")]
#[command(about = "Owensboro Mowing Company - clients, schedule, notes and invoices")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new client
    AddClient {
        /// Client name
        name: String,
        /// Street address
        #[arg(long)]
        address: String,
        /// Phone number
        #[arg(long)]
        phone: String,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove a client (schedule entries and invoices are kept)
    RemoveClient {
        /// Client id
        id: i64,
        /// Skip the confirmation step
        #[arg(long)]
        yes: bool,
    },
    /// List clients, optionally filtered
    Clients {
        /// Match against name, phone or email
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a job to a day's schedule
    AddJob {
        /// Day of week (monday..sunday)
        day: Weekday,
        /// Start time (24-hour HH:MM)
        time: String,
        /// What the job is
        summary: String,
        /// Client id
        #[arg(long)]
        client: i64,
        /// Expected duration in hours
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
    },
    /// Show one day's schedule
    Day {
        /// Day of week (monday..sunday)
        day: Weekday,
    },
    /// Mark a job completed (or not, with --undo)
    CompleteJob {
        /// Schedule entry id
        id: i64,
        /// Mark the job as not completed instead
        #[arg(long)]
        undo: bool,
    },
    /// Move a job to another day and time
    MoveJob {
        /// Schedule entry id
        id: i64,
        /// Destination day of week
        day: Weekday,
        /// New start time (24-hour HH:MM)
        time: String,
        /// New duration in hours (keeps the current one if omitted)
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Remove a job from the schedule
    RemoveJob {
        /// Schedule entry id
        id: i64,
    },
    /// Add a note, optionally with an attached media file
    AddNote {
        /// Note text
        text: String,
        /// Path to a photo or document to attach
        #[arg(long)]
        media: Option<String>,
    },
    /// List notes, newest first
    Notes,
    /// Remove a note
    RemoveNote {
        /// Note id
        id: i64,
    },
    /// Compose and record an invoice
    Bill {
        /// Client id
        #[arg(long)]
        client: i64,
        /// Line item as CATEGORY:DESCRIPTION:QTY:RATE (repeatable)
        #[arg(long = "item", value_name = "CATEGORY:DESC:QTY:RATE")]
        items: Vec<String>,
        /// Invoice number (auto-generated if omitted)
        #[arg(long)]
        number: Option<String>,
        /// Issue date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Apply the 10% senior discount
        #[arg(long)]
        senior: bool,
        /// Apply the 15% veteran labor discount
        #[arg(long)]
        veteran: bool,
        /// Override the configured tax rate
        #[arg(long)]
        tax_rate: Option<f64>,
    },
    /// Show the invoice history, newest first
    Invoices {
        /// Show at most this many invoices
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Preview totals for a set of line items without recording anything
    Totals {
        /// Line item as CATEGORY:DESCRIPTION:QTY:RATE (repeatable)
        #[arg(long = "item", value_name = "CATEGORY:DESC:QTY:RATE")]
        items: Vec<String>,
        /// Apply the 10% senior discount
        #[arg(long)]
        senior: bool,
        /// Apply the 15% veteran labor discount
        #[arg(long)]
        veteran: bool,
        /// Override the configured tax rate
        #[arg(long)]
        tax_rate: Option<f64>,
    },
    /// Print the plain-text message summary for an invoice
    Message {
        /// Invoice id
        invoice: i64,
    },
    /// Show dashboard numbers
    Stats,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Media error: {0}")]
    MediaError(#[from] MediaError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Failed to parse time: {0}")]
    TimeParseError(String),
    #[error("Failed to parse line item: {0}")]
    ItemParseError(String),
    #[error("No invoice with id {0}")]
    UnknownInvoice(i64),
}

/// Parse a CATEGORY:DESCRIPTION:QTY:RATE item spec. The description may
/// itself contain colons; quantity and rate are the last two segments.
fn parse_item_spec(spec: &str) -> Result<LineItem, CliError> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() < 4 {
        return Err(CliError::ItemParseError(format!(
            "'{spec}' is not CATEGORY:DESCRIPTION:QTY:RATE"
        )));
    }

    let category = parts[0]
        .parse()
        .map_err(|e| CliError::ItemParseError(format!("{e}")))?;
    let description = parts[1..parts.len() - 2].join(":");
    let quantity: f64 = parts[parts.len() - 2]
        .trim()
        .parse()
        .map_err(|_| CliError::ItemParseError(format!("bad quantity in '{spec}'")))?;
    let rate: f64 = parts[parts.len() - 1]
        .trim()
        .parse()
        .map_err(|_| CliError::ItemParseError(format!("bad rate in '{spec}'")))?;

    // The totals engine assumes validated numbers; reject bad ones here.
    if !(quantity.is_finite() && quantity >= 0.0) {
        return Err(CliError::ItemParseError(format!(
            "quantity must be a non-negative number in '{spec}'"
        )));
    }
    if !(rate.is_finite() && rate >= 0.0) {
        return Err(CliError::ItemParseError(format!(
            "rate must be a non-negative number in '{spec}'"
        )));
    }

    Ok(LineItem::new(category, description, quantity, rate))
}

fn parse_item_specs(specs: &[String]) -> Result<Vec<LineItem>, CliError> {
    specs.iter().map(|s| parse_item_spec(s)).collect()
}

fn check_time(time: &str) -> Result<(), CliError> {
    parse_time(time)
        .map(|_| ())
        .ok_or_else(|| CliError::TimeParseError(format!("'{time}' is not a 24-hour HH:MM time")))
}

fn print_breakdown(totals: &TotalsBreakdown) {
    println!("Labor:                ${:.2}", totals.labor_total);
    println!("Materials:            ${:.2}", totals.materials_total);
    println!("Subtotal:             ${:.2}", totals.subtotal);
    println!(
        "Tax ({:.2}%):          ${:.2}",
        totals.tax_rate * 100.0,
        totals.tax
    );
    println!("Total before savings: ${:.2}", totals.total_before_discounts);
    if totals.senior_savings > 0.0 {
        println!("Senior savings:       -${:.2}", totals.senior_savings);
    }
    if totals.veteran_savings > 0.0 {
        println!("Veteran savings:      -${:.2}", totals.veteran_savings);
    }
    println!("Total due:            ${:.2}", totals.total_due);
}

fn client_name(store: &RecordStore, id: i64) -> String {
    store
        .find_client(id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "Unknown client".to_string())
}

/// Handle the add-client command
pub fn handle_add_client(
    store: &mut RecordStore,
    name: String,
    address: String,
    phone: String,
    email: Option<String>,
    notes: Option<String>,
) -> Result<(), CliError> {
    let client = store.add_client(NewClient {
        name,
        address,
        phone,
        email,
        notes,
    })?;
    println!("Client created successfully (ID: {})", client.id);
    Ok(())
}

/// Handle the remove-client command. Without --yes this only reports
/// what the removal would leave behind; the commit happens on a second
/// run with --yes.
pub fn handle_remove_client(store: &mut RecordStore, id: i64, yes: bool) -> Result<(), CliError> {
    if store.find_client(id).is_none() {
        println!("No client with ID {} (nothing to remove)", id);
        return Ok(());
    }

    let impact = store.client_removal_impact(id);
    if !yes {
        println!("Removing client {} ({})", id, client_name(store, id));
        if !impact.is_clean() {
            println!(
                "This leaves {} schedule entr{} and {} invoice{} pointing at an unknown client.",
                impact.schedule_entries,
                if impact.schedule_entries == 1 { "y" } else { "ies" },
                impact.invoices,
                if impact.invoices == 1 { "" } else { "s" },
            );
        }
        println!("Re-run with --yes to confirm.");
        return Ok(());
    }

    store.remove_client(id);
    println!("Client {} removed", id);
    Ok(())
}

/// Handle the clients command
pub fn handle_list_clients(store: &RecordStore, search: Option<String>) -> Result<(), CliError> {
    let clients: Vec<_> = match &search {
        Some(query) => store.search_clients(query),
        None => store.clients().iter().collect(),
    };

    if clients.is_empty() {
        println!("No clients found");
        return Ok(());
    }
    for client in clients {
        let email = client.email.as_deref().unwrap_or("-");
        println!(
            "{:>4}  {}  {}  {}  {}",
            client.id, client.name, client.phone, client.address, email
        );
    }
    Ok(())
}

/// Handle the add-job command
pub fn handle_add_job(
    store: &mut RecordStore,
    day: Weekday,
    time: String,
    summary: String,
    client: i64,
    duration: f64,
) -> Result<(), CliError> {
    check_time(&time)?;
    let entry = store.add_schedule_entry(
        day,
        NewScheduleEntry {
            client_id: client,
            time,
            duration_hours: duration,
            summary,
        },
    )?;
    println!("Job created successfully (ID: {}, {})", entry.id, entry.day);
    Ok(())
}

/// Handle the day command
pub fn handle_day(store: &RecordStore, day: Weekday) -> Result<(), CliError> {
    let entries = store.entries_for_day(day);
    if entries.is_empty() {
        println!("Nothing scheduled for {}", day);
        return Ok(());
    }
    println!("{}:", day);
    for entry in entries {
        println!(
            "  [{}] {:>4}  {}  {:.1}h  {}  ({})",
            if entry.completed { "x" } else { " " },
            entry.id,
            entry.time,
            entry.duration_hours,
            entry.summary,
            client_name(store, entry.client_id),
        );
    }
    Ok(())
}

/// Handle the complete-job command
pub fn handle_complete_job(store: &mut RecordStore, id: i64, undo: bool) -> Result<(), CliError> {
    store.set_schedule_completion(id, !undo)?;
    println!(
        "Job {} marked {}",
        id,
        if undo { "not completed" } else { "completed" }
    );
    Ok(())
}

/// Handle the move-job command
pub fn handle_move_job(
    store: &mut RecordStore,
    id: i64,
    day: Weekday,
    time: String,
    duration: Option<f64>,
) -> Result<(), CliError> {
    check_time(&time)?;
    let duration = match duration {
        Some(duration) => duration,
        None => store
            .find_schedule_entry(id)
            .map(|e| e.duration_hours)
            .ok_or(StoreError::NotFound(id))?,
    };
    store.move_schedule_entry(id, day, time, duration)?;
    println!("Job {} moved to {}", id, day);
    Ok(())
}

/// Handle the remove-job command
pub fn handle_remove_job(store: &mut RecordStore, id: i64) -> Result<(), CliError> {
    store.remove_schedule_entry(id)?;
    println!("Job {} removed", id);
    Ok(())
}

/// Handle the add-note command
pub fn handle_add_note(
    store: &mut RecordStore,
    text: String,
    media: Option<String>,
) -> Result<(), CliError> {
    // A failed media read abandons the whole note submission.
    let attachment = match media {
        Some(path) => Some(media::load_attachment(Path::new(&path))?),
        None => None,
    };
    let note = store.add_note(text, attachment);
    println!("Note created successfully (ID: {})", note.id);
    Ok(())
}

/// Handle the notes command
pub fn handle_notes(store: &RecordStore) -> Result<(), CliError> {
    if store.notes().is_empty() {
        println!("No notes");
        return Ok(());
    }
    for note in store.notes() {
        let marker = match &note.attachment {
            Some(attachment) => format!(" [{}]", attachment.file_name),
            None => String::new(),
        };
        println!("{:>4}  {}  {}{}", note.id, note.created_at, note.text, marker);
    }
    Ok(())
}

/// Handle the remove-note command
pub fn handle_remove_note(store: &mut RecordStore, id: i64) -> Result<(), CliError> {
    store.remove_note(id);
    println!("Note {} removed (if it existed)", id);
    Ok(())
}

/// Handle the bill command
#[allow(clippy::too_many_arguments)]
pub fn handle_bill(
    store: &mut RecordStore,
    config: &Config,
    client: i64,
    item_specs: Vec<String>,
    number: Option<String>,
    date: Option<String>,
    notes: Option<String>,
    senior: bool,
    veteran: bool,
    tax_rate: Option<f64>,
) -> Result<(), CliError> {
    if let Some(date_str) = &date {
        parse_date(date_str).map_err(|e| {
            CliError::DateParseError(format!("Invalid date format '{}': {}", date_str, e))
        })?;
    }

    let items = parse_item_specs(&item_specs)?;
    let totals = compute_totals(&items, tax_rate.unwrap_or(config.tax_rate), senior, veteran);
    let invoice = store.record_invoice(NewInvoice {
        client_id: client,
        invoice_number: number,
        issue_date: date,
        notes,
        items,
        totals,
    })?;

    println!(
        "Invoice {} recorded for {} (ID: {})",
        invoice.invoice_number,
        client_name(store, invoice.client_id),
        invoice.id
    );
    print_breakdown(&invoice.totals);
    Ok(())
}

/// Handle the invoices command
pub fn handle_invoices(store: &RecordStore, limit: Option<usize>) -> Result<(), CliError> {
    let invoices = store.list_invoices(limit);
    if invoices.is_empty() {
        println!("No invoices recorded");
        return Ok(());
    }
    for invoice in invoices {
        println!(
            "{:>4}  {}  {}  {}  ${:.2}",
            invoice.id,
            invoice.invoice_number,
            invoice.issue_date,
            client_name(store, invoice.client_id),
            invoice.totals.total_due
        );
    }
    Ok(())
}

/// Handle the totals command
pub fn handle_totals(
    config: &Config,
    item_specs: Vec<String>,
    senior: bool,
    veteran: bool,
    tax_rate: Option<f64>,
) -> Result<(), CliError> {
    let items = parse_item_specs(&item_specs)?;
    let totals = compute_totals(&items, tax_rate.unwrap_or(config.tax_rate), senior, veteran);
    print_breakdown(&totals);
    Ok(())
}

/// Handle the message command
pub fn handle_message(store: &RecordStore, config: &Config, invoice: i64) -> Result<(), CliError> {
    let invoice = store
        .find_invoice(invoice)
        .ok_or(CliError::UnknownInvoice(invoice))?;
    let client = store.find_client(invoice.client_id);
    println!(
        "{}",
        compose_invoice_message(invoice, client, &config.business)
    );
    Ok(())
}

/// Handle the stats command
pub fn handle_stats(store: &RecordStore) -> Result<(), CliError> {
    let stats = store.dashboard_stats();
    println!("Clients:        {}", stats.clients);
    println!("Jobs today:     {}", stats.jobs_today);
    println!("Jobs completed: {}", stats.jobs_completed);
    println!("Invoices:       {}", stats.invoices);
    println!("Revenue:        ${:.2}", stats.revenue);
    Ok(())
}
