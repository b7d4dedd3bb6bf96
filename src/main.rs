use clap::Parser;
use color_eyre::Result;
use omc::cli::{self, Cli, Commands};
use omc::{Config, Profile, RecordStore, SqliteBlobStore};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    // Load configuration with the determined profile
    let config = Config::load_with_profile(profile)?;

    // Open the blob store and load the record store from it
    let db_path = config.get_database_path();
    let blobs = SqliteBlobStore::new(
        db_path
            .to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?,
    )?;
    let mut store = RecordStore::open(Box::new(blobs));

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::AddClient {
            name,
            address,
            phone,
            email,
            notes,
        } => {
            cli::handle_add_client(&mut store, name, address, phone, email, notes)?;
        }
        Commands::RemoveClient { id, yes } => {
            cli::handle_remove_client(&mut store, id, yes)?;
        }
        Commands::Clients { search } => {
            cli::handle_list_clients(&store, search)?;
        }
        Commands::AddJob {
            day,
            time,
            summary,
            client,
            duration,
        } => {
            cli::handle_add_job(&mut store, day, time, summary, client, duration)?;
        }
        Commands::Day { day } => {
            cli::handle_day(&store, day)?;
        }
        Commands::CompleteJob { id, undo } => {
            cli::handle_complete_job(&mut store, id, undo)?;
        }
        Commands::MoveJob {
            id,
            day,
            time,
            duration,
        } => {
            cli::handle_move_job(&mut store, id, day, time, duration)?;
        }
        Commands::RemoveJob { id } => {
            cli::handle_remove_job(&mut store, id)?;
        }
        Commands::AddNote { text, media } => {
            cli::handle_add_note(&mut store, text, media)?;
        }
        Commands::Notes => {
            cli::handle_notes(&store)?;
        }
        Commands::RemoveNote { id } => {
            cli::handle_remove_note(&mut store, id)?;
        }
        Commands::Bill {
            client,
            items,
            number,
            date,
            notes,
            senior,
            veteran,
            tax_rate,
        } => {
            cli::handle_bill(
                &mut store, &config, client, items, number, date, notes, senior, veteran, tax_rate,
            )?;
        }
        Commands::Invoices { limit } => {
            cli::handle_invoices(&store, limit)?;
        }
        Commands::Totals {
            items,
            senior,
            veteran,
            tax_rate,
        } => {
            cli::handle_totals(&config, items, senior, veteran, tax_rate)?;
        }
        Commands::Message { invoice } => {
            cli::handle_message(&store, &config, invoice)?;
        }
        Commands::Stats => {
            cli::handle_stats(&store)?;
        }
    }

    Ok(())
}
