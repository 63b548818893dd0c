mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_allergy_add, cmd_allergy_update, cmd_avoid_add, cmd_avoid_update, cmd_check, cmd_clear,
    cmd_export, cmd_favorite_add, cmd_favorite_update, cmd_history, cmd_item_remove,
    cmd_notes_set, cmd_notes_show, cmd_profile_add, cmd_profile_list, cmd_profile_show, cmd_save,
    cmd_show, cmd_suggest,
};
use crate::config::Config;
use mealcare_core::db::StorageMode;
use mealcare_core::models::Section;
use mealcare_core::service::CareService;
use mealcare_core::undo::UndoRegistry;

/// Log filter variable, e.g. `MEALCARE_LOG=debug`.
const LOG_ENV: &str = "MEALCARE_LOG";

#[derive(Parser)]
#[command(
    name = "mealcare",
    version,
    about = "Meal preferences, allergies and safe meal suggestions for the people you care for"
)]
struct Cli {
    /// Keep everything in memory for this run only; nothing is written to disk
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage care profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Manage favorite foods
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Manage the avoid list (disliked foods)
    Avoid {
        #[command(subcommand)]
        command: AvoidCommands,
    },
    /// Manage allergies
    Allergy {
        #[command(subcommand)]
        command: AllergyCommands,
    },
    /// Read or replace special instructions
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
    /// Show all preferences for a profile
    Show {
        /// Profile id or name
        profile: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-validate and save a profile's preferences
    Save {
        /// Profile id or name
        profile: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest catalog meals ranked by safety
    Suggest {
        /// Profile id or name
        profile: String,
        /// Only this category: breakfast, lunch, dinner, snack
        #[arg(short, long)]
        category: Option<String>,
        /// Number appended to suggestion ids
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether a meal is safe to serve
    Check {
        /// Profile id or name
        profile: String,
        /// Meal name (looked up in the catalog unless --ingredients is given)
        meal: String,
        /// Comma-separated ingredients (e.g. "rice,chicken,peas")
        #[arg(short, long)]
        ingredients: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent preference changes
    History {
        /// Profile id or name
        profile: String,
        /// Delete the change history instead of showing it
        #[arg(long)]
        clear: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export preferences as JSON
    Export {
        /// Profile id or name
        profile: String,
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Delete all preferences for a profile
    Clear {
        /// Profile id or name
        profile: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Add a profile
    Add {
        /// Full name
        name: String,
        /// Birthday (free text, e.g. 1938-05-14)
        #[arg(long)]
        birthday: String,
        /// Emergency contact
        #[arg(long)]
        emergency_contact: Option<String>,
        /// Primary caregiver
        #[arg(long)]
        caregiver: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one profile with its preferences
    Show {
        /// Profile id or name
        profile: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Add a favorite food
    Add {
        /// Profile id or name
        profile: String,
        /// Food name
        name: String,
        /// Meal category: breakfast, lunch, dinner, snack
        #[arg(short, long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a favorite food
    Update {
        /// Profile id or name
        profile: String,
        /// Favorite id
        item_id: String,
        /// New food name
        name: String,
        /// Meal category: breakfast, lunch, dinner, snack
        #[arg(short, long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a favorite food
    Remove {
        /// Profile id or name
        profile: String,
        /// Favorite id
        item_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AvoidCommands {
    /// Add a food to the avoid list
    Add {
        /// Profile id or name
        profile: String,
        /// Food name
        name: String,
        /// How strongly to avoid it: mild, moderate, absolute
        #[arg(short, long, default_value = "moderate")]
        level: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace an avoid-list entry
    Update {
        /// Profile id or name
        profile: String,
        /// Entry id
        item_id: String,
        /// New food name
        name: String,
        /// How strongly to avoid it: mild, moderate, absolute
        #[arg(short, long, default_value = "moderate")]
        level: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an avoid-list entry
    Remove {
        /// Profile id or name
        profile: String,
        /// Entry id
        item_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AllergyCommands {
    /// Record an allergy
    Add {
        /// Profile id or name
        profile: String,
        /// Allergen (e.g. peanuts, shellfish)
        label: String,
        /// Severity: mild, severe
        #[arg(short, long, default_value = "severe")]
        severity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace an allergy
    Update {
        /// Profile id or name
        profile: String,
        /// Allergy id
        item_id: String,
        /// New allergen
        label: String,
        /// Severity: mild, severe
        #[arg(short, long, default_value = "severe")]
        severity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an allergy
    Remove {
        /// Profile id or name
        profile: String,
        /// Allergy id
        item_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum NotesCommands {
    /// Replace the special instructions
    Set {
        /// Profile id or name
        profile: String,
        /// New text (up to 500 characters)
        text: String,
        /// Who made the change
        #[arg(long)]
        by: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the special instructions
    Show {
        /// Profile id or name
        profile: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mode = if cli.ephemeral {
        eprintln!("Ephemeral mode: changes from this run will not be saved.");
        StorageMode::Session
    } else {
        StorageMode::Durable
    };
    let service = CareService::open(mode, &config.db_path)?;
    let mut undo = UndoRegistry::new();

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::Add {
                name,
                birthday,
                emergency_contact,
                caregiver,
                json,
            } => cmd_profile_add(&service, &name, &birthday, emergency_contact, caregiver, json),
            ProfileCommands::List { json } => cmd_profile_list(&service, json),
            ProfileCommands::Show { profile, json } => cmd_profile_show(&service, &profile, json),
        },
        Commands::Favorite { command } => match command {
            FavoriteCommands::Add {
                profile,
                name,
                category,
                json,
            } => cmd_favorite_add(
                &service,
                &mut undo,
                &profile,
                &name,
                category.as_deref(),
                json,
            ),
            FavoriteCommands::Update {
                profile,
                item_id,
                name,
                category,
                json,
            } => cmd_favorite_update(
                &service,
                &mut undo,
                &profile,
                &item_id,
                &name,
                category.as_deref(),
                json,
            ),
            FavoriteCommands::Remove {
                profile,
                item_id,
                json,
            } => cmd_item_remove(
                &service,
                &mut undo,
                &profile,
                Section::Favorites,
                &item_id,
                json,
            ),
        },
        Commands::Avoid { command } => match command {
            AvoidCommands::Add {
                profile,
                name,
                level,
                json,
            } => cmd_avoid_add(&service, &mut undo, &profile, &name, &level, json),
            AvoidCommands::Update {
                profile,
                item_id,
                name,
                level,
                json,
            } => cmd_avoid_update(&service, &mut undo, &profile, &item_id, &name, &level, json),
            AvoidCommands::Remove {
                profile,
                item_id,
                json,
            } => cmd_item_remove(
                &service,
                &mut undo,
                &profile,
                Section::Dislikes,
                &item_id,
                json,
            ),
        },
        Commands::Allergy { command } => match command {
            AllergyCommands::Add {
                profile,
                label,
                severity,
                json,
            } => cmd_allergy_add(&service, &mut undo, &profile, &label, &severity, json),
            AllergyCommands::Update {
                profile,
                item_id,
                label,
                severity,
                json,
            } => cmd_allergy_update(
                &service, &mut undo, &profile, &item_id, &label, &severity, json,
            ),
            AllergyCommands::Remove {
                profile,
                item_id,
                json,
            } => cmd_item_remove(
                &service,
                &mut undo,
                &profile,
                Section::Allergies,
                &item_id,
                json,
            ),
        },
        Commands::Notes { command } => match command {
            NotesCommands::Set {
                profile,
                text,
                by,
                json,
            } => cmd_notes_set(&service, &profile, &text, by.as_deref(), json),
            NotesCommands::Show { profile, json } => cmd_notes_show(&service, &profile, json),
        },
        Commands::Show { profile, json } => cmd_show(&service, &profile, json),
        Commands::Save { profile, json } => cmd_save(&service, &profile, json),
        Commands::Suggest {
            profile,
            category,
            seed,
            json,
        } => cmd_suggest(&service, &profile, category.as_deref(), seed, json),
        Commands::Check {
            profile,
            meal,
            ingredients,
            json,
        } => cmd_check(&service, &profile, &meal, ingredients.as_deref(), json),
        Commands::History {
            profile,
            clear,
            json,
        } => cmd_history(&service, &profile, clear, json),
        Commands::Export { profile, output } => cmd_export(&service, &profile, output.as_deref()),
        Commands::Clear { profile, json } => cmd_clear(&service, &profile, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let (api_key, new_api_key) = if no_auth {
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            server::start_server(service, port, &bind, api_key, new_api_key).await
        }
    }
}
