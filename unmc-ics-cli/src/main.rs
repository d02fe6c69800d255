mod cache;
mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::SourceArgs;

#[derive(Parser)]
#[command(name = "unmc-ics")]
#[command(about = "Convert UNMC timetables into ICS calendars")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the classes on a timetable, ordered by module name
    Classes {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate an ICS file from a timetable
    Generate {
        #[command(flatten)]
        source: SourceArgs,

        /// Monday of week 1 (YYYY-MM-DD, e.g. 2024-09-02)
        #[arg(short = 's', long)]
        start_date: String,

        /// Only include this class ("CODE - Name"); repeat for more
        #[arg(short = 'c', long = "class")]
        classes: Vec<String>,

        /// Output file path
        #[arg(short, long, default_value = "unmc_timetable.ics")]
        output: PathBuf,

        /// Calendar name
        #[arg(long)]
        calendar_name: Option<String>,

        /// Reminder before each class (minutes)
        #[arg(long)]
        reminder_minutes: Option<u32>,

        /// Leave out event descriptions
        #[arg(long)]
        no_description: bool,

        /// Print the events as JSON instead of writing a file
        #[arg(long)]
        json: bool,
    },

    /// Remove cached timetable pages
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("unmc_ics_cli={log_level},unmc_ics_core={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Classes { source, json } => commands::classes_command(source, json).await,

        Commands::Generate {
            source,
            start_date,
            classes,
            output,
            calendar_name,
            reminder_minutes,
            no_description,
            json,
        } => {
            commands::generate_command(commands::GenerateParams {
                source,
                start_date,
                classes,
                output,
                calendar_name,
                reminder_minutes,
                include_description: !no_description,
                json,
            })
            .await
        }

        Commands::ClearCache => commands::clear_cache_command().await,
    }
}
