use actlog_core::mailer::read_outbox;
use actlog_core::*;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "actlog")]
#[command(about = "Internship activity table: filter and export logged activities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read activities from this file instead of <data-dir>/activities.json
    #[arg(long, global = true)]
    activities: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the filter rules available for each facet
    Facets,

    /// Show activities matching the filters (default)
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Export activities matching the filters
    Export {
        #[command(flatten)]
        filters: FilterArgs,

        /// Export format (csv, txt, email)
        #[arg(long)]
        format: Option<String>,

        /// Mail destination for the email format
        #[arg(long)]
        to: Option<String>,
    },

    /// Show mails waiting in the outbox
    Outbox,
}

/// Repeatable facet rules; values within a facet are OR-ed, facets are AND-ed.
/// Repeating the same value selects it once.
#[derive(Args, Default)]
struct FilterArgs {
    #[arg(long)]
    duration: Vec<String>,

    #[arg(long = "resource-detail")]
    resource_detail: Vec<String>,

    #[arg(long)]
    category: Vec<String>,

    #[arg(long)]
    difficulty: Vec<String>,
}

impl FilterArgs {
    fn events(self) -> Vec<Event> {
        let FilterArgs {
            duration,
            resource_detail,
            category,
            difficulty,
        } = self;

        [
            (Facet::Duration, duration),
            (Facet::ResourceDetail, resource_detail),
            (Facet::Category, category),
            (Facet::Difficulty, difficulty),
        ]
        .into_iter()
        .flat_map(|(facet, mut values)| {
            // Each event toggles, so a value given twice must only be sent once
            values.sort();
            values.dedup();
            values
                .into_iter()
                .map(move |value| Event::ToggleRule { facet, value })
        })
        .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    actlog_core::logging::init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    let activities_path = cli
        .activities
        .unwrap_or_else(|| config.data.activities_path());

    match cli.command {
        Some(Commands::Facets) => cmd_facets(&activities_path),
        Some(Commands::List { filters }) => cmd_list(&activities_path, filters),
        Some(Commands::Export {
            filters,
            format,
            to,
        }) => cmd_export(&activities_path, filters, format, to, &config).await,
        Some(Commands::Outbox) => cmd_outbox(&config),
        None => cmd_list(&activities_path, FilterArgs::default()),
    }
}

fn load_table(activities_path: &Path, filters: FilterArgs) -> Result<TableState> {
    let mut state = TableState::new(load_activities(activities_path)?);
    for event in filters.events() {
        state = state.update(event).0;
    }
    Ok(state)
}

fn cmd_facets(activities_path: &Path) -> Result<()> {
    let state = load_table(activities_path, FilterArgs::default())?;

    for facet in Facet::ALL {
        println!("{} [{}]", facet.header(), facet);
        let rules = state.filters().rules(facet);
        if rules.is_empty() {
            println!("  (none)");
        }
        for rule in rules {
            println!("  {}", rule);
        }
    }

    Ok(())
}

fn cmd_list(activities_path: &Path, filters: FilterArgs) -> Result<()> {
    let view = load_table(activities_path, filters)?.view();
    display_table(&view);
    Ok(())
}

async fn cmd_export(
    activities_path: &Path,
    filters: FilterArgs,
    format: Option<String>,
    to: Option<String>,
    config: &Config,
) -> Result<()> {
    let format = match format {
        Some(f) => f.parse::<ExportFormat>()?,
        None => config.export.default_format,
    };

    let state = load_table(activities_path, filters)?.with_export(format);
    let coordinator = ExportCoordinator::new(
        DirectoryDownload::new(config.data.export_dir()),
        OutboxTransport::new(config.data.outbox_path()),
    )
    .with_reset_delay(config.export.status_reset_delay());

    let mut session = TableSession::new(state, coordinator);
    if let Some(to) = to {
        session.handle(Event::EditDestination(to))?;
    }

    let view = session.view();
    if !view.export_enabled {
        return Err(if view.activities.is_empty() {
            Error::EmptySelection
        } else {
            Error::InvalidDestination(view.destination)
        });
    }

    let outcomes = session.handle(Event::ExportRequested)?;
    for outcome in outcomes {
        match outcome {
            ExportOutcome::Downloaded { path, count } => {
                println!("✓ Exported {} activities", count);
                println!("  File: {}", path.display());
            }
            ExportOutcome::Dispatched(mut dispatch) => {
                println!("Sending {} activities...", view.activities.len());
                match dispatch.outcome().await {
                    ExportStatus::Success => {
                        println!("✓ Mail queued for {}", view.destination);
                    }
                    _ => {
                        return Err(Error::Transport(format!(
                            "could not send mail to {}",
                            view.destination
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

fn cmd_outbox(config: &Config) -> Result<()> {
    let entries = read_outbox(&config.data.outbox_path())?;
    if entries.is_empty() {
        println!("Outbox is empty.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {}  {} activities  ({})",
            entry.queued_at.format("%Y-%m-%d %H:%M"),
            entry.request.destination,
            entry.request.activities.len(),
            entry.id
        );
    }
    Ok(())
}

fn display_table(view: &TableView) {
    println!(
        "{:>5}  {:<10}  {:<8}  {:<12}  {:<12}  {:<12}  {:<10}  Description",
        "Id", "Date", "Tijd", "Hulpbron", "Categorie", "Complexiteit", "Status"
    );
    for activity in &view.activities {
        println!(
            "{:>5}  {:<10}  {:<8}  {:<12}  {:<12}  {:<12}  {:<10}  {}",
            activity.id,
            activity
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            activity.duration,
            activity.resource_detail,
            activity.category,
            activity.difficulty,
            activity.status,
            activity.description
        );
    }
    println!();
    println!("{} of {} activities shown", view.activities.len(), view.total);
}
