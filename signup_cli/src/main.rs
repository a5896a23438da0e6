use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use signup_core::journal::notices_for;
use signup_core::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "signup")]
#[command(about = "Volunteer event sign-up with reserve lists", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage events (administrator)
    Event {
        #[command(subcommand)]
        action: EventCommand,
    },

    /// Sign a user up for an event
    Register {
        /// Authenticated user ID
        #[arg(long)]
        user: String,

        event: u64,
    },

    /// Cancel a user's registration, promoting the next reserve if possible
    Cancel {
        /// Authenticated user ID
        #[arg(long)]
        user: String,

        event: u64,
    },

    /// Show the main and reserve lists of an event
    Roster {
        event: u64,

        /// Also export the roster as CSV to this path
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// List a user's registrations
    Mine {
        #[arg(long)]
        user: String,
    },

    /// List notices addressed to a user
    Notices {
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum EventCommand {
    /// Create a new event
    Create {
        #[arg(long)]
        name: String,

        /// Date as YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,

        /// Start time as HH:MM
        #[arg(long, value_parser = parse_time)]
        time: NaiveTime,

        /// Number of main-list slots
        #[arg(long)]
        capacity: u32,

        /// Number of reserve-list slots
        #[arg(long, default_value_t = 0)]
        reserve: u32,
    },

    /// List all events
    List,

    /// Remove an event and all of its registrations
    Remove { event: u64 },
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", s, e))
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("invalid time '{}': {}", s, e))
}

type Engine = WaitlistEngine<FileStore, FileStore>;

struct App {
    engine: Engine,
    journal_path: PathBuf,
}

fn main() -> ExitCode {
    signup_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if e.is_recoverable() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }

    let app = open_app(&config)?;

    match cli.command {
        Commands::Event { action } => match action {
            EventCommand::Create {
                name,
                date,
                time,
                capacity,
                reserve,
            } => cmd_event_create(
                &app,
                EventDraft {
                    name,
                    date,
                    time,
                    main_capacity: capacity,
                    reserve_capacity: reserve,
                },
            ),
            EventCommand::List => cmd_event_list(&app),
            EventCommand::Remove { event } => cmd_event_remove(&app, EventId(event)),
        },
        Commands::Register { user, event } => cmd_register(&app, user, EventId(event)),
        Commands::Cancel { user, event } => cmd_cancel(&app, user, EventId(event)),
        Commands::Roster { event, csv } => cmd_roster(&app, EventId(event), csv),
        Commands::Mine { user } => cmd_mine(&app, user),
        Commands::Notices { user } => cmd_notices(&app, user),
    }
}

fn open_app(config: &Config) -> Result<App> {
    let store = FileStore::open(config.data.store_dir())?;
    let locks = EventLocks::with_lock_dir(config.data.lock_dir())?;
    let engine = WaitlistEngine::with_locks(store.clone(), store, locks)
        .with_lock_timeout(config.locking.timeout());

    Ok(App {
        engine,
        journal_path: config.data.journal_path(),
    })
}

/// Hand notices to the messaging surface; delivery is best effort
fn hand_off(app: &App, notices: &[Notice]) {
    let mut sink = JsonlJournal::new(&app.journal_path);
    for notice in notices {
        if let Err(e) = sink.append(notice) {
            tracing::warn!("Failed to journal notice for {}: {}", notice.user_id, e);
        }
    }
}

fn cmd_event_create(app: &App, draft: EventDraft) -> Result<()> {
    let event = app.engine.create_event(draft)?;
    println!("✓ Created event {}: {}", event.id, event.name);
    println!(
        "  {} {} {} | {} main, {} reserve",
        event.weekday(),
        event.date,
        event.time.format("%H:%M"),
        event.main_capacity,
        event.reserve_capacity
    );
    Ok(())
}

fn cmd_event_list(app: &App) -> Result<()> {
    let events = app.engine.list_events()?;
    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }

    for event in events {
        let roster = app.engine.roster(event.id)?;
        println!(
            "{:>4}  {:<30} {} {} {}  main {}/{}  reserve {}/{}",
            event.id,
            event.name,
            event.weekday(),
            event.date,
            event.time.format("%H:%M"),
            roster.registered.len(),
            event.main_capacity,
            roster.reserve.len(),
            event.reserve_capacity
        );
    }
    Ok(())
}

fn cmd_event_remove(app: &App, event_id: EventId) -> Result<()> {
    let ctx = RequestContext::new("admin");
    let dropped = app.engine.remove_event(&ctx, event_id)?;
    println!(
        "✓ Removed event {} ({} registrations dropped)",
        event_id, dropped
    );
    Ok(())
}

fn cmd_register(app: &App, user: String, event_id: EventId) -> Result<()> {
    let ctx = RequestContext::new(user);
    let status = app.engine.register(&ctx, event_id)?;

    hand_off(
        app,
        &[Notice::new(event_id, ctx.user_id.clone(), status.into())],
    );

    match status {
        Status::Registered => println!("✓ Registered for event {}", event_id),
        Status::Reserve => println!("✓ Added to the reserve list for event {}", event_id),
    }
    Ok(())
}

fn cmd_cancel(app: &App, user: String, event_id: EventId) -> Result<()> {
    let ctx = RequestContext::new(user);
    let outcome = app.engine.cancel(&ctx, event_id)?;

    hand_off(app, &Notice::for_cancellation(&outcome));

    println!("✓ Registration cancelled for event {}", event_id);
    if let Some(promoted) = outcome.promoted_user() {
        println!("  ↑ {} promoted from the reserve list", promoted);
    }
    Ok(())
}

fn cmd_roster(app: &App, event_id: EventId, csv: Option<PathBuf>) -> Result<()> {
    let roster = app.engine.roster(event_id)?;
    let event = &roster.event;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {} (event {})", event.name, event.id);
    println!("╰─────────────────────────────────────────╯");
    println!(
        "  {} {} {}",
        event.weekday(),
        event.date,
        event.time.format("%H:%M")
    );
    println!();

    println!(
        "  Main list ({}/{}):",
        roster.registered.len(),
        event.main_capacity
    );
    for (idx, registration) in roster.registered.iter().enumerate() {
        println!("    {}. {}", idx + 1, registration.user_id);
    }

    println!(
        "  Reserve list ({}/{}):",
        roster.reserve.len(),
        event.reserve_capacity
    );
    for (idx, registration) in roster.reserve.iter().enumerate() {
        println!("    {}. {}", idx + 1, registration.user_id);
    }

    if let Some(path) = csv {
        let rows = export_roster_csv(&roster, &path)?;
        println!();
        println!("✓ Exported {} rows to {}", rows, path.display());
    }

    Ok(())
}

fn cmd_mine(app: &App, user: String) -> Result<()> {
    let registrations = app.engine.registrations_for(&UserId::new(user))?;
    if registrations.is_empty() {
        println!("You have no registrations.");
        return Ok(());
    }

    for (event, registration) in registrations {
        println!(
            "{:>4}  {:<30} {} {}  {}",
            event.id,
            event.name,
            event.date,
            event.time.format("%H:%M"),
            registration.status
        );
    }
    Ok(())
}

fn cmd_notices(app: &App, user: String) -> Result<()> {
    let notices = notices_for(&app.journal_path, &UserId::new(user))?;
    if notices.is_empty() {
        println!("No notices.");
        return Ok(());
    }

    for notice in notices {
        let text = match notice.kind {
            NoticeKind::Registered => "registered",
            NoticeKind::Reserved => "added to the reserve list",
            NoticeKind::Cancelled => "registration cancelled",
            NoticeKind::Promoted => "promoted from the reserve list",
        };
        println!(
            "{}  event {}: {}",
            notice.at.format("%Y-%m-%d %H:%M"),
            notice.event_id,
            text
        );
    }
    Ok(())
}
