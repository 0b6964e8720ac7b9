// src/main.rs

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use uati_nexus::config::NexusConfig;
use uati_nexus::events::{ChannelSink, NexusEvent};
use uati_nexus::scheduler::{format_interval, ReviewScheduler};
use uati_nexus::{database, repository, service, NexusError};

#[derive(Parser)]
#[command(name = "nexus", about = "UATI Nexus flashcards and progress tracking", version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, default_value = "nexus.toml")]
    config: PathBuf,

    /// Override the database path from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deck management
    #[command(subcommand)]
    Deck(DeckCommand),

    /// Flashcard management
    #[command(subcommand)]
    Card(CardCommand),

    /// Rate a flashcard: 0 = fail, 1 = hard, 2 = good, 3 = easy
    Review { card: i64, quality: i64 },

    /// List due cards
    Due {
        #[arg(long)]
        deck: Option<i64>,
    },

    /// Curriculum modules
    #[command(subcommand)]
    Module(ModuleCommand),

    /// Topics inside a module
    #[command(subcommand)]
    Topic(TopicCommand),

    /// Projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Milestones inside a project
    #[command(subcommand)]
    Milestone(MilestoneCommand),

    /// List unlocked achievements
    Achievements,
}

#[derive(Subcommand)]
enum DeckCommand {
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Stats { deck: i64 },
    Rm { deck: i64 },
}

#[derive(Subcommand)]
enum CardCommand {
    Add { deck: i64, front: String, back: String },
    /// Show a card, its review history and the interval each rating would give
    Show { card: i64 },
    Rm { card: i64 },
}

#[derive(Subcommand)]
enum ModuleCommand {
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    /// Set manual progress (only for modules without topics)
    Progress { module: i64, value: i64 },
    Rm { module: i64 },
}

#[derive(Subcommand)]
enum TopicCommand {
    Add {
        module: i64,
        title: String,
        #[arg(long)]
        completed: bool,
    },
    List { module: i64 },
    Done { topic: i64 },
    Undo { topic: i64 },
    Rm { topic: i64 },
}

#[derive(Subcommand)]
enum ProjectCommand {
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    /// Set manual progress (only for projects without milestones)
    Progress { project: i64, value: i64 },
    Rm { project: i64 },
}

#[derive(Subcommand)]
enum MilestoneCommand {
    Add {
        project: i64,
        title: String,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    List { project: i64 },
    /// pending | in_progress | completed
    Status { milestone: i64, status: String },
    Rm { milestone: i64 },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = NexusConfig::load(&cli.config)
        .with_context(|| format!("failed to load config {:?}", cli.config))?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .init();
    info!("Starting UATI Nexus...");
    if cli.config.exists() {
        info!("Loaded config from {:?}", cli.config);
    } else {
        debug!("No config at {:?}, using defaults", cli.config);
    }

    let conn = database::open(&config.database_path).context("failed to open database")?;
    let scheduler = ReviewScheduler::new(config.scheduler.clone())?;
    let (sink, rx) = ChannelSink::new();

    // One clock read per invocation.
    let now = Utc::now();

    match cli.command {
        Command::Deck(cmd) => match cmd {
            DeckCommand::Add { name, description } => {
                print_json(&repository::create_deck(&conn, &name, description.as_deref(), now)?)?
            }
            DeckCommand::List => print_json(&repository::list_decks(&conn)?)?,
            DeckCommand::Stats { deck } => print_json(&service::deck_stats(&conn, deck, now)?)?,
            DeckCommand::Rm { deck } => {
                if !repository::delete_deck(&conn, deck)? {
                    return Err(NexusError::not_found("Deck", deck).into());
                }
            }
        },
        Command::Card(cmd) => match cmd {
            CardCommand::Add { deck, front, back } => {
                print_json(&service::create_flashcard(&conn, &scheduler, deck, &front, &back, now)?)?
            }
            CardCommand::Show { card } => {
                let view = repository::get_flashcard(&conn, card)?
                    .ok_or_else(|| NexusError::not_found("Flashcard", card))?;
                print_json(&view)?;
                print_json(&repository::get_review_log(&conn, card)?)?;
                if let Ok(preview) = scheduler.preview_intervals(&view.review, now) {
                    let labels: Vec<String> = preview.iter().map(|d| format_interval(*d)).collect();
                    println!("Fail {} | Hard {} | Good {} | Easy {}", labels[0], labels[1], labels[2], labels[3]);
                }
            }
            CardCommand::Rm { card } => {
                if !repository::delete_flashcard(&conn, card)? {
                    return Err(NexusError::not_found("Flashcard", card).into());
                }
            }
        },
        Command::Review { card, quality } => {
            print_json(&service::review_flashcard(&conn, &scheduler, card, quality, now, &sink)?)?
        }
        Command::Due { deck } => print_json(&service::due_cards(&conn, deck, now)?)?,
        Command::Module(cmd) => match cmd {
            ModuleCommand::Add { title, description } => {
                print_json(&repository::create_module(&conn, &title, description.as_deref(), now)?)?
            }
            ModuleCommand::List => print_json(&repository::list_modules(&conn)?)?,
            ModuleCommand::Progress { module, value } => {
                print_json(&service::set_module_progress(&conn, module, value, now, &sink)?)?
            }
            ModuleCommand::Rm { module } => {
                if !repository::delete_module(&conn, module)? {
                    return Err(NexusError::not_found("Module", module).into());
                }
            }
        },
        Command::Topic(cmd) => match cmd {
            TopicCommand::Add { module, title, completed } => {
                print_json(&service::create_topic(&conn, module, &title, completed, now, &sink)?)?
            }
            TopicCommand::List { module } => print_json(&repository::list_topics(&conn, module)?)?,
            TopicCommand::Done { topic } => {
                print_json(&service::set_topic_completed(&conn, topic, true, now, &sink)?)?
            }
            TopicCommand::Undo { topic } => {
                print_json(&service::set_topic_completed(&conn, topic, false, now, &sink)?)?
            }
            TopicCommand::Rm { topic } => service::delete_topic(&conn, topic, now, &sink)?,
        },
        Command::Project(cmd) => match cmd {
            ProjectCommand::Add { title, description } => {
                print_json(&repository::create_project(&conn, &title, description.as_deref(), now)?)?
            }
            ProjectCommand::List => print_json(&repository::list_projects(&conn)?)?,
            ProjectCommand::Progress { project, value } => {
                print_json(&service::set_project_progress(&conn, project, value, now, &sink)?)?
            }
            ProjectCommand::Rm { project } => {
                if !repository::delete_project(&conn, project)? {
                    return Err(NexusError::not_found("Project", project).into());
                }
            }
        },
        Command::Milestone(cmd) => match cmd {
            MilestoneCommand::Add { project, title, due } => {
                let due_date = due
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc());
                print_json(&service::create_milestone(&conn, project, &title, due_date, now, &sink)?)?
            }
            MilestoneCommand::List { project } => {
                print_json(&repository::list_milestones(&conn, project)?)?
            }
            MilestoneCommand::Status { milestone, status } => {
                print_json(&service::set_milestone_status(&conn, milestone, &status, now, &sink)?)?
            }
            MilestoneCommand::Rm { milestone } => service::delete_milestone(&conn, milestone, now, &sink)?,
        },
        Command::Achievements => print_json(&repository::list_unlocked_achievements(&conn)?)?,
    }

    drop(sink);
    report_events(rx);
    Ok(())
}

fn report_events(rx: Receiver<NexusEvent>) {
    for event in rx {
        match event {
            NexusEvent::AchievementUnlocked { achievement, .. } => {
                eprintln!("Achievement unlocked: {}", achievement)
            }
            NexusEvent::ModuleCompleted { module_id } => eprintln!("Module {} completed", module_id),
            NexusEvent::ProjectCompleted { project_id } => eprintln!("Project {} completed", project_id),
            other => debug!("{:?}", other),
        }
    }
}
