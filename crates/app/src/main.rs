mod config;

use std::path::Path;
use std::sync::Arc;

use dioxus::LaunchBuilder;
use dioxus::desktop::{Config as DesktopConfig, WindowBuilder};
use lesson_core::model::{LessonTarget, PlayerSettings, UserId, format_timestamp};
use services::{AppServices, Clock, CourseProgressService, ProgressTracker};
use tracing_subscriber::EnvFilter;
use ui::{App, UiApp, build_app_context};

use config::{ArgsError, Command, PlayArgs, ProgressArgs, StoreConfig, print_usage};

const DEFAULT_LOG_FILTER: &str = "app=info,services=info,storage=info,ui=info,sqlx=warn";

struct DesktopApp {
    services: AppServices,
    lesson: LessonTarget,
}

impl UiApp for DesktopApp {
    fn user_id(&self) -> UserId {
        self.services.user_id()
    }

    fn lesson(&self) -> LessonTarget {
        self.lesson.clone()
    }

    fn settings(&self) -> PlayerSettings {
        self.services.settings().clone()
    }

    fn tracker(&self) -> ProgressTracker {
        self.services.tracker()
    }

    fn course_progress(&self) -> Arc<CourseProgressService> {
        self.services.course_progress()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load_dotenv() -> Result<(), dotenvy::Error> {
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    }
    Ok(())
}

async fn open_services(
    store: &StoreConfig,
    user_id: UserId,
    settings: PlayerSettings,
) -> Result<AppServices, Box<dyn std::error::Error>> {
    let clock = Clock::system();
    match store {
        StoreConfig::Sqlite { db_url } => {
            // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
            prepare_sqlite_file(db_url)?;
            Ok(AppServices::new_sqlite(db_url, user_id, settings, clock).await?)
        }
        StoreConfig::Rest(config) => {
            tracing::info!(base_url = %config.base_url, "using hosted progress store");
            Ok(AppServices::new_rest(config.clone(), user_id, settings, clock)?)
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv()?;
    init_tracing();

    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: launching the player when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if argv.first().is_some_and(|first| !first.starts_with("--")) {
        argv.remove(0);
    }

    let env = |key: &str| std::env::var(key).ok();
    let mut iter = argv.into_iter();
    let report = |e: ArgsError| {
        eprintln!("{e}");
        print_usage();
        e
    };

    match cmd {
        Command::Play => {
            let args = PlayArgs::parse(&mut iter, &env).map_err(report)?;
            let services = open_services(&args.store, args.user_id, args.settings).await?;
            tracing::info!(
                lesson_id = %args.lesson.lesson_id,
                course_id = %args.lesson.course_id,
                "opening lesson"
            );

            let title = args.lesson.title.clone();
            let app: Arc<dyn UiApp> = Arc::new(DesktopApp {
                services,
                lesson: args.lesson,
            });
            let context = build_app_context(&app);

            // On macOS, Dioxus/tao can default to an always-on-top window in some dev setups.
            let desktop_cfg = DesktopConfig::new().with_window(
                WindowBuilder::new()
                    .with_title(title)
                    .with_always_on_top(false),
            );

            LaunchBuilder::desktop()
                .with_cfg(desktop_cfg)
                .with_context(context)
                .launch(App);
            Ok(())
        }
        Command::Progress => {
            let args = ProgressArgs::parse(&mut iter, &env).map_err(report)?;
            let services =
                open_services(&args.store, args.user_id, PlayerSettings::default()).await?;
            let course_progress = services.course_progress();
            let summary = course_progress.summary(args.user_id, args.course_id).await?;

            println!("course {}", summary.course_id);
            println!("  lessons started:   {}", summary.lessons_started);
            println!("  lessons completed: {}", summary.lessons_completed);
            println!("  watch time:        {}", format_timestamp(summary.total_watch_time_seconds));
            if let Some(at) = summary.last_accessed {
                println!("  last accessed:     {}", at.to_rfc3339());
            }
            for record in &summary.lessons {
                let status = if record.completed { "done" } else { "open" };
                println!(
                    "  - {} {:>3}% at {} [{status}]",
                    record.lesson_id,
                    record.progress_percentage,
                    format_timestamp(record.current_time_seconds)
                );
            }
            if let Some(lesson_id) = args.lesson_id {
                match course_progress.resume_position(args.user_id, lesson_id).await? {
                    Some(seconds) => {
                        println!("resume {lesson_id} at {}", format_timestamp(seconds));
                    }
                    None => println!("no progress for lesson {lesson_id}"),
                }
            } else if let Some(next) = summary.continue_with() {
                println!("continue with {}", next.lesson_id);
            }
            Ok(())
        }
    }
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
