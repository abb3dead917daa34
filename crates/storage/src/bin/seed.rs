use std::fmt;

use chrono::{DateTime, Duration, Utc};
use lesson_core::model::{
    CourseId, LessonId, NewBookmark, ProgressRecord, UserId, percentage_of,
};
use storage::repository::Storage;

const SAMPLE_LESSON_SECONDS: f64 = 600.0;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    course_id: CourseId,
    lessons: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidCourseId { raw: String },
    InvalidLessons { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course value: {raw}"),
            ArgsError::InvalidLessons { raw } => write!(f, "invalid --lessons value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn env_id<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse::<T>().ok())
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("COURSE_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut user_id = env_id::<UserId>("COURSE_USER_ID").unwrap_or_else(UserId::random);
        let mut course_id = env_id::<CourseId>("COURSE_ID").unwrap_or_else(CourseId::random);
        let mut lessons = env_id::<u32>("COURSE_SEED_LESSONS").unwrap_or(4);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                "--course" => {
                    let value = require_value(&mut args, "--course")?;
                    course_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidCourseId { raw: value.clone() })?;
                }
                "--lessons" => {
                    let value = require_value(&mut args, "--lessons")?;
                    lessons = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidLessons { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            course_id,
            lessons,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --user <uuid>             Learner to seed progress for (default: random)");
    eprintln!("  --course <uuid>           Course the lessons belong to (default: random)");
    eprintln!("  --lessons <n>             Number of lessons with progress (default: 4)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  COURSE_DB_URL, COURSE_USER_ID, COURSE_ID, COURSE_SEED_LESSONS");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    for i in 0..args.lessons {
        let lesson_id = LessonId::random();
        // First lesson finished, the rest progressively less watched.
        let watched = if i == 0 {
            SAMPLE_LESSON_SECONDS
        } else {
            (SAMPLE_LESSON_SECONDS / f64::from(i + 1)).floor()
        };
        let record = ProgressRecord {
            current_time_seconds: watched,
            progress_percentage: percentage_of(watched, SAMPLE_LESSON_SECONDS),
            total_watch_time_seconds: watched,
            completed: i == 0,
            last_accessed_at: now - Duration::hours(i64::from(i)),
            ..ProgressRecord::started(args.user_id, lesson_id, args.course_id, now)
        };
        storage.progress.upsert_progress(&record).await?;

        for (t, title) in [(15.0, Some("Overview")), (watched / 2.0, None)] {
            let bookmark = NewBookmark::new(
                args.user_id,
                lesson_id,
                t,
                title.map(str::to_string),
                now,
            )?;
            storage.progress.create_bookmark(bookmark).await?;
        }

        println!("lesson {lesson_id}: {watched:.0}s watched");
    }

    println!(
        "Seeded {} lessons for user {} in course {} into {}",
        args.lessons, args.user_id, args.course_id, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
