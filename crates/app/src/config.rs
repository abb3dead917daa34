use std::fmt;

use lesson_core::model::{
    CourseId, LessonId, LessonSource, LessonSourceError, LessonTarget, PlayerSettings,
    PlayerSettingsDraft, SettingsError, UserId,
};
use storage::rest::RestConfig;

/// Lookup for environment fallbacks; `std::env::var` in the binary, a map in tests.
pub(crate) type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";

#[derive(Debug)]
pub(crate) enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    Required { flag: &'static str, env: &'static str },
    InvalidId { flag: &'static str, raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidStore { raw: String },
    Source(LessonSourceError),
    Settings(SettingsError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::Required { flag, env } => write!(f, "{flag} (or {env}) is required"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidStore { raw } => {
                write!(f, "invalid --store value (expected sqlite or rest): {raw}")
            }
            ArgsError::Source(err) => write!(f, "invalid --src value: {err}"),
            ArgsError::Settings(err) => write!(f, "invalid player settings: {err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Play,
    Progress,
}

impl Command {
    pub(crate) fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "progress" => Some(Self::Progress),
            _ => None,
        }
    }
}

/// Where progress lives.
#[derive(Debug, Clone)]
pub(crate) enum StoreConfig {
    Sqlite { db_url: String },
    Rest(RestConfig),
}

#[derive(Debug, Clone)]
pub(crate) struct PlayArgs {
    pub store: StoreConfig,
    pub user_id: UserId,
    pub lesson: LessonTarget,
    pub settings: PlayerSettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ProgressArgs {
    pub store: StoreConfig,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub lesson_id: Option<LessonId>,
}

/// Flags shared by every subcommand, collected before validation.
#[derive(Default)]
struct RawArgs {
    db: Option<String>,
    store: Option<String>,
    user: Option<String>,
    course: Option<String>,
    lesson: Option<String>,
    src: Option<String>,
    title: Option<String>,
    start: Option<String>,
    autoplay: bool,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl RawArgs {
    fn collect(
        args: &mut impl Iterator<Item = String>,
        allowed: &[&'static str],
    ) -> Result<Self, ArgsError> {
        let mut raw = Self::default();
        while let Some(arg) = args.next() {
            let Some(flag) = allowed.iter().copied().find(|flag| *flag == arg) else {
                return Err(ArgsError::UnknownArg(arg));
            };
            let slot = match flag {
                "--autoplay" => {
                    raw.autoplay = true;
                    continue;
                }
                "--db" => &mut raw.db,
                "--store" => &mut raw.store,
                "--user" => &mut raw.user,
                "--course" => &mut raw.course,
                "--lesson" => &mut raw.lesson,
                "--src" => &mut raw.src,
                "--title" => &mut raw.title,
                "--start" => &mut raw.start,
                _ => return Err(ArgsError::UnknownArg(arg)),
            };
            *slot = Some(require_value(args, flag)?);
        }
        Ok(raw)
    }
}

fn flag_or_env(value: Option<String>, env: EnvLookup<'_>, key: &str) -> Option<String> {
    value
        .or_else(|| env(key))
        .filter(|value| !value.trim().is_empty())
}

fn parse_id<T: std::str::FromStr>(
    value: Option<String>,
    env: EnvLookup<'_>,
    flag: &'static str,
    key: &'static str,
) -> Result<Option<T>, ArgsError> {
    flag_or_env(value, env, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| ArgsError::InvalidId { flag, raw: raw.clone() })
        })
        .transpose()
}

fn require_id<T: std::str::FromStr>(
    value: Option<String>,
    env: EnvLookup<'_>,
    flag: &'static str,
    key: &'static str,
) -> Result<T, ArgsError> {
    parse_id(value, env, flag, key)?.ok_or(ArgsError::Required { flag, env: key })
}

fn parse_number<T: std::str::FromStr>(
    raw: Option<String>,
    flag: &'static str,
) -> Result<Option<T>, ArgsError> {
    raw.map(|raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|_| ArgsError::InvalidNumber { flag, raw: raw.clone() })
    })
    .transpose()
}

fn store_config(raw: &mut RawArgs, env: EnvLookup<'_>) -> Result<StoreConfig, ArgsError> {
    let kind = flag_or_env(raw.store.take(), env, "COURSE_STORE").unwrap_or_else(|| "sqlite".into());
    match kind.trim() {
        "sqlite" => {
            let db_url = flag_or_env(raw.db.take(), env, "COURSE_DB_URL")
                .unwrap_or_else(|| DEFAULT_DB_URL.into());
            Ok(StoreConfig::Sqlite {
                db_url: normalize_sqlite_url(&db_url),
            })
        }
        "rest" => {
            let url = env("COURSE_REST_URL").ok_or(ArgsError::Required {
                flag: "--store rest",
                env: "COURSE_REST_URL",
            })?;
            let api_key = env("COURSE_REST_API_KEY").ok_or(ArgsError::Required {
                flag: "--store rest",
                env: "COURSE_REST_API_KEY",
            })?;
            let mut config = RestConfig::new(url, api_key);
            if let Some(token) = env("COURSE_REST_TOKEN") {
                config = config.with_access_token(token);
            }
            Ok(StoreConfig::Rest(config))
        }
        _ => Err(ArgsError::InvalidStore { raw: kind }),
    }
}

fn settings_from_env(env: EnvLookup<'_>, autoplay: bool) -> Result<PlayerSettings, ArgsError> {
    let draft = PlayerSettingsDraft {
        throttle_interval_secs: parse_number(
            env("COURSE_PROGRESS_THROTTLE_SECS"),
            "COURSE_PROGRESS_THROTTLE_SECS",
        )?,
        debounce_ms: parse_number(env("COURSE_PROGRESS_DEBOUNCE_MS"), "COURSE_PROGRESS_DEBOUNCE_MS")?,
        controls_hide_after_ms: parse_number(env("COURSE_CONTROLS_HIDE_MS"), "COURSE_CONTROLS_HIDE_MS")?,
        autoplay: Some(autoplay),
        ..PlayerSettingsDraft::new()
    };
    draft.validate().map_err(ArgsError::Settings)
}

impl PlayArgs {
    pub(crate) fn parse(
        args: &mut impl Iterator<Item = String>,
        env: EnvLookup<'_>,
    ) -> Result<Self, ArgsError> {
        let mut raw = RawArgs::collect(
            args,
            &[
                "--db", "--store", "--user", "--course", "--lesson", "--src", "--title", "--start",
                "--autoplay",
            ],
        )?;
        let store = store_config(&mut raw, env)?;
        let user_id = require_id(raw.user, env, "--user", "COURSE_USER_ID")?;
        let course_id = require_id(raw.course, env, "--course", "COURSE_ID")?;
        let lesson_id = require_id(raw.lesson, env, "--lesson", "COURSE_LESSON_ID")?;
        let src = flag_or_env(raw.src, env, "COURSE_LESSON_SRC").ok_or(ArgsError::Required {
            flag: "--src",
            env: "COURSE_LESSON_SRC",
        })?;
        let source = LessonSource::parse(&src).map_err(ArgsError::Source)?;
        let title = flag_or_env(raw.title, env, "COURSE_LESSON_TITLE")
            .unwrap_or_else(|| "Lesson".to_string());
        let start_time_seconds = parse_number::<f64>(raw.start, "--start")?
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0);
        let autoplay = raw.autoplay || env("COURSE_AUTOPLAY").is_some_and(|v| v == "1" || v == "true");
        let settings = settings_from_env(env, autoplay)?;

        Ok(Self {
            store,
            user_id,
            lesson: LessonTarget {
                lesson_id,
                course_id,
                title,
                source,
                start_time_seconds,
            },
            settings,
        })
    }
}

impl ProgressArgs {
    pub(crate) fn parse(
        args: &mut impl Iterator<Item = String>,
        env: EnvLookup<'_>,
    ) -> Result<Self, ArgsError> {
        let mut raw = RawArgs::collect(args, &["--db", "--store", "--user", "--course", "--lesson"])?;
        let store = store_config(&mut raw, env)?;
        Ok(Self {
            store,
            user_id: require_id(raw.user, env, "--user", "COURSE_USER_ID")?,
            course_id: require_id(raw.course, env, "--course", "COURSE_ID")?,
            lesson_id: parse_id(raw.lesson, env, "--lesson", "COURSE_LESSON_ID")?,
        })
    }
}

pub(crate) fn normalize_sqlite_url(raw: &str) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw.to_string();
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

pub(crate) fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play     --user <uuid> --course <uuid> --lesson <uuid> --src <url>");
    eprintln!("                               [--title <text>] [--start <secs>] [--autoplay]");
    eprintln!("                               [--db <sqlite_url>] [--store sqlite|rest]");
    eprintln!("  cargo run -p app -- progress --user <uuid> --course <uuid> [--lesson <uuid>]");
    eprintln!("                               [--db <sqlite_url>] [--store sqlite|rest]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://dev.sqlite3");
    eprintln!("  --store sqlite");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_STORE, COURSE_USER_ID, COURSE_ID, COURSE_LESSON_ID,");
    eprintln!("  COURSE_LESSON_SRC, COURSE_LESSON_TITLE, COURSE_AUTOPLAY,");
    eprintln!("  COURSE_PROGRESS_THROTTLE_SECS, COURSE_PROGRESS_DEBOUNCE_MS, COURSE_CONTROLS_HIDE_MS,");
    eprintln!("  COURSE_REST_URL, COURSE_REST_API_KEY, COURSE_REST_TOKEN (for --store rest)");
    eprintln!("  RUST_LOG");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const USER: &str = "7d0d7c8e-3c1f-4b8e-9d51-0f9f1b7a6a01";
    const COURSE: &str = "c1a2b3c4-d5e6-4f70-8a9b-0c1d2e3f4a5b";
    const LESSON: &str = "0e9b6c1a-7f2d-4c3b-a8e1-5d4c3b2a1f00";

    fn args(list: &[&str]) -> std::vec::IntoIter<String> {
        list.iter().map(ToString::to_string).collect::<Vec<_>>().into_iter()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn play_reads_flags_and_env_fallbacks() {
        let env = env_of(&[
            ("COURSE_USER_ID", USER),
            ("COURSE_LESSON_SRC", "/videos/intro.mp4"),
            ("COURSE_PROGRESS_THROTTLE_SECS", "15"),
        ]);
        let parsed = PlayArgs::parse(
            &mut args(&[
                "--course", COURSE, "--lesson", LESSON, "--start", "42.5", "--autoplay", "--db",
                "sqlite:///tmp/lessons.sqlite3",
            ]),
            &env,
        )
        .unwrap();

        assert_eq!(parsed.user_id.to_string(), USER);
        assert_eq!(parsed.lesson.course_id.to_string(), COURSE);
        assert_eq!(parsed.lesson.start_time_seconds, Some(42.5));
        assert_eq!(parsed.lesson.source.as_str(), "file:///videos/intro.mp4");
        assert_eq!(parsed.lesson.title, "Lesson");
        assert!(parsed.settings.autoplay());
        assert_eq!(parsed.settings.throttle_interval_secs(), 15.0);
        assert!(matches!(
            parsed.store,
            StoreConfig::Sqlite { ref db_url } if db_url == "sqlite:///tmp/lessons.sqlite3"
        ));
    }

    #[test]
    fn play_requires_lesson_source() {
        let env = env_of(&[]);
        let err = PlayArgs::parse(
            &mut args(&["--user", USER, "--course", COURSE, "--lesson", LESSON]),
            &env,
        )
        .unwrap_err();
        assert!(matches!(err, ArgsError::Required { flag: "--src", .. }));
    }

    #[test]
    fn rejects_bad_ids_and_unknown_flags() {
        let env = env_of(&[]);
        let err = ProgressArgs::parse(&mut args(&["--user", "nope"]), &env).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidId { flag: "--user", .. }));

        let err = ProgressArgs::parse(&mut args(&["--src", "x"]), &env).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownArg(ref arg) if arg == "--src"));

        let err = ProgressArgs::parse(&mut args(&["--user"]), &env).unwrap_err();
        assert!(matches!(err, ArgsError::MissingValue { flag: "--user" }));
    }

    #[test]
    fn rest_store_reads_credentials_from_env() {
        let env = env_of(&[
            ("COURSE_REST_URL", "https://db.example.com"),
            ("COURSE_REST_API_KEY", "anon"),
            ("COURSE_REST_TOKEN", "jwt"),
        ]);
        let parsed = ProgressArgs::parse(
            &mut args(&["--store", "rest", "--user", USER, "--course", COURSE]),
            &env,
        )
        .unwrap();
        let StoreConfig::Rest(config) = parsed.store else {
            panic!("expected rest store");
        };
        assert_eq!(config.base_url, "https://db.example.com");
        assert_eq!(config.access_token.as_deref(), Some("jwt"));
        assert!(parsed.lesson_id.is_none());

        let err = ProgressArgs::parse(&mut args(&["--store", "rest"]), &env_of(&[])).unwrap_err();
        assert!(matches!(err, ArgsError::Required { env: "COURSE_REST_URL", .. }));
        let err = ProgressArgs::parse(&mut args(&["--store", "cloud"]), &env).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidStore { .. }));
    }

    #[test]
    fn invalid_settings_are_reported() {
        let env = env_of(&[
            ("COURSE_USER_ID", USER),
            ("COURSE_ID", COURSE),
            ("COURSE_LESSON_ID", LESSON),
            ("COURSE_LESSON_SRC", "https://cdn.example.com/a.mp4"),
            ("COURSE_PROGRESS_DEBOUNCE_MS", "0"),
        ]);
        let err = PlayArgs::parse(&mut args(&[]), &env).unwrap_err();
        assert!(matches!(err, ArgsError::Settings(SettingsError::InvalidDebounce)));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        let url = normalize_sqlite_url("sqlite:data/dev.sqlite3");
        assert!(url.starts_with("sqlite:///"), "{url}");
        assert!(url.ends_with("data/dev.sqlite3"), "{url}");
    }
}
