//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    AddUserArgs, BrowseArgs, CliArgs, Command, CommonOverrides, IngestArgs, MigrateArgs,
    UsersArgs, UsersCommand,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "parchment";
const ENV_PREFIX: &str = "PARCHMENT";
const DEFAULT_DB_MAX_CONNECTIONS: u64 = 8;
const DEFAULT_INGEST_MAX_BYTES: u64 = 1024 * 1024;
const DEFAULT_BROWSER_PAGE_SIZE: u64 = 4;
const DEFAULT_BROWSER_TICK_MILLIS: u64 = 100;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub ingest: IngestSettings,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub max_bytes: NonZeroU64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_bytes: NonZeroU64::new(DEFAULT_INGEST_MAX_BYTES).unwrap_or(NonZeroU64::MIN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub page_size: NonZeroUsize,
    pub tick: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            page_size: NonZeroUsize::new(DEFAULT_BROWSER_PAGE_SIZE as usize)
                .unwrap_or(NonZeroUsize::MIN),
            tick: Duration::from_millis(DEFAULT_BROWSER_TICK_MILLIS),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_command_overrides(&cli.command);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    ingest: RawIngestSettings,
    browser: RawBrowserSettings,
}

impl RawSettings {
    fn apply_command_overrides(&mut self, command: &Command) {
        match command {
            Command::Ingest(args) => {
                self.apply_common_overrides(&args.common);
                if let Some(max_bytes) = args.max_bytes {
                    self.ingest.max_bytes = Some(max_bytes);
                }
            }
            Command::Browse(args) => {
                self.apply_common_overrides(&args.common);
                if let Some(page_size) = args.page_size {
                    self.browser.page_size = Some(page_size);
                }
                if let Some(tick_millis) = args.tick_millis {
                    self.browser.tick_millis = Some(tick_millis);
                }
            }
            Command::Users(args) => match &args.command {
                UsersCommand::Add(add) => self.apply_common_overrides(&add.common),
            },
            Command::Migrate(args) => self.apply_common_overrides(&args.common),
        }
    }

    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            ingest,
            browser,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            ingest: build_ingest_settings(ingest)?,
            browser: build_browser_settings(browser)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_ingest_settings(ingest: RawIngestSettings) -> Result<IngestSettings, LoadError> {
    let value = ingest.max_bytes.unwrap_or(DEFAULT_INGEST_MAX_BYTES);
    let max_bytes = NonZeroU64::new(value)
        .ok_or_else(|| LoadError::invalid("ingest.max_bytes", "must be greater than zero"))?;
    usize::try_from(value).map_err(|_| {
        LoadError::invalid(
            "ingest.max_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(IngestSettings { max_bytes })
}

fn build_browser_settings(browser: RawBrowserSettings) -> Result<BrowserSettings, LoadError> {
    let page_size_value = browser.page_size.unwrap_or(DEFAULT_BROWSER_PAGE_SIZE);
    let page_size = usize::try_from(page_size_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid(
                "browser.page_size",
                "must be greater than zero and fit in usize",
            )
        })?;

    let tick_millis = browser.tick_millis.unwrap_or(DEFAULT_BROWSER_TICK_MILLIS);
    if tick_millis == 0 {
        return Err(LoadError::invalid(
            "browser.tick_millis",
            "must be greater than zero",
        ));
    }

    Ok(BrowserSettings {
        page_size,
        tick: Duration::from_millis(tick_millis),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawIngestSettings {
    max_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowserSettings {
    page_size: Option<u64>,
    tick_millis: Option<u64>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
