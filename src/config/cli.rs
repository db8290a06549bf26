use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Parchment binary.
#[derive(Debug, Parser)]
#[command(
    name = "parchment",
    version,
    about = "Publish and manage text posts from a terminal session"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PARCHMENT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Ingest uploaded files for a user, creating or updating posts.
    ///
    /// Each outcome is printed to stdout; files that fail are reported on
    /// stderr and the remaining files are still processed.
    Ingest(IngestArgs),
    /// Browse and delete a user's posts interactively.
    Browse(BrowseArgs),
    /// User administration.
    Users(UsersArgs),
    /// Apply pending database migrations.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct IngestArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Name of the user the files belong to.
    #[arg(long, value_name = "NAME")]
    pub user: String,

    /// Filename to use when reading from standard input.
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Override the maximum accepted upload size in bytes.
    #[arg(long = "ingest-max-bytes", value_name = "BYTES")]
    pub max_bytes: Option<u64>,

    /// Files to ingest; `-` reads standard input.
    #[arg(value_name = "FILE", required = true, value_hint = ValueHint::FilePath)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct BrowseArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Name of the user whose posts are listed.
    #[arg(long, value_name = "NAME")]
    pub user: String,

    /// Override the number of posts per page.
    #[arg(long = "browser-page-size", value_name = "COUNT")]
    pub page_size: Option<u64>,

    /// Override the loading spinner interval in milliseconds.
    #[arg(long = "browser-tick-millis", value_name = "MILLIS")]
    pub tick_millis: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum UsersCommand {
    /// Register a new user.
    Add(AddUserArgs),
}

#[derive(Debug, Args, Clone)]
pub struct AddUserArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Unique user name.
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub common: CommonOverrides,
}
