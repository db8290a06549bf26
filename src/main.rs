use std::{process, sync::Arc};

use parchment::{
    application::{
        browser::{BrowserModel, BrowserRuntime},
        error::AppError,
        ingest::IngestService,
        repos::{PostsRepo, UsersRepo},
    },
    config,
    domain::error::DomainError,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        telemetry,
        terminal::{self, RawModeGuard},
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, info_span, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Ingest(args) => run_ingest(settings, args).await,
        config::Command::Browse(args) => run_browse(settings, args).await,
        config::Command::Users(args) => match args.command {
            config::UsersCommand::Add(add) => run_add_user(settings, add).await,
        },
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_ingest(settings: config::Settings, args: config::IngestArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let user = repositories
        .find_user_by_name(&args.user)
        .await?
        .ok_or_else(|| DomainError::not_found("user", &args.user))?;

    let posts: Arc<dyn PostsRepo> = repositories;
    let span = info_span!("ingest", user = %user.name);
    let service = IngestService::new(posts, &settings.ingest).with_span(span);

    let results = service
        .write_paths(&user, &args.files, args.name.as_deref())
        .await;

    let mut failures = 0usize;
    for (path, result) in &results {
        match result {
            Ok(outcome) => {
                let post = outcome.post();
                let verb = if outcome.is_created() {
                    "created"
                } else {
                    "updated"
                };
                println!("{verb} {} ({})", post.filename, post.title);
            }
            Err(err) => {
                failures += 1;
                // The per-file message is what a remote session would see.
                eprintln!("{}: {err}", path.display());
            }
        }
    }

    if failures > 0 {
        return Err(AppError::validation(format!(
            "{failures} of {} file(s) were not ingested",
            results.len()
        )));
    }
    Ok(())
}

async fn run_browse(settings: config::Settings, args: config::BrowseArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let user = repositories.find_user_by_name(&args.user).await?;
    if user.is_none() {
        warn!(user = %args.user, "browse requested for unknown user");
    }

    let posts: Arc<dyn PostsRepo> = repositories;
    let span = info_span!("browse", user = %args.user);
    let runtime = BrowserRuntime::new(posts, &settings.browser).with_span(span);
    let model = BrowserModel::new(user, settings.browser.page_size).standalone();

    let _raw_mode = RawModeGuard::enable().map_err(InfraError::from)?;
    let input = terminal::spawn_input_reader(std::io::stdin()).map_err(InfraError::from)?;
    runtime
        .run(model, input, tokio::io::stdout())
        .await
        .map_err(InfraError::from)?;
    Ok(())
}

async fn run_add_user(settings: config::Settings, args: config::AddUserArgs) -> Result<(), AppError> {
    let name = args.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("user name must not be empty"));
    }

    let repositories = init_repositories(&settings).await?;
    let user = repositories.create_user(name).await?;
    info!(user = %user.name, id = %user.id, "user created");
    println!("{}", user.id);
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = database_url(&settings)?;
    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;
    info!("migrations applied");
    Ok(())
}

fn database_url(settings: &config::Settings) -> Result<&str, AppError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = database_url(settings)?;
    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}
