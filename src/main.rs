//! CROU Tenancy - tenant hierarchy administration tool
//!
//! Opens the tenant directory described by the configuration and runs one
//! command against it, printing the result as JSON.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crou_tenancy::{
    config::{self, HierarchySeed, LogFormat},
    db,
    models::TenantType,
    services::seed_hierarchy,
    utils::error::{AppError, AppResult, ErrorResponse},
    AppConfig, AppState, TenantDirectory,
};

/// A parsed command line
#[derive(Debug, PartialEq)]
enum Command {
    Seed(PathBuf),
    List { level: Option<i64>, tenant_type: Option<TenantType> },
    Show(String),
    Descendants(String),
    Ancestors(String),
    Scope(String),
    CanAccess(String, String),
    Tree(String),
    Move { code: String, parent: Option<String> },
    SetActive { code: String, active: bool },
    Verify,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") || args.is_empty() {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("CROU Tenancy {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<()> {
    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = init_logging(&config);

    ensure_data_directory(&config)?;

    if args.iter().any(|arg| arg == "--migrate") {
        return migrate_database(&config).await;
    }

    let command = parse_command(args)?;

    let state = AppState::initialize(config)
        .await
        .context("Failed to initialize database")?;

    if let Some(ref seed_file) = state.config.hierarchy.seed_file {
        if command != Command::Seed(seed_file.clone()) {
            seed_if_empty(&state.directory, seed_file).await?;
        }
    }

    let outcome = execute(&state.directory, command).await;
    state.shutdown().await;

    match outcome {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            error!(error = %err, kind = err.kind(), "Command failed");
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&ErrorResponse::from(&err))?
            );
            anyhow::bail!("command failed: {}", err.kind())
        }
    }
}

fn parse_command(args: &[String]) -> Result<Command> {
    let positional: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| *a != "--migrate")
        .collect();

    let arg = |index: usize, what: &str| -> Result<String> {
        positional
            .get(index)
            .map(|s| s.to_string())
            .with_context(|| format!("Missing argument: {}", what))
    };

    let command = match positional.first().copied() {
        Some("seed") => Command::Seed(PathBuf::from(arg(1, "seed file")?)),
        Some("list") => {
            let mut level = None;
            let mut tenant_type = None;
            let mut rest = positional[1..].iter();
            while let Some(flag) = rest.next() {
                match *flag {
                    "--level" => {
                        let value = rest.next().context("--level requires a value")?;
                        level = Some(value.parse().context("--level must be an integer")?);
                    }
                    "--type" => {
                        let value = rest.next().context("--type requires a value")?;
                        tenant_type = Some(value.parse::<TenantType>().map_err(anyhow::Error::msg)?);
                    }
                    other => anyhow::bail!("Unknown list option: {}", other),
                }
            }
            Command::List { level, tenant_type }
        }
        Some("show") => Command::Show(arg(1, "tenant code")?),
        Some("descendants") => Command::Descendants(arg(1, "tenant code")?),
        Some("ancestors") => Command::Ancestors(arg(1, "tenant code")?),
        Some("scope") => Command::Scope(arg(1, "tenant code")?),
        Some("can-access") => Command::CanAccess(arg(1, "source code")?, arg(2, "target code")?),
        Some("tree") => Command::Tree(arg(1, "root code")?),
        Some("move") => {
            let code = arg(1, "tenant code")?;
            let target = arg(2, "new parent code or --root")?;
            let parent = if target == "--root" { None } else { Some(target) };
            Command::Move { code, parent }
        }
        Some("activate") => Command::SetActive {
            code: arg(1, "tenant code")?,
            active: true,
        },
        Some("deactivate") => Command::SetActive {
            code: arg(1, "tenant code")?,
            active: false,
        },
        Some("verify") => Command::Verify,
        Some(other) => anyhow::bail!("Unknown command: {} (see --help)", other),
        None => anyhow::bail!("No command given (see --help)"),
    };

    Ok(command)
}

fn to_json<T: Serialize>(value: T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

async fn execute(directory: &TenantDirectory, command: Command) -> AppResult<serde_json::Value> {
    match command {
        Command::Seed(path) => {
            let seed = HierarchySeed::load(&path).map_err(|e| AppError::Config(format!("{:#}", e)))?;
            to_json(seed_hierarchy(directory, &seed).await?)
        }
        Command::List { level, tenant_type } => {
            let tenants = match (level, tenant_type) {
                (Some(level), None) => directory.get_tenants_by_level(level).await?,
                (None, Some(tenant_type)) => directory.get_tenants_by_type(tenant_type).await?,
                (Some(level), Some(tenant_type)) => directory
                    .get_tenants_by_type(tenant_type)
                    .await?
                    .into_iter()
                    .filter(|t| t.level == level)
                    .collect(),
                (None, None) => directory.list_tenants().await?,
            };
            to_json(tenants)
        }
        Command::Show(code) => to_json(directory.get_tenant_by_code(&code).await?),
        Command::Descendants(code) => {
            let tenant = directory.get_tenant_by_code(&code).await?;
            to_json(directory.get_descendants(tenant.id).await?)
        }
        Command::Ancestors(code) => {
            let tenant = directory.get_tenant_by_code(&code).await?;
            to_json(directory.get_ancestors(tenant.id).await?)
        }
        Command::Scope(code) => {
            let tenant = directory.get_tenant_by_code(&code).await?;
            to_json(directory.get_access_scope(tenant.id).await?)
        }
        Command::CanAccess(source, target) => {
            // An unknown tenant on either side is denied without asking the directory
            let source_id = resolve_code(directory, &source).await?;
            let target_id = resolve_code(directory, &target).await?;
            let allowed = match (source_id, target_id) {
                (Some(source_id), Some(target_id)) => {
                    directory.can_access_tenant(source_id, target_id).await
                }
                _ => false,
            };
            to_json(serde_json::json!({
                "source": source,
                "target": target,
                "allowed": allowed,
            }))
        }
        Command::Tree(code) => {
            let tenant = directory.get_tenant_by_code(&code).await?;
            to_json(directory.get_hierarchy_tree(tenant.id).await?)
        }
        Command::Move { code, parent } => {
            let tenant = directory.get_tenant_by_code(&code).await?;
            let parent_id = match parent {
                Some(ref parent_code) => Some(directory.get_tenant_by_code(parent_code).await?.id),
                None => None,
            };
            directory.update_tenant_path(tenant.id, parent_id).await?;
            to_json(directory.get_tenant(tenant.id).await?)
        }
        Command::SetActive { code, active } => {
            let tenant = directory.get_tenant_by_code(&code).await?;
            to_json(directory.set_tenant_active(tenant.id, active).await?)
        }
        Command::Verify => to_json(directory.verify_integrity().await?),
    }
}

async fn resolve_code(directory: &TenantDirectory, code: &str) -> AppResult<Option<Uuid>> {
    match directory.get_tenant_by_code(code).await {
        Ok(tenant) => Ok(Some(tenant.id)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Populate an empty directory from the configured seed file
async fn seed_if_empty(directory: &TenantDirectory, seed_file: &Path) -> Result<()> {
    if directory.count_tenants().await? > 0 {
        return Ok(());
    }
    if !seed_file.exists() {
        return Ok(());
    }

    info!("Seeding empty tenant directory from {:?}", seed_file);
    let seed = HierarchySeed::load(seed_file)?;
    let report = seed_hierarchy(directory, &seed).await?;
    info!(created = report.created, "Tenant directory seeded");
    Ok(())
}

/// Run all migrations and report the schema status
async fn migrate_database(config: &AppConfig) -> Result<()> {
    println!("Running database migrations on {}", config.database.url);

    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to run migrations")?;

    let missing = db::migrations::missing_tables(&pool).await?;
    pool.close().await;

    if missing.is_empty() {
        println!("Database schema is up to date");
        Ok(())
    } else {
        anyhow::bail!("Tables still missing after migration: {}", missing.join(", "))
    }
}

fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use crou_tenancy::config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;

    match &log_config.target {
        LogTarget::Console => {
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber, &log_config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber.with(file_layer(&log_config.format, writer)), &log_config.format);
            Some(guard)
        }
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// File output layer in the configured format
fn file_layer<S>(
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
{
    use tracing_subscriber::{fmt, Layer};

    match format {
        LogFormat::Json => fmt::layer().json().with_target(true).with_writer(writer).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Initialize console logging on stderr, keeping stdout for command output
fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

/// Initialize file-only logging
fn init_file_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync + 'static,
{
    use tracing_subscriber::prelude::*;

    subscriber.with(file_layer(format, writer)).init();
}

/// Ensure the data directory exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if db::is_memory_url(&config.database.url) {
        return Ok(());
    }
    // Extract directory from database URL
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"CROU Tenancy {}

USAGE:
    crou-tenancy [OPTIONS] <COMMAND>

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --migrate               Run all database migrations and verify that the
                            tenant schema exists

COMMANDS (tenants are referenced by code):
    seed <file>                     Create the tenants of a YAML hierarchy file
    list [--level N] [--type T]     List tenants (T: ministry, crou, service)
    show <code>                     Show one tenant
    descendants <code>              List every tenant below <code>
    ancestors <code>                List the tenants above <code>, root first
    scope <code>                    Show the access scope of <code>
    can-access <source> <target>    Check whether <source> may access <target>
    tree <code>                     Print the subtree rooted at <code>
    move <code> <parent|--root>     Re-parent <code> and its subtree
    activate <code>                 Mark a tenant active
    deactivate <code>               Mark a tenant inactive
    verify                          Report path/level invariant violations

ENVIRONMENT:
    CROU_CONFIG         Path to configuration file (default: config.yaml)
    DATABASE_URL        Database URL override
    CROU_SEED_FILE      Hierarchy seed applied when the directory is empty

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by CROU_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/crou-tenancy/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
