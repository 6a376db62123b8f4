mod add;
mod delete;
mod dialect;
mod error;
mod export;
mod link;
mod migrate;
mod model;
mod references;
mod relation;
mod schema;
mod show;
mod store;
#[cfg(test)]
mod testdb;
mod unlink;
mod validation;

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing_subscriber::EnvFilter;

use error::{InvalidVarError, MissingVarError};
use validation::{NotSaved, ValidationFailed};

#[derive(Parser)]
#[clap(version, author, about)]
struct Opts {
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: MainCommand,
}

#[derive(Subcommand)]
enum MainCommand {
    /// Create or update the robots, parts and robots_parts tables.
    Migrate(migrate::Opts),

    /// List the foreign keys present in the database.
    References,

    /// Add a robot or a part.
    Add(add::Opts),

    /// Attach a part to a robot.
    Link(link::Opts),

    /// Show a robot part association along with its robot and part.
    Show(show::Opts),

    /// Detach a part from a robot.
    Unlink(unlink::Opts),

    /// Delete a robot or a part that nothing references.
    Delete(delete::Opts),

    /// Output every robot part association.
    Export(export::Opts),
}

#[derive(Deserialize, Default, Debug)]
struct Config {
    database: Option<DatabaseConfig>,
    log: Option<LogConfig>,
}

#[derive(Deserialize, Default, Debug)]
struct DatabaseConfig {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Deserialize, Default, Debug)]
struct LogConfig {
    level: Option<String>,
    json: Option<bool>,
}

const DEFAULT_CONFIG_PATH: &str = "robotparts.yaml";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

const VAR_CONFIG_PATH: &str = "ROBOTPARTS_CONFIG";

const VAR_DB_URL: &str = "DATABASE_URL";
const VAR_DB_MAX_CONNECTIONS: &str = "ROBOTPARTS_MAX_CONNECTIONS";

const VAR_LOG_FILTER: &str = "RUST_LOG";
const VAR_LOG_JSON: &str = "ROBOTPARTS_LOG_JSON";

fn main() -> anyhow::Result<()> {
    #[cfg(feature = "dotenv")] {
        dotenv::dotenv().ok();
    }

    let opts = Opts::parse();

    let config = match opts.config.as_deref() {
        Some(config_path) => load_config(config_path)
            .with_context(|| format!("failed to read config file {}", config_path.to_string_lossy()))?
            .with_context(|| format!("failed to parse config file {}", config_path.to_string_lossy()))?,

        None => match env::var_os(VAR_CONFIG_PATH) {
            Some(config_path) => load_config(config_path.as_ref())
                .with_context(|| format!("failed to read config file {}", config_path.to_string_lossy()))?
                .with_context(|| format!("failed to parse config file {}", config_path.to_string_lossy()))?,

            None => if cfg!(feature = "default-config-file") {
                load_config(DEFAULT_CONFIG_PATH.as_ref())
                    .ok()
                    .map(|res| res
                        .with_context(|| format!("failed to parse config file {}", DEFAULT_CONFIG_PATH)))
                    .transpose()?
                    .unwrap_or_default()
            } else {
                Config::default()
            },
        },
    };

    init_logging(config.log.as_ref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?
        .block_on(run(opts, config))
}

async fn run(opts: Opts, config: Config) -> anyhow::Result<()> {
    if let MainCommand::Migrate(migrate::Opts { print: true, .. }) = opts.command {
        migrate::print_schema();
        return Ok(());
    }

    let db_pool = connect_db(config.database.unwrap_or_default()).await?;

    let res = match db_pool.acquire().await {
        Err(err) => Err(anyhow::Error::new(err).context("failed to acquire database connection")),

        Ok(mut db_conn) => match opts.command {
            MainCommand::Migrate(opts) => migrate::run(&mut db_conn, opts).await,
            MainCommand::References => references::run(&mut db_conn).await,
            MainCommand::Add(opts) => add::run(&mut db_conn, opts).await,
            MainCommand::Link(opts) => link::run(&mut db_conn, opts).await,
            MainCommand::Show(opts) => show::run(&mut db_conn, opts).await,
            MainCommand::Unlink(opts) => unlink::run(&mut db_conn, opts).await,
            MainCommand::Delete(opts) => delete::run(&mut db_conn, opts).await,
            MainCommand::Export(opts) => export::run(&mut db_conn, opts).await,
        },
    };

    db_pool.close().await;
    res
}

/// Prints every validation message on its own line, then converts the failure into an error
/// carrying `context`.
fn not_saved(err: NotSaved, context: &'static str) -> anyhow::Error {
    match err {
        NotSaved::Invalid(err) => {
            print_messages(&err);
            anyhow::Error::new(err).context(context)
        },

        NotSaved::DbError(err) => anyhow::Error::new(err).context(context),
    }
}

fn print_messages(err: &ValidationFailed) {
    for message in err.messages() {
        eprintln!("{} ({}): {}", message.field, message.kind, message);
    }
}

fn load_config(path: &Path) -> io::Result<serde_yaml::Result<Config>> {
    fs::read_to_string(path)
        .map(|contents| serde_yaml::from_str(&contents))
}

/// Logs go to stderr so that command output on stdout stays machine-readable. `RUST_LOG` takes
/// precedence over the configured level.
fn init_logging(config: Option<&LogConfig>) -> anyhow::Result<()> {
    let level = config
        .and_then(|config| config.level.as_deref())
        .unwrap_or(DEFAULT_LOG_LEVEL);

    let directive = env_var(VAR_LOG_FILTER)
        .context("failed to read log filter")?
        .filter(|filter| !filter.trim().is_empty())
        .unwrap_or_else(|| format!("robotparts={}", level));

    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter {}", directive))?;

    let json = env_var_parse::<bool>(VAR_LOG_JSON)
        .context("failed to read log format")?
        .or_else(|| config.and_then(|config| config.json))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    // A subscriber may already be installed, in which case keep it
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }

    Ok(())
}

async fn connect_db(config: DatabaseConfig) -> anyhow::Result<PgPool> {
    let db_url = env_var(VAR_DB_URL)
        .context("failed to read database url")?
        .or(config.url)
        .ok_or(MissingVarError("database url"))?;

    let max_connections = env_var_parse::<u32>(VAR_DB_MAX_CONNECTIONS)
        .context("failed to read database max connections")?
        .or(config.max_connections)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS);

    tracing::debug!(max_connections, "connecting to database");

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&db_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", db_url))
}

fn env_var(key: &'static str) -> Result<Option<String>, InvalidVarError> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(bad_str)) => Err(InvalidVarError::invalid_utf8(key, bad_str)),
    }
}

fn env_var_parse<T>(key: &'static str) -> Result<Option<T>, InvalidVarError>
where
    T: FromStr,
{
    env_var(key)
        .and_then(|val| val
            .map(|val| val
                .parse::<T>()
                .map_err(|_| InvalidVarError::parse_error(key, val.into())))
            .transpose())
}
