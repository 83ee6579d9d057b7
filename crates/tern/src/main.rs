//! Tern: command-line client for the entity store
//!
//! Subcommands:
//! - `list`: fetch a paginated list, following `next` links
//! - `get`: fetch one entity by id
//! - `batch`: fetch many entities in one request
//!
//! Entities are printed to stdout as JSON; logs go to stderr.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::Result;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tern_entities::{
    BatchQuery, EntitiesPath, EntityError, EntityQuery, EntityStore, HttpTransport, ListQuery,
    Request, StaleTime, StoreConfig,
};

#[derive(Parser)]
#[command(name = "tern")]
#[command(about = "Query a REST API through the entity cache", long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: Connection,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Connection {
    /// API base URL
    #[arg(long, global = true, env = "TERN_BASE_URL", default_value = "http://localhost:3000")]
    base_url: String,

    /// Bearer token sent with every request
    #[arg(long, global = true, env = "TERN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Milliseconds before a fetched list is considered stale
    #[arg(long, global = true, env = "TERN_STALE_TIME_MS", default_value = "60000")]
    stale_time_ms: u64,

    /// Response header carrying the total result count
    #[arg(long, global = true, default_value = "x-total-count")]
    total_count_header: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a list and print its entities
    List {
        /// Entity type, e.g. Accounts
        entity_type: String,

        /// Endpoint path, e.g. /api/v1/accounts/1/followers
        endpoint: String,

        /// List key segment (repeatable)
        #[arg(long = "key")]
        keys: Vec<String>,

        /// Maximum number of pages to fetch (at least 1)
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,
    },

    /// Fetch a single entity
    Get {
        entity_type: String,
        endpoint: String,

        #[arg(long)]
        id: String,
    },

    /// Fetch several entities with repeated `id[]` parameters
    Batch {
        entity_type: String,
        endpoint: String,

        #[arg(long = "id", required = true)]
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tern=info,tern_entities=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let store = build_store(&cli.connection)?;

    let entities = match cli.command {
        Commands::List {
            entity_type,
            endpoint,
            keys,
            pages,
        } => {
            let path = keys
                .into_iter()
                .fold(EntitiesPath::new(entity_type), EntitiesPath::with_key);
            run_list(&store, path, endpoint, pages).await?
        }
        Commands::Get {
            entity_type,
            endpoint,
            id,
        } => {
            let query = EntityQuery::<Value>::new(&store, entity_type, id, Request::get(endpoint));
            query.ensure_fresh().await;
            check(query.error())?;
            query.entity().map(|e| (*e).clone()).into_iter().collect()
        }
        Commands::Batch {
            entity_type,
            endpoint,
            ids,
        } => {
            let query = BatchQuery::<Value>::new(&store, entity_type, ids, move |missing| {
                missing
                    .iter()
                    .fold(Request::get(endpoint.as_str()), |req, id| req.query("id[]", id.as_str()))
            });
            query.ensure_fresh().await;
            check(query.error())?;
            let map = query.entity_map();
            query
                .ids()
                .iter()
                .filter_map(|id| map.get(id).map(|e| (**e).clone()))
                .collect()
        }
    };

    let output = serde_json::to_string_pretty(&entities)
        .map_err(|e| miette::miette!("failed to encode output: {}", e))?;
    println!("{output}");
    Ok(())
}

fn build_store(connection: &Connection) -> Result<EntityStore> {
    let mut transport = HttpTransport::new(&connection.base_url)
        .map_err(|e| miette::miette!("failed to create HTTP client: {}", e))?;
    if let Some(token) = &connection.token {
        transport = transport.with_header("Authorization", format!("Bearer {token}"));
    }

    let config = StoreConfig::builder()
        .stale_time(StaleTime::Millis(connection.stale_time_ms))
        .total_count_header(connection.total_count_header.as_str())
        .build();

    EntityStore::with_config(Arc::new(transport), config).map_err(|e| miette::miette!("{}", e))
}

async fn run_list(
    store: &EntityStore,
    path: EntitiesPath,
    endpoint: String,
    pages: u32,
) -> Result<Vec<Value>> {
    let query = ListQuery::<Value>::new(store, path, Request::get(endpoint));

    query.ensure_fresh().await;
    check(query.error())?;

    let mut fetched = 1;
    while fetched < pages && query.has_next_page() {
        query.fetch_next_page().await;
        check(query.error())?;
        fetched += 1;
    }

    info!(
        path = %query.path(),
        pages = fetched,
        count = query.count(),
        total = ?query.total_count(),
        "list fetched"
    );
    Ok(query.entities().iter().map(|e| (**e).clone()).collect())
}

fn check(error: Option<Arc<EntityError>>) -> Result<()> {
    match error {
        Some(e) => Err(miette::miette!("{}", e)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_pages_must_be_positive() {
        let zero =
            Cli::try_parse_from(["tern", "list", "Accounts", "/api/v1/accounts", "--pages", "0"]);
        assert!(zero.is_err());

        let cli =
            Cli::try_parse_from(["tern", "list", "Accounts", "/api/v1/accounts", "--pages", "3"])
                .unwrap();
        match cli.command {
            Commands::List { pages, .. } => assert_eq!(pages, 3),
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn test_pages_default_to_one() {
        let cli = Cli::try_parse_from(["tern", "list", "Accounts", "/api/v1/accounts"]).unwrap();
        match cli.command {
            Commands::List { pages, .. } => assert_eq!(pages, 1),
            _ => panic!("expected list command"),
        }
    }
}
