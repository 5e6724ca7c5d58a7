//! Inspector for remote collections: prints schemas and decoded rows.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docorm::store::HttpStore;
use docorm::{HttpStoreConfig, Orm, RemoteStore, SelectOptions};

#[derive(Parser)]
#[command(name = "docorm")]
#[command(about = "Inspect remote collections through docorm", long_about = None)]
struct Args {
    /// API token; overrides DOCORM_API_TOKEN.
    #[arg(long)]
    token: Option<String>,
    /// API root URL; overrides DOCORM_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,
    /// API version header value; overrides DOCORM_API_VERSION.
    #[arg(long)]
    api_version: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the remote schema of a collection.
    Schema {
        #[arg(long)]
        collection: String,
    },
    /// Print decoded rows of a collection as JSON.
    Rows {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
        /// Follow cursors until every row is printed.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

impl Args {
    fn store_config(&self) -> anyhow::Result<HttpStoreConfig> {
        let mut config = match &self.token {
            Some(token) => HttpStoreConfig {
                api_token: token.clone(),
                ..HttpStoreConfig::default().with_env_overrides()
            },
            None => HttpStoreConfig::from_env().context("pass --token or set DOCORM_API_TOKEN")?,
        };
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(version) = &self.api_version {
            config.api_version = version.clone();
        }
        config.require_token()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let store: Arc<dyn RemoteStore> = Arc::new(HttpStore::new(args.store_config()?)?);

    match args.command {
        Command::Schema { collection } => {
            let schema = store
                .retrieve_collection_schema(&collection)
                .await
                .with_context(|| format!("fetch schema of {collection}"))?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Rows {
            collection,
            page_size,
            cursor,
            all,
        } => {
            let orm = Orm::new(store);
            let table = orm.introspect_table(collection.clone(), &collection).await?;
            let mut options = SelectOptions::new();
            options.page_size = page_size;
            options.start_cursor = cursor;
            if all {
                let rows = table.select_all(&options).await?;
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                let page = table.select(&options).await?;
                println!("{}", serde_json::to_string_pretty(&page)?);
            }
        }
    }
    Ok(())
}
