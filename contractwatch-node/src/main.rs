use std::env;
use std::str::FromStr;

use contractwatch::{Chain, ChainId, Config, EtherscanAbiSource, PostgresRepo};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let chain_id: u64 = optional_var("CHAIN_ID")?.unwrap_or(1);
    let chain_id = ChainId::try_from(chain_id).map_err(|error| error.to_string())?;
    let chain = Chain::new(chain_id, &required_var("JSON_RPC_URL")?);

    let repo = PostgresRepo::new(&required_var("DATABASE_URL")?).await?;
    let mut config = Config::new(repo, chain.clone());

    if let Some(chunk_size) = optional_var("CHUNK_SIZE")? {
        config = config.with_chunk_size(chunk_size);
    }
    if let Some(ingestion_rate_ms) = optional_var("INGESTION_RATE_MS")? {
        config = config.with_ingestion_rate_ms(ingestion_rate_ms);
    }
    if let Some(max_concurrent_chunks) = optional_var("MAX_CONCURRENT_CHUNKS")? {
        config = config.with_max_concurrent_chunks(max_concurrent_chunks);
    }

    match abi_source(&chain) {
        Ok(abi_source) => config = config.with_abi_source(abi_source),
        Err(error) => warn!(%error, "registrations must supply ABI and creation info"),
    }

    let node_task = contractwatch::index_contracts(&config).await?;
    info!(?config, "contractwatch node started");

    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    node_task.stop();

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn abi_source(chain: &Chain) -> Result<EtherscanAbiSource, contractwatch::AbiSourceError> {
    let abi_source = match env::var("ETHERSCAN_API_URL") {
        Ok(api_url) => EtherscanAbiSource::new(&api_url)?,
        Err(_) => EtherscanAbiSource::for_chain(chain)?,
    };

    Ok(match env::var("ETHERSCAN_API_KEY") {
        Ok(api_key) => abi_source.with_api_key(&api_key),
        Err(_) => abi_source,
    })
}

fn required_var(name: &str) -> Result<String, BoxError> {
    env::var(name).map_err(|_| format!("{name} must be set").into())
}

fn optional_var<T: FromStr>(name: &str) -> Result<Option<T>, BoxError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|error| format!("invalid {name}: {error}").into()),
        Err(_) => Ok(None),
    }
}
