//! Main entry point for the Wardrobe coordinator service.
//!
//! This binary runs the order lifecycle coordinator: the background engine
//! (SLA sweeps, storage cleanup) and, when enabled, the HTTP API that
//! exposes order intake, status transitions, delivery updates and the
//! admin override channel.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use wardrobe_config::Config;
use wardrobe_core::{EngineBuilder, EngineFactories, LifecycleEngine};

mod apis;
mod server;

/// Command-line arguments for the coordinator service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the coordinator service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the lifecycle engine
/// 5. Runs the engine (and the API server when enabled) until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started coordinator");

	let config_path = args
		.config
		.to_str()
		.ok_or("config path is not valid UTF-8")?;
	let config = Config::from_file_async(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.marketplace.id);

	let engine = Arc::new(build_engine(config.clone())?);

	let api_enabled = config.api.as_ref().is_some_and(|api| api.enabled);

	if api_enabled {
		let api_config = config
			.api
			.clone()
			.ok_or("api section vanished after the enabled check")?;
		let api_engine = Arc::clone(&engine);

		let engine_task = engine.run();
		let api_task = server::start_server(api_config, api_engine);

		tokio::select! {
			result = engine_task => {
				tracing::info!("Engine finished");
				result?;
			}
			result = api_task => {
				tracing::info!("API server finished");
				result?;
			}
		}
	} else {
		tracing::info!("Starting engine only");
		engine.run().await?;
	}

	tracing::info!("Stopped coordinator");
	Ok(())
}

/// Builds the lifecycle engine with all registered storage backends.
fn build_engine(config: Config) -> Result<LifecycleEngine, Box<dyn std::error::Error>> {
	let storage_factories = wardrobe_storage::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect();

	let engine = EngineBuilder::new(config).build(EngineFactories { storage_factories })?;
	Ok(engine)
}
