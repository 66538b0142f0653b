use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use config::ResolverdConfig;
use tracing::info;
use vigil_backend_model::repo::RepoId;
use vigil_backend_service::BackendServices;
use vigil_resolver::{Resolver, build_system::DirBuildSystem, repo_cache::DirRepoCache};

mod config;

#[derive(clap::Parser)]
struct Args {
	#[arg(short, long, default_value = "resolver.toml")]
	config: PathBuf,
	/// Log at debug level.
	#[arg(short, long)]
	verbose: bool,
	/// Run a single polling cycle and exit.
	#[arg(long)]
	once: bool,
	/// Queue a repo generation before polling.
	#[arg(long, value_name = "REPO_ID")]
	generate: Option<RepoId>,
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	tracing::subscriber::set_global_default(
		tracing_subscriber::FmtSubscriber::builder()
			.with_max_level(if args.verbose {
				tracing::Level::DEBUG
			} else {
				tracing::Level::INFO
			})
			.finish(),
	)?;

	let config_path = &args.config;
	let config = toml::from_str::<ResolverdConfig>(&fs::read_to_string(config_path)?)?;
	info!("loaded configuration from file: {:?}", config_path);

	info!("initializing backend services ...");
	let backend = BackendServices::new(config.clone().try_into()?).await?;
	let repo_cache = Arc::new(DirRepoCache::new(
		&config.repo_cache,
		&config.dependency.for_arch,
	));
	let build_system = Arc::new(DirBuildSystem::new(&config.build_system));
	let resolver = Resolver::new(backend, config.dependency, repo_cache, build_system);

	if let Some(repo_id) = args.generate {
		resolver.request_generation(repo_id).await?;
		info!(repo_id, "queued repo generation");
	}
	if args.once {
		resolver.run_once().await;
		return Ok(());
	}
	resolver
		.run(Duration::from_secs(config.poll_interval))
		.await;
	Ok(())
}
