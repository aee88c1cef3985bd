#![warn(missing_docs)]
//! pxebootfs FUSE daemon

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pxebootfs::cli::Cli;
use pxebootfs::command::CommandRunner;
use pxebootfs::config::PxeBootConfig;
use pxebootfs::export::ExportFs;
use pxebootfs::filesystem::{PxeBootFs, PxeBootFsConfig};
use pxebootfs::fsid::FsidAllocator;
use pxebootfs::node::NodeManager;
use pxebootfs::router::Router;
use pxebootfs::server::{parse_mount_options, serve};
use pxebootfs::template::Template;
use pxebootfs::union::CommandMounter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    tracing::info!("pxebootfs {} starting...", env!("CARGO_PKG_VERSION"));

    let (config_path, config) = match &cli.config {
        Some(path) => (path.clone(), PxeBootConfig::from_file(path)?),
        None => PxeBootConfig::discover(&PxeBootConfig::search_paths())?,
    };
    tracing::info!("Config: {}", config_path.display());

    config.validate()?;
    config.verify_permissions()?;
    let mount_opts = parse_mount_options(&cli.options)?;

    let template = Template::load(&config.pxe_template)
        .with_context(|| format!("loading template {}", config.pxe_template.display()))?;
    tracing::info!(
        "Template {} renders {} bytes per node",
        config.pxe_template.display(),
        template.rendered_len()
    );

    // Only drives mount/exportfs children; FUSE callbacks run outside it.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    let runner = CommandRunner::new(runtime.handle().clone(), config.command_timeout())?;

    let nodes = NodeManager::new(
        config.layout(),
        Arc::new(FsidAllocator::new(config.start_fsid)),
        Arc::new(CommandMounter::new(config.union_fs, runner.clone())),
        Arc::new(ExportFs::new(runner)),
    );
    let router = Arc::new(Router::new(Arc::new(template), Arc::new(nodes)));

    let fs_config = PxeBootFsConfig {
        direct_io: config.direct_io,
        ..Default::default()
    };
    serve(PxeBootFs::new(fs_config, router), &cli.mountpoint, &mount_opts)?;

    runtime.shutdown_background();
    Ok(())
}
