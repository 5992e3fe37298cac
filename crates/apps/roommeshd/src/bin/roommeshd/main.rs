use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use roommesh_daemon::simulate::run_simulation;
use roommesh_daemon::{resolve, DaemonConfig, StaticProbe};
use roommesh_mesh::codec;

/// Room mesh sync daemon.
#[derive(Parser, Debug)]
#[command(name = "roommeshd", version, about)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a coordinator, viewers and a scanner in-process until they converge
    Simulate {
        #[arg(long, default_value_t = 2)]
        viewers: usize,

        /// Skip the scanner; viewers only sync the stored mesh
        #[arg(long)]
        no_scanner: bool,

        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
    /// Decode a saved mesh file and print a summary
    Inspect { path: PathBuf },
    /// Print the device kind and starting role for the configured capabilities
    Role,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match &cli.config {
        Some(path) => DaemonConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DaemonConfig::default(),
    };

    match cli.command {
        Command::Simulate { viewers, no_scanner, timeout_secs } => {
            let timeout = Duration::from_secs(timeout_secs);
            let report = run_simulation(&config, viewers, !no_scanner, timeout).await?;
            println!(
                "coordinator v{} ({} bytes), viewers installed {:?}, pushes served {}",
                report.coordinator_version,
                report.mesh_bytes,
                report.viewer_versions,
                report.pushes_served
            );
        }
        Command::Inspect { path } => {
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let meshes =
                codec::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
            println!("{}: {} meshes, {} bytes", path.display(), meshes.len(), bytes.len());
            for (n, mesh) in meshes.iter().enumerate() {
                let (vertices, triangles) = (mesh.vertices.len(), mesh.triangles.len());
                println!("  [{n}] {vertices} vertices, {triangles} triangles");
            }
        }
        Command::Role => {
            let (device, role) = resolve(&StaticProbe(config.capabilities.clone()));
            println!("device {device}, starting role {role:?}");
        }
    }
    Ok(())
}
