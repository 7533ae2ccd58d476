//! Oracle Resource Engine
//!
//! Command line front end of the synthesis engine: renders the manifests of
//! an Instance, prints the CRDs, or asks a config agent for its status.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use kube::CustomResourceExt;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use oracle_resource_engine::{
    load_manifest, Backup, Config, ConfigAgentClient, Exposure, ImageSet, Instance, RestoreSpec,
    StatusChecker, Synthesizer,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Oracle Resource Engine - Kubernetes manifests for Oracle database instances
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every manifest of an instance as a YAML stream
    Render {
        /// Instance manifest
        #[arg(long)]
        instance: PathBuf,

        /// Global Config manifest
        #[arg(long, env = "ENGINE_CONFIG")]
        config: Option<PathBuf>,

        /// Image set by role (YAML)
        #[arg(long, env = "ENGINE_IMAGES")]
        images: Option<PathBuf>,

        /// How the database endpoint is exposed
        #[arg(long, value_enum, default_value = "lb")]
        exposure: ExposureArg,

        /// Restore every disk from the snapshots of this backup
        #[arg(long)]
        restore_backup_id: Option<String>,

        /// Allow containers to escalate privileges
        #[arg(long)]
        allow_privilege_escalation: bool,
    },

    /// Print the CustomResourceDefinitions of the engine's inputs
    Crds,

    /// Ask an instance's config agent for the database status
    CheckStatus {
        /// Instance name
        #[arg(long)]
        instance: String,

        /// Container database name
        #[arg(long, default_value = "GCLOUD")]
        cdb: String,

        /// Config agent address (host or IP)
        #[arg(long)]
        address: String,

        /// Database domain
        #[arg(long, default_value = "")]
        domain: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExposureArg {
    Node,
    Lb,
}

impl From<ExposureArg> for Exposure {
    fn from(arg: ExposureArg) -> Self {
        match arg {
            ExposureArg::Node => Exposure::Node,
            ExposureArg::Lb => Exposure::LoadBalancer,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;
    info!("Oracle Resource Engine v{}", oracle_resource_engine::VERSION);

    match args.command {
        Command::Render {
            instance,
            config,
            images,
            exposure,
            restore_backup_id,
            allow_privilege_escalation,
        } => {
            let instance: Instance = load_manifest(&instance)
                .with_context(|| format!("loading instance {}", instance.display()))?;
            let config: Option<Config> = config.as_deref().map(load_manifest).transpose()?;
            let images: ImageSet = images
                .as_deref()
                .map(load_manifest)
                .transpose()?
                .unwrap_or_default();

            let synthesizer = Synthesizer::new(images)
                .with_exposure(exposure.into())
                .with_restore(restore_backup_id.map(|backup_id| RestoreSpec {
                    backup_id,
                    ..Default::default()
                }))
                .with_privilege_escalation(allow_privilege_escalation);

            let resources = synthesizer.synthesize(&instance, config.as_ref())?;
            print!("{}", resources.to_yaml_stream()?);
        }

        Command::Crds => {
            for crd in [Instance::crd(), Config::crd(), Backup::crd()] {
                println!("---");
                print!("{}", serde_yaml::to_string(&crd)?);
            }
        }

        Command::CheckStatus {
            instance,
            cdb,
            address,
            domain,
        } => {
            let status = ConfigAgentClient::new()
                .check_instance_status(&instance, &cdb, &address, &domain)
                .await?;
            println!("{}", status);
        }
    }

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    // Manifests go to stdout, logs to stderr
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}
