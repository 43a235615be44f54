//! rnnvis-client - Command line entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rnnvis_client::{
    ClientConfig, ClusterMode, CoClusterParams, Dashboard, Layer, StatisticsRequest, metrics,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rnnvis-client")]
#[command(about = "Query an RNN visualization backend through the client cache", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override backend URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    log_format: String,

    /// Print a Prometheus snapshot of cache metrics on exit
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the models known to the backend
    Models,

    /// Show a model's configuration
    Config { model: String },

    /// List the hidden states available for a model
    States { model: String },

    /// Co-cluster hidden units and words for a model state
    CoCluster {
        model: String,
        state: String,

        /// Number of clusters (defaults to the configured value)
        #[arg(short, long)]
        n_cluster: Option<usize>,

        #[arg(long)]
        top_k: Option<u32>,

        /// positive, negative, abs or raw
        #[arg(long)]
        mode: Option<ClusterMode>,
    },

    /// Show statistics for one layer of a model state
    Stats {
        model: String,
        state: String,

        /// Layer index; negative selects the last layer
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        layer: i64,

        #[arg(long)]
        top_k: Option<u32>,
    },

    /// Record an evaluation of a sentence against a model
    Eval { model: String, sentence: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    match cli.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    // Load configuration
    let mut config = ClientConfig::load(cli.config)?;

    // CLI overrides
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }

    config.validate()?;

    tracing::debug!(
        backend_url = %config.backend_url,
        request_timeout_secs = config.request_timeout_secs,
        "Configuration loaded"
    );

    let prometheus_handle = if cli.print_metrics {
        Some(metrics::setup_metrics()?)
    } else {
        None
    };

    let dashboard = Dashboard::connect(&config)?;
    let result = run(&dashboard, &config, cli.command).await;
    dashboard.shutdown().await;

    if let Some(handle) = prometheus_handle {
        eprintln!("{}", handle.render());
    }

    result
}

async fn run(dashboard: &Dashboard, config: &ClientConfig, command: Command) -> Result<()> {
    let loader = dashboard.loader();
    let store = dashboard.store();

    match command {
        Command::Models => {
            let models = loader.ensure_models_loaded().await?;
            print_json(models.value.names())
        }
        Command::Config { model } => {
            let loaded = loader.ensure_model_config_loaded(&model).await?;
            print_json(&*loaded.value)
        }
        Command::States { model } => {
            loader.ensure_model_config_loaded(&model).await?;
            let states = store
                .available_states(&model)
                .with_context(|| format!("No config cached for model '{}'", model))?;
            print_json(states)
        }
        Command::CoCluster {
            model,
            state,
            n_cluster,
            top_k,
            mode,
        } => {
            let mut request = config.co_cluster_request(model, state);
            if let Some(n_cluster) = n_cluster {
                request = request.with_clusters(n_cluster);
            }
            let defaults = request.params;
            request = request.with_params(CoClusterParams {
                top_k: top_k.unwrap_or(defaults.top_k),
                mode: mode.unwrap_or(defaults.mode),
            });

            let loaded = loader.ensure_co_cluster_loaded(&request).await?;
            print_json(&*loaded.value)
        }
        Command::Stats {
            model,
            state,
            layer,
            top_k,
        } => {
            let request = StatisticsRequest::new(model, state)
                .with_layer(Layer::from_signed(layer))
                .with_top_k(top_k.unwrap_or(config.default_top_k));

            let loaded = loader.ensure_statistics_loaded(&request).await?;
            print_json(&*loaded.value)
        }
        Command::Eval { model, sentence } => {
            let record = store.eval_sentence(&sentence, &model);
            print_json(&*record)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", rendered);
    Ok(())
}
