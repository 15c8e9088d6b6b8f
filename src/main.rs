mod facet;
mod join;
mod output;
mod query;
mod resubmit;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use join::{JoinConfig, Joiner, QueryTransformer};
use query::{PipelineMessage, QueryRequest, QueryResponse};
use resubmit::{RelaxedResubmitter, ResponseRouter, StrictResubmitter};

#[derive(Parser)]
#[command(name = "qjoin")]
#[command(about = "Federated join-query rewriting for search pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a query request into its federated join form
    Transform {
        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Query request file (JSON)
        request: PathBuf,

        /// Print the transformed request as JSON
        #[arg(short, long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Decide whether a zero-hit response should be resubmitted
    Route {
        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Query response file (JSON)
        response: PathBuf,

        /// Print the routing decision and request as JSON
        #[arg(short, long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

/// On-disk pipeline configuration: the join stage plus optional resubmit
/// workflow targets
#[derive(Debug, Deserialize)]
struct PipelineConfig {
    join: JoinConfig,
    #[serde(default)]
    resubmit: ResubmitConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResubmitConfig {
    relaxed_workflow: Option<String>,
    strict_workflow: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transform {
            config,
            request,
            json,
            no_color,
        } => {
            transform(&config, &request, json, !no_color)?;
        }
        Commands::Route {
            config,
            response,
            json,
            no_color,
        } => {
            route(&config, &response, json, !no_color)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn transform(config_path: &Path, request_path: &Path, json: bool, color: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let content = fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read request file {}", request_path.display()))?;
    let mut request: QueryRequest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse request file {}", request_path.display()))?;

    let joiner = Joiner::new(config.join)?;
    let feedback = joiner.process_query(&mut request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&request)?);
    } else {
        output::print_feedback(&feedback, color)?;
        output::print_query(&request.query, color)?;
    }

    Ok(())
}

fn route(config_path: &Path, response_path: &Path, json: bool, color: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let content = fs::read_to_string(response_path)
        .with_context(|| format!("Failed to read response file {}", response_path.display()))?;
    let response: QueryResponse = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse response file {}", response_path.display()))?;

    // Strict routing runs first; relaxed handles whatever it declines.
    let mut routers: Vec<Box<dyn ResponseRouter>> = Vec::new();
    if let Some(workflow) = &config.resubmit.strict_workflow {
        let prefix = config.join.property_prefix.as_deref();
        routers.push(Box::new(StrictResubmitter::with_property_prefix(
            workflow, prefix,
        )));
    }
    if let Some(workflow) = &config.resubmit.relaxed_workflow {
        routers.push(Box::new(RelaxedResubmitter::new(workflow)));
    }

    let mut message = PipelineMessage::Response(response);
    let mut decision = None;
    for router in &routers {
        if let Some(key) = router.routing_key(&mut message) {
            decision = Some(key);
            break;
        }
    }

    let request = match message {
        PipelineMessage::Response(response) => response.request,
        PipelineMessage::Request(request) => request,
    };

    if json {
        let out = serde_json::json!({
            "workflow": decision,
            "request": request,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        output::print_routing(decision.as_deref(), color)?;
        output::print_query(&request.query, color)?;
    }

    Ok(())
}
