use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use provenance_pdp::{DocumentFeed, Ingestor, PdpConfig, PdpError, PolicyDecisionPoint};
use provenance_policy::{Decision, DecisionRequest};
use tokio_util::sync::CancellationToken;

/// Answer provenance-aware authorization requests from the command line
#[derive(Parser, Debug)]
#[command(name = "pdp", version, about, long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = "pdp.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the decision for a request
    Check(RequestArgs),

    /// Like `check`, but exit with an error when the request is denied
    Enforce(RequestArgs),

    /// Load the rule set and provenance documents and report any defects
    Validate,
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// The requesting subject
    #[arg(long)]
    subject: String,

    /// The action to decide
    #[arg(long)]
    action: String,

    /// The target of the action
    #[arg(long)]
    target: String,

    /// Request context entries, as key=value
    #[arg(long = "context", value_parser = parse_context)]
    context: Vec<(String, String)>,
}

impl RequestArgs {
    fn into_request(self) -> Result<DecisionRequest> {
        let request = DecisionRequest::new(
            self.subject.parse()?,
            self.action.parse()?,
            self.target.parse()?,
        );

        Ok(self
            .context
            .into_iter()
            .fold(request, |request, (key, value)| request.with_context(key, value)))
    }
}

fn parse_context(entry: &str) -> Result<(String, String), String> {
    entry
        .split_once('=')
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected key=value, got {entry:?}"))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("provenance_pdp=debug,provenance_policy=debug,provenance_graph=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("provenance_pdp=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build the decision point and load every configured provenance document
/// before answering anything
async fn start(config: &PdpConfig) -> Result<PolicyDecisionPoint> {
    let pdp = PolicyDecisionPoint::from_config(config)?;

    let report = Ingestor::from_config(
        pdp.store().clone(),
        DocumentFeed::new(config.provenance.iter().cloned()),
        config,
    )
    .run(CancellationToken::new())
    .await;

    if report.failed > 0 {
        return Err(anyhow!(
            "{} of {} provenance documents were rejected",
            report.failed,
            config.provenance.len()
        ));
    }

    Ok(pdp)
}

fn print(decision: &Decision) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(decision)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = PdpConfig::load(&cli.config)?;

    match cli.command {
        Commands::Check(args) => {
            let pdp = start(&config).await?;
            print(&pdp.decide(args.into_request()?).await)?;
        }
        Commands::Enforce(args) => {
            let pdp = start(&config).await?;
            match pdp.enforce(args.into_request()?).await {
                Ok(decision) => print(&decision)?,
                Err(PdpError::NotAuthorized(decision)) => {
                    print(&decision)?;
                    return Err(anyhow!("Not authorized: {}", decision.reason));
                }
                Err(error) => return Err(error.into()),
            }
        }
        Commands::Validate => {
            let pdp = start(&config).await?;
            let rules = pdp.rules();
            tracing::info!(
                actions = rules.len(),
                triples = pdp.store().len(),
                "Rule set and provenance are valid"
            );
            for action in rules.actions() {
                let count = rules.rules(action).map_or(0, <[_]>::len);
                println!("{action}: {count} rules");
            }
        }
    }

    Ok(())
}
