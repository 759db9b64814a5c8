use anyhow::{Context, Result};
use asset_counter::cloud::aws::AwsClient;
use asset_counter::cloud::CloudApi;
use asset_counter::config::Config;
use asset_counter::display::{Progress, ProgressTarget, ReportDisplayManager};
use asset_counter::logging;
use asset_counter::session::SessionBroker;
use asset_counter::{AssetScanner, ScanMode, ServerlessPolicy};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info_span, Instrument};

#[derive(Parser)]
#[command(name = "asset-counter")]
#[command(version)]
#[command(about = "CSPM billable asset counter for AWS")]
#[command(
    long_about = "CSPM billable asset counter for AWS.\n\n\
    Scans a single account or a whole AWS Organization and counts the assets billed by \
    CloudGuard CSPM. Uses the AWS CLI credentials of the caller. Organization scans \
    require cross-account permissions in every member account."
)]
struct Cli {
    /// Scan all accounts in an organization. Requires cross-account permissions.
    #[arg(long)]
    org_mode: bool,

    /// Role to assume in member accounts (default OrganizationAccountAccessRole). Implies --org-mode.
    #[arg(long, value_name = "ROLE")]
    org_role_name: Option<String>,

    /// How serverless functions are counted
    #[arg(long, value_enum, value_name = "MODE")]
    serverless_mode: Option<ServerlessPolicy>,

    /// Print the result as JSON (progress goes to stderr)
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => return handle_error(e, cli.json),
    };
    if let Some(policy) = cli.serverless_mode {
        config.billing.serverless_policy = policy;
    }

    let _log_guard = logging::init_logging(&config.logging, &config.paths.log_directory);
    let span = info_span!("run", run_id = %logging::new_run_id());

    match run(&cli, &config).instrument(span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => handle_error(e, cli.json),
    }
}

async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let progress = Progress::new(if cli.json {
        ProgressTarget::Stderr
    } else {
        ProgressTarget::Stdout
    });

    let mode = ScanMode::from_flags(
        cli.org_mode,
        cli.org_role_name.clone(),
        &config.aws.default_role_name,
    );

    match (&mode, cli.org_mode) {
        (ScanMode::SingleAccount, _) => progress.info("Running in single account mode..."),
        (ScanMode::Organization { role_name }, false) => progress.info(format!(
            "Assuming org mode (role name provided without --org-mode) with custom role name {role_name}..."
        )),
        (ScanMode::Organization { role_name }, true) if cli.org_role_name.is_some() => {
            progress.info(format!("Running in org mode with custom role name {role_name}..."))
        }
        (ScanMode::Organization { .. }, true) => {
            progress.info("Running in org mode, default assume role")
        }
    }
    progress.info(format!(
        "Counting serverless functions in {} mode",
        config.billing.serverless_policy
    ));

    let ambient: Arc<dyn CloudApi> = Arc::new(
        AwsClient::from_ambient(&config.aws)
            .await
            .context("Failed to set up AWS access")?,
    );
    let scanner = AssetScanner::from_config(config, progress);

    let result = match mode {
        ScanMode::SingleAccount => scanner.run_single_account(ambient.as_ref()).await?,
        ScanMode::Organization { role_name } => {
            let broker = SessionBroker::new(Arc::clone(&ambient), &config.aws, role_name);
            scanner.run_organization(ambient, &broker).await?
        }
    };

    ReportDisplayManager::new().display(&result, cli.json);
    Ok(())
}

fn handle_error(e: anyhow::Error, json: bool) -> ExitCode {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
    } else {
        eprintln!("Error: {e:#}");
    }
    ExitCode::FAILURE
}
