#![allow(clippy::result_large_err)]

use anyhow::Context;
use beacon::app::BeaconApp;
use beacon::config::BeaconConfig;
use beacon::telemetry;

enum CliCommand {
    Run { config_path: Option<String> },
    Check { config_path: Option<String>, domain: String },
    Sweep { config_path: Option<String> },
    Help,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise telemetry")?;

    match parse_cli_args(std::env::args().skip(1))? {
        CliCommand::Run { config_path } => {
            let app = build_app(config_path.as_deref()).await?;
            app.run().await.context("application runtime error")
        }
        CliCommand::Check {
            config_path,
            domain,
        } => {
            let app = build_app(config_path.as_deref()).await?;
            let evaluation = app
                .state()
                .evaluator
                .evaluate(&domain)
                .await
                .with_context(|| format!("cannot check `{domain}`"))?;

            println!("{}", serde_json::to_string_pretty(&evaluation.result)?);

            // Resurrection must complete before the runtime is dropped.
            if let Some(background) = evaluation.background {
                background.await.context("resurrection task failed")?;
            }
            Ok(())
        }
        CliCommand::Sweep { config_path } => {
            let app = build_app(config_path.as_deref()).await?;
            let report = app
                .state()
                .sweeper
                .sweep()
                .await
                .context("retention sweep failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        CliCommand::Help => {
            print_help();
            Ok(())
        }
    }
}

async fn build_app(config_path: Option<&str>) -> anyhow::Result<BeaconApp> {
    let config = BeaconConfig::load_from(config_path).context("failed to load configuration")?;
    BeaconApp::initialise(config)
        .await
        .context("failed to construct application")
}

fn parse_cli_args<I>(args: I) -> anyhow::Result<CliCommand>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut subcommand: Option<String> = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                if config_path.is_some() {
                    anyhow::bail!("config path specified multiple times");
                }
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("expected path after {arg}"))?;
                config_path = Some(value);
            }
            "-h" | "--help" => return Ok(CliCommand::Help),
            other if other.starts_with('-') => anyhow::bail!("unrecognised argument `{other}`"),
            other if subcommand.is_none() => subcommand = Some(other.to_string()),
            other => positional.push(other.to_string()),
        }
    }

    match subcommand.as_deref() {
        None | Some("run") => {
            if let Some(extra) = positional.first() {
                anyhow::bail!("unexpected argument `{extra}`");
            }
            Ok(CliCommand::Run { config_path })
        }
        Some("check") => {
            let mut positional = positional.into_iter();
            let domain = positional
                .next()
                .ok_or_else(|| anyhow::anyhow!("beacon check requires a domain"))?;
            if let Some(extra) = positional.next() {
                anyhow::bail!("unexpected argument `{extra}`");
            }
            Ok(CliCommand::Check {
                config_path,
                domain,
            })
        }
        Some("sweep") => {
            if let Some(extra) = positional.first() {
                anyhow::bail!("unexpected argument `{extra}`");
            }
            Ok(CliCommand::Sweep { config_path })
        }
        Some(other) => anyhow::bail!("unknown command `{other}`"),
    }
}

fn print_help() {
    println!(
        "\
Usage: beacon [OPTIONS] [run]
       beacon [OPTIONS] check <DOMAIN>
       beacon [OPTIONS] sweep

Commands:
  run                    Serve the HTTP API (default)
  check <DOMAIN>         Probe a domain once and print the classified result
  sweep                  Delete status checks older than the retention horizon

Options:
  -c, --config <PATH>    Path to a beacon configuration file
  -h, --help             Print this help message

Every setting can be overridden with BEACON__<SECTION>__<KEY> environment variables.
"
    );
}
