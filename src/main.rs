use clap::{ArgAction, Parser, Subcommand};
use owo_colors::OwoColorize;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use echotune_resilience::config::ResilienceConfig;
use echotune_resilience::error::{classify, ErrorCategory, RemoteFailure};
use echotune_resilience::logging::{init_logging, LoggingConfig};
use echotune_resilience::validation::validate_model_id;

#[derive(Parser, Debug)]
#[command(name = "echotune")]
#[command(version)]
#[command(about = "Resilience tooling for EchoTune model provider calls")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file (TOML)
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a provider failure and print remediation hints
    Classify {
        /// Failure message as reported by the provider
        #[arg(long, short)]
        message: Option<String>,

        /// HTTP status code of the failed call
        #[arg(long, short)]
        status: Option<u16>,

        /// Failure kind, e.g. ThrottlingException
        #[arg(long)]
        kind: Option<String>,

        /// Print JSON instead of the text report
        #[arg(long)]
        json: bool,
    },
    /// Print the retry delay schedule for the configured policy
    Backoff {
        /// Number of delays to print (defaults to max_retries)
        #[arg(long, short = 'n')]
        count: Option<usize>,

        /// Only print the schedule if this category is retried, e.g. rate_limit
        #[arg(long)]
        category: Option<ErrorCategory>,
    },
    /// Check a model identifier's format
    ValidateModel {
        /// Model ID, e.g. anthropic.claude-3-5 or a Bedrock ARN
        model_id: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(LoggingConfig::from_flags(cli.verbose, cli.quiet));

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    match cli.command {
        Commands::Classify {
            message,
            status,
            kind,
            json,
        } => {
            let mut failure = RemoteFailure::new(message.unwrap_or_default());
            if let Some(status) = status {
                failure = failure.with_status(status);
            }
            if let Some(kind) = kind {
                failure = failure.with_kind(kind);
            }

            let classified = classify(&failure);
            if json {
                println!("{}", serde_json::to_string_pretty(&classified)?);
            } else {
                print!("{}", classified.render());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Backoff { count, category } => {
            let config = ResilienceConfig::load_or_default(cli.config.as_ref())?;
            let policy = config.retry.to_policy()?;
            let count = count.unwrap_or(policy.max_retries as usize);

            if let Some(category) = category {
                if !policy.is_retryable(category) {
                    println!("{} is not retried", category);
                    return Ok(ExitCode::SUCCESS);
                }
            }

            for (idx, delay) in policy.delays().take(count).enumerate() {
                println!("retry {}: {}ms", idx + 1, delay.as_millis());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::ValidateModel { model_id } => match validate_model_id(&model_id) {
            Ok(()) => {
                println!("{} {}", "valid:".green(), model_id);
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                println!("{} {}", "invalid:".red(), err);
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Config => {
            let config = ResilienceConfig::load_or_default(cli.config.as_ref())?;
            config.validate()?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
