use clap::{Parser, Subcommand};
use eyre::{bail, Result, WrapErr};
use serde::Serialize;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use scamguard::{
    auth::ApiKey,
    build_rule_set, default_config_path, hash_ruleset, load_config,
    rules::RuleSet,
    server::{run_server, ServerConfig},
    validate_config, RiskLevel, ScamGuardConfig, Scorer,
};

/// Exit code for `analyze --fail-on-scam` when the message is flagged.
const SCAM_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "scamguard",
    version,
    about = "Score free-text messages for scam likelihood using keyword and pattern rules."
)]
struct Cli {
    /// Path to the config file (default: ~/.scamguard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single message and print the report as JSON
    Analyze {
        /// Message text; read from stdin when omitted
        #[arg(long)]
        text: Option<String>,

        /// Pretty-print the JSON report
        #[arg(long, default_value_t = false)]
        pretty: bool,

        /// Exit with status 2 when the message is flagged as a scam
        #[arg(long, default_value_t = false)]
        fail_on_scam: bool,
    },

    /// Run the HTTP scoring service
    Serve {
        /// Address to bind (overrides [server].bind_addr)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Shared secret required in the x-api-key header
        #[arg(long, env = "SCAMGUARD_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Requests per minute per client IP, 0 disables (overrides config)
        #[arg(long)]
        rate_limit_rpm: Option<u32>,
    },

    /// Show the effective rule table
    Rules,

    /// Validate the config file and report any issues
    ConfigCheck,
}

#[derive(Serialize)]
struct RulesReport<'a> {
    ruleset_hash: String,
    #[serde(flatten)]
    rules: &'a RuleSet,
}

fn load(config_path: Option<&PathBuf>) -> Result<(Option<ScamGuardConfig>, RuleSet)> {
    let config = load_config(config_path.map(PathBuf::as_path))?;
    let rules = build_rule_set(config.as_ref())?;
    Ok((config, rules))
}

/// Returns an exit code: 0 normally, 2 for a flagged message under `--fail-on-scam`.
fn cmd_analyze(
    config_path: Option<&PathBuf>,
    text: Option<String>,
    pretty: bool,
    fail_on_scam: bool,
) -> Result<i32> {
    let (_, rules) = load(config_path)?;
    let scorer = Scorer::new(rules);

    let message = match text {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .wrap_err("failed to read message from stdin")?;
            buf
        }
    };

    let result = scorer.analyze(&message);
    tracing::debug!(risk_level = %result.risk_level, confidence = result.confidence, "analyzed");

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);

    if fail_on_scam && result.scam_detected {
        return Ok(SCAM_EXIT_CODE);
    }
    Ok(0)
}

fn cmd_serve(
    config_path: Option<&PathBuf>,
    bind: Option<SocketAddr>,
    api_key: Option<String>,
    rate_limit_rpm: Option<u32>,
) -> Result<()> {
    let (config, rules) = load(config_path)?;
    let mut server_config =
        ServerConfig::from_settings(config.as_ref().and_then(|c| c.server.as_ref()))?;

    if let Some(addr) = bind {
        server_config.bind_addr = addr;
    }
    if let Some(key) = api_key {
        if key.is_empty() {
            bail!("--api-key must not be empty");
        }
        server_config.api_key = Some(ApiKey::new(&key));
    }
    if let Some(rpm) = rate_limit_rpm {
        server_config.rate_limit_rpm = rpm;
    }
    if server_config.api_key.is_none() {
        tracing::warn!("no API key configured, /analyze is open to any caller");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start tokio runtime")?;
    runtime.block_on(run_server(server_config, Scorer::new(rules)))
}

fn cmd_rules(config_path: Option<&PathBuf>) -> Result<()> {
    let (_, rules) = load(config_path)?;
    let t = rules.thresholds;
    let report = RulesReport {
        ruleset_hash: hash_ruleset(&rules),
        rules: &rules,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    eprintln!("Risk tiers:");
    for level in RiskLevel::ALL.iter().rev() {
        let bound = match level {
            RiskLevel::Critical => format!(">= {}", t.critical),
            RiskLevel::High => format!(">= {}", t.high),
            RiskLevel::Medium => format!(">= {}", t.medium),
            RiskLevel::Low => format!("<  {}", t.medium),
        };
        eprintln!("  {:<8} {:<6} {}", level.as_str(), bound, level.agent_reply());
    }
    Ok(())
}

fn cmd_config_check(config_path: Option<&PathBuf>) -> Result<()> {
    let path = config_path.cloned().unwrap_or_else(default_config_path);
    println!("Config path: {}", path.display());

    let config = match load_config(Some(path.as_path())) {
        Ok(Some(c)) => {
            println!("Config file parsed successfully.");
            c
        }
        Ok(None) => {
            println!("No config file found. Using defaults.");
            return Ok(());
        }
        Err(e) => {
            println!("ERROR: {e:#}");
            return Ok(());
        }
    };

    let issues = validate_config(&config);
    if issues.is_empty() {
        println!("All checks passed.");
    } else {
        for issue in &issues {
            println!("  {}", issue);
        }
        println!("\n{} issue(s) found.", issues.len());
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.as_ref();

    let result = match cli.command {
        Commands::Analyze {
            text,
            pretty,
            fail_on_scam,
        } => match cmd_analyze(config_path, text, pretty, fail_on_scam) {
            Ok(code) => {
                if code != 0 {
                    std::process::exit(code);
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        Commands::Serve {
            bind,
            api_key,
            rate_limit_rpm,
        } => cmd_serve(config_path, bind, api_key, rate_limit_rpm),
        Commands::Rules => cmd_rules(config_path),
        Commands::ConfigCheck => cmd_config_check(config_path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
