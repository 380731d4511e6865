//! ScamGuard library: keyword and pattern scoring of free-text messages
//! for scam likelihood, plus the config and HTTP plumbing around it.

pub mod auth;
pub mod extract;
pub mod keywords;
pub mod normalize;
pub mod patterns;
pub mod risk;
pub mod rules;
pub mod scorer;
pub mod server;

use eyre::{Result, WrapErr};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub use extract::ExtractedEntities;
pub use risk::{RiskLevel, RuleName, Tactic};
pub use rules::RuleSet;
pub use scorer::{analyze, AnalysisResult, Scorer};

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ScamGuardConfig {
    pub server: Option<ServerSettings>,
    pub scoring: Option<rules::ScoringConfig>,
    pub response: Option<rules::ResponseConfig>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ServerSettings {
    pub bind_addr: Option<String>,
    /// Shared secret for the `x-api-key` header. No key means no gate.
    pub api_key: Option<String>,
    /// Requests per minute per client IP (0 = no limit).
    pub rate_limit_rpm: Option<u32>,
    pub cors_allow_any: Option<bool>,
}

// ---------------------------------------------------------------------------
// Directory helpers
// ---------------------------------------------------------------------------

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scamguard")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load the config file. A missing file yields `Ok(None)`; a file that
/// exists but does not parse is an error.
pub fn load_config(path: Option<&Path>) -> Result<Option<ScamGuardConfig>> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(None);
    }
    let content = fs::read_to_string(&path)
        .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
    let config: ScamGuardConfig = toml::from_str(&content)
        .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?;
    Ok(Some(config))
}

/// Compile the effective rule set from an optional config.
pub fn build_rule_set(config: Option<&ScamGuardConfig>) -> Result<RuleSet> {
    let scoring = config.and_then(|c| c.scoring.as_ref());
    let response = config.and_then(|c| c.response.as_ref());
    RuleSet::from_config(scoring, response).wrap_err("invalid [scoring] configuration")
}

/// Validate a config, returning a list of warnings and errors.
pub fn validate_config(config: &ScamGuardConfig) -> Vec<String> {
    let mut issues = Vec::new();

    if let Some(server) = &config.server {
        if let Some(ref addr) = server.bind_addr {
            if addr.parse::<SocketAddr>().is_err() {
                issues.push(format!("ERROR: bind_addr '{}' is not a socket address", addr));
            }
        }
        if let Some(ref key) = server.api_key {
            if key.trim().is_empty() {
                issues.push(
                    "ERROR: api_key is empty, set a value or remove it to disable the key check"
                        .to_string(),
                );
            }
        }
    }

    if let Some(scoring) = &config.scoring {
        if let Some(ref weights) = scoring.weights {
            for (name, weight) in weights {
                if RuleName::from_str_opt(name).is_some() && *weight == 0 {
                    issues.push(format!(
                        "WARNING: rule '{}' has weight 0, list it under `disabled` instead",
                        name
                    ));
                }
            }
        }
    }

    if let Err(e) = RuleSet::from_config(config.scoring.as_ref(), config.response.as_ref()) {
        issues.push(format!("ERROR: {}", e));
    }

    issues
}

// ---------------------------------------------------------------------------
// Ruleset hash, versioned so it changes if the serialization changes
// ---------------------------------------------------------------------------

const RULESET_HASH_VERSION: &str = "v1";

/// `sha256:<hex>` fingerprint of the effective rule tables.
pub fn hash_ruleset(rules: &RuleSet) -> String {
    let serialized =
        serde_json::to_vec(rules).unwrap_or_else(|_| format!("{:?}", rules).into_bytes());
    let mut hasher = Sha256::new();
    hasher.update(RULESET_HASH_VERSION.as_bytes());
    hasher.update(&serialized);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
