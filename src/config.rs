//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The settlement signer key is referenced by env-var name in the config and
//! resolved at startup into a `SecretString`.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::orchestrator::{OrchestratorSettings, DEFAULT_LEG_COOLDOWN};
use crate::engine::settlement::{is_valid_address, SettlementPlan};
use crate::types::{Asset, FeeSchedule};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub venue: VenueConfig,
    pub swap: SwapConfig,
    pub assets: Vec<AssetConfig>,
    pub settlement: SettlementConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VenueConfig {
    /// Base URL of the venue's HTTP API. Defaults to mainnet.
    #[serde(default)]
    pub info_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Fill against live mids instead of routing orders.
    pub paper_trading: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SwapConfig {
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub slippage: f64,
    /// At least 1000.
    #[serde(default = "default_leg_cooldown_ms")]
    pub leg_cooldown_ms: u64,
    pub order_timeout_secs: u64,
}

fn default_leg_cooldown_ms() -> u64 {
    DEFAULT_LEG_COOLDOWN.as_millis() as u64
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    /// Venue symbol (`@142`, `PURR/USDC`).
    pub id: String,
    /// Token name used for size metadata (`UBTC`).
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettlementConfig {
    pub source_asset: String,
    pub destination_asset: String,
    /// Custodial address deposits are sent to.
    pub system_address: String,
    pub signer_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub journal_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            journal_path: crate::storage::DEFAULT_JOURNAL_FILE.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Startup checks. Anything rejected here would otherwise fail mid-swap.
    pub fn validate(&self) -> Result<()> {
        let fees = self.fee_schedule()?;
        for (label, fee) in [("maker_fee", fees.maker), ("taker_fee", fees.taker)] {
            if fee < Decimal::ZERO || fee >= Decimal::ONE {
                bail!("swap.{label} {fee} outside [0, 1)");
            }
        }
        let slippage = decimal(self.swap.slippage, "swap.slippage")?;
        if slippage <= Decimal::ZERO || slippage >= Decimal::ONE {
            bail!("swap.slippage {slippage} outside (0, 1)");
        }
        if Duration::from_millis(self.swap.leg_cooldown_ms) < DEFAULT_LEG_COOLDOWN {
            bail!(
                "swap.leg_cooldown_ms {} is below the {}ms minimum",
                self.swap.leg_cooldown_ms,
                DEFAULT_LEG_COOLDOWN.as_millis()
            );
        }
        if self.swap.order_timeout_secs == 0 {
            bail!("swap.order_timeout_secs must be positive");
        }
        if self.venue.request_timeout_secs == 0 {
            bail!("venue.request_timeout_secs must be positive");
        }

        let mut seen = HashSet::new();
        for asset in &self.assets {
            if asset.id.is_empty() || asset.name.is_empty() {
                bail!("asset entries need both id and name");
            }
            if !seen.insert(asset.id.as_str()) {
                bail!("duplicate asset id {}", asset.id);
            }
        }

        let source = self.asset(&self.settlement.source_asset)?;
        let destination = self.asset(&self.settlement.destination_asset)?;
        if source.id == destination.id {
            bail!("settlement source and destination are the same asset");
        }
        if !is_valid_address(&self.settlement.system_address) {
            bail!(
                "settlement.system_address is malformed: {}",
                self.settlement.system_address
            );
        }
        if self.settlement.signer_key_env.is_empty() {
            bail!("settlement.signer_key_env is empty");
        }
        Ok(())
    }

    /// Look up an asset by venue id.
    pub fn asset(&self, id: &str) -> Result<Asset> {
        self.assets
            .iter()
            .find(|a| a.id == id)
            .map(|a| Asset::new(&a.id, &a.name))
            .with_context(|| format!("Asset {id} is not in the asset table"))
    }

    pub fn fee_schedule(&self) -> Result<FeeSchedule> {
        Ok(FeeSchedule {
            maker: decimal(self.swap.maker_fee, "swap.maker_fee")?,
            taker: decimal(self.swap.taker_fee, "swap.taker_fee")?,
        })
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            leg_cooldown: Duration::from_millis(self.swap.leg_cooldown_ms),
            order_timeout: Duration::from_secs(self.swap.order_timeout_secs),
        }
    }

    pub fn settlement_plan(&self) -> Result<SettlementPlan> {
        Ok(SettlementPlan {
            source: self.asset(&self.settlement.source_asset)?,
            destination: self.asset(&self.settlement.destination_asset)?,
            fees: self.fee_schedule()?,
            slippage: decimal(self.swap.slippage, "swap.slippage")?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.venue.request_timeout_secs)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The settlement signer key, read from the configured env var.
    pub fn signer_key(&self) -> Result<SecretString> {
        Self::resolve_env(&self.settlement.signer_key_env).map(SecretString::new)
    }
}

fn decimal(value: f64, field: &str) -> Result<Decimal> {
    Decimal::from_str(&value.to_string())
        .with_context(|| format!("{field} is not a finite decimal: {value}"))
}
