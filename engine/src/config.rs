//! Engine configuration: environment-variable driven, following the same
//! shape as the teacher's relayer config — required vars fail fast,
//! optional vars fall back to defaults, secrets are redacted from `Debug`.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;

use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;

fn default_contract_cache_capacity() -> usize {
    1000
}
fn default_max_concurrent_process() -> usize {
    500
}
fn default_stage_retry() -> u32 {
    5
}
fn default_eval_interval_secs() -> u64 {
    300
}
fn default_persistence_retry_timeout_secs() -> u64 {
    30
}
fn default_stale_timeout_secs() -> u64 {
    600
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_api_bind() -> String {
    "0.0.0.0:9090".to_string()
}
fn default_resubmit_after_secs() -> u64 {
    120
}
fn default_transport_listen_addr() -> String {
    "0.0.0.0:7070".to_string()
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct DomainConfig {
    pub plugin: String,
    #[serde(default)]
    pub config: serde_json::Value,
    pub registry_address: String,
    #[serde(default)]
    pub allow_signing: bool,
    #[serde(default)]
    pub default_gas_limit: Option<u64>,
    #[serde(default)]
    pub fixed_signing_identity: Option<String>,
}

impl fmt::Debug for DomainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainConfig")
            .field("plugin", &self.plugin)
            .field("config", &"<redacted>")
            .field("registry_address", &self.registry_address)
            .field("allow_signing", &self.allow_signing)
            .field("default_gas_limit", &self.default_gas_limit)
            .field("fixed_signing_identity", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TransportRegistrationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub required_prefix: Option<String>,
    #[serde(default)]
    pub hierarchy_splitter: Option<String>,
    #[serde(default)]
    pub property_regexp: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub transports: TransportRegistrationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainManagerConfig {
    #[serde(default = "default_contract_cache_capacity")]
    pub contract_cache_capacity: usize,
}

impl Default for DomainManagerConfig {
    fn default() -> Self {
        Self {
            contract_cache_capacity: default_contract_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_concurrent_process")]
    pub max_concurrent_process: usize,
    #[serde(default = "default_stage_retry")]
    pub stage_retry: u32,
    #[serde(default = "default_eval_interval_secs")]
    pub eval_interval_secs: u64,
    #[serde(default = "default_persistence_retry_timeout_secs")]
    pub persistence_retry_timeout_secs: u64,
    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_process: default_max_concurrent_process(),
            stage_retry: default_stage_retry(),
            eval_interval_secs: default_eval_interval_secs(),
            persistence_retry_timeout_secs: default_persistence_retry_timeout_secs(),
            stale_timeout_secs: default_stale_timeout_secs(),
        }
    }
}

/// Public transaction submission settings. Chain id comes from `domains.*`
/// individually at the plugin level; this section covers the shared
/// signing/submission surface (spec section 4.2).
#[derive(Clone, Deserialize)]
pub struct PublicTxConfig {
    pub rpc_url: String,
    #[serde(default = "default_resubmit_after_secs")]
    pub resubmit_after_secs: u64,
    /// Hex-encoded private keys (`0x`-prefixed, 32 bytes), one per signer
    /// this engine instance is authorised to submit for. Key material
    /// never appears in `Debug` output.
    #[serde(default)]
    pub signer_private_keys: Vec<String>,
}

impl fmt::Debug for PublicTxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicTxConfig")
            .field("rpc_url", &self.rpc_url)
            .field("resubmit_after_secs", &self.resubmit_after_secs)
            .field("signer_private_keys", &format!("<{} redacted>", self.signer_private_keys.len()))
            .finish()
    }
}

/// Peer transport bind/dial addresses (spec section 4.7). Node discovery
/// and the full registry/transport-mapping resolution are external
/// collaborators; this engine only needs where to listen and a single
/// upstream peer endpoint to publish through.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_transport_listen_addr")]
    pub listen_addr: String,
    pub peer_endpoint: String,
}

#[derive(Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub domains: HashMap<String, DomainConfig>,
    #[serde(default)]
    pub registries: HashMap<String, RegistryConfig>,
    #[serde(default)]
    pub domain_manager: DomainManagerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    pub public_tx: PublicTxConfig,
    pub transport: TransportConfig,
    #[serde(default = "default_api_bind")]
    pub api_bind: String,
    pub chain_id: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database)
            .field("domains", &self.domains.keys().collect::<Vec<_>>())
            .field("registries", &self.registries.keys().collect::<Vec<_>>())
            .field("domain_manager", &self.domain_manager)
            .field("orchestrator", &self.orchestrator)
            .field("public_tx", &self.public_tx)
            .field("transport", &self.transport)
            .field("api_bind", &self.api_bind)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl Config {
    /// Load `.env` if present, then build configuration from environment
    /// variables. Domain and registry maps (which need a name-keyed
    /// structure env vars don't model well) are read from an optional JSON
    /// file pointed to by `PALADIN_TOPOLOGY_FILE`.
    pub fn load() -> Result<Self> {
        if dotenvy::dotenv().is_err() {
            tracing::debug!("no .env file found, reading configuration from process environment");
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").map_err(|_| eyre!("DATABASE_URL is required"))?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_db_max_connections()),
        };

        let (domains, registries) = match env::var("PALADIN_TOPOLOGY_FILE") {
            Ok(path) => {
                let raw = fs::read_to_string(&path)
                    .wrap_err_with(|| format!("reading topology file {path}"))?;
                let topology: Topology = serde_json::from_str(&raw)
                    .wrap_err_with(|| format!("parsing topology file {path}"))?;
                (topology.domains, topology.registries)
            }
            Err(_) => (HashMap::new(), HashMap::new()),
        };

        let domain_manager = DomainManagerConfig {
            contract_cache_capacity: env::var("DOMAIN_MANAGER_CONTRACT_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_contract_cache_capacity()),
        };

        let orchestrator = OrchestratorConfig {
            max_concurrent_process: env::var("ORCHESTRATOR_MAX_CONCURRENT_PROCESS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_max_concurrent_process()),
            stage_retry: env::var("ORCHESTRATOR_STAGE_RETRY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_stage_retry()),
            eval_interval_secs: env::var("ORCHESTRATOR_EVAL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_eval_interval_secs()),
            persistence_retry_timeout_secs: env::var("ORCHESTRATOR_PERSISTENCE_RETRY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_persistence_retry_timeout_secs()),
            stale_timeout_secs: env::var("ORCHESTRATOR_STALE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_stale_timeout_secs()),
        };

        let api_bind = env::var("API_BIND").unwrap_or_else(|_| default_api_bind());

        let public_tx = PublicTxConfig {
            rpc_url: env::var("PTX_RPC_URL").map_err(|_| eyre!("PTX_RPC_URL is required"))?,
            resubmit_after_secs: env::var("PTX_RESUBMIT_AFTER_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_resubmit_after_secs()),
            signer_private_keys: env::var("PTX_SIGNER_KEYS")
                .ok()
                .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
        };

        let chain_id = env::var("CHAIN_ID")
            .map_err(|_| eyre!("CHAIN_ID is required"))?
            .parse()
            .wrap_err("CHAIN_ID must be a valid u64")?;

        let transport = TransportConfig {
            listen_addr: env::var("TRANSPORT_LISTEN_ADDR").unwrap_or_else(|_| default_transport_listen_addr()),
            peer_endpoint: env::var("TRANSPORT_PEER_ENDPOINT")
                .map_err(|_| eyre!("TRANSPORT_PEER_ENDPOINT is required"))?,
        };

        let config = Config {
            database,
            domains,
            registries,
            domain_manager,
            orchestrator,
            public_tx,
            transport,
            api_bind,
            chain_id,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(eyre!("FATAL: database.url must not be empty"));
        }
        if self.domain_manager.contract_cache_capacity == 0 {
            return Err(eyre!("FATAL: domainManager.contractCache.capacity must be > 0"));
        }
        if self.orchestrator.max_concurrent_process == 0 {
            return Err(eyre!("FATAL: orchestrator.maxConcurrentProcess must be > 0"));
        }
        if self.public_tx.rpc_url.is_empty() {
            return Err(eyre!("FATAL: publicTx.rpcUrl must not be empty"));
        }
        if self.transport.peer_endpoint.is_empty() {
            return Err(eyre!("FATAL: transport.peerEndpoint must not be empty"));
        }
        for (name, domain) in &self.domains {
            if domain.registry_address.is_empty() {
                return Err(eyre!("FATAL: domain '{name}' has an empty registryAddress"));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize, Default)]
struct Topology {
    #[serde(default)]
    domains: HashMap<String, DomainConfig>,
    #[serde(default)]
    registries: HashMap<String, RegistryConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://localhost/paladin".into(),
                max_connections: 10,
            },
            domains: HashMap::new(),
            registries: HashMap::new(),
            domain_manager: DomainManagerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            public_tx: PublicTxConfig {
                rpc_url: "http://localhost:8545".into(),
                resubmit_after_secs: default_resubmit_after_secs(),
                signer_private_keys: Vec::new(),
            },
            transport: TransportConfig {
                listen_addr: default_transport_listen_addr(),
                peer_endpoint: "http://localhost:7070".into(),
            },
            api_bind: default_api_bind(),
            chain_id: 1337,
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_db_url() {
        let mut cfg = base_config();
        cfg.database.url = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cache_capacity() {
        let mut cfg = base_config();
        cfg.domain_manager.contract_cache_capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_redacts_database_url() {
        let cfg = base_config();
        let rendered = format!("{:?}", cfg.database);
        assert!(!rendered.contains("localhost"));
    }
}
