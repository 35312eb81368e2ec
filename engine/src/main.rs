use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use eyre::{Result, WrapErr};
use tonic::transport::Server as TonicServer;

use paladin_engine::config::Config;
use paladin_engine::domain::{DomainManager, DomainPlugin};
use paladin_engine::inbound::InboundHandler;
use paladin_engine::orchestrator::engine::{Engine, EngineHandle};
use paladin_engine::ptx::{AutoFuelingConfig, PublicTxManager, PublicTxManagerConfig};
use paladin_engine::ptx::nonce::RpcNonceCallback;
use paladin_engine::ptx::gas::Eip1559GasPricer;
use paladin_engine::sequencer::Delegator;
use paladin_engine::state::StateStore;
use paladin_engine::transport::PublisherPeerSender;
use paladin_engine::{api, db};

use paladin_transport::proto::paladin_transport_server::PaladinTransportServer;
use paladin_transport::{Publisher, TransportClient, TransportServer};

fn main() -> Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_logging();

    tracing::info!("starting paladin engine");

    let config = Config::load()?;
    tracing::info!(chain_id = config.chain_id, domains = config.domains.len(), "configuration loaded");

    let pool = db::create_pool(&config.database.url, config.database.max_connections).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("database migrations complete");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let state_store = Arc::new(StateStore::new(pool.clone()));

    // Domain plugins are an external collaborator: only the plugin contract
    // is specified here, not any concrete plugin. Operators supply their
    // own plugin implementations at deployment time.
    let plugins: HashMap<String, Arc<dyn DomainPlugin>> = HashMap::new();
    let domain_manager = Arc::new(
        DomainManager::new(
            config.domains.clone(),
            plugins,
            config.domain_manager.contract_cache_capacity,
            state_store.clone(),
            config.chain_id,
        )
        .wrap_err("failed to construct domain manager")?,
    );
    domain_manager.spawn_init_loops(shutdown_rx.clone());

    let signers = build_signers(&config.public_tx.signer_private_keys)?;
    let nonce_callback = Arc::new(RpcNonceCallback { rpc_url: config.public_tx.rpc_url.clone() });
    let gas_pricer = Arc::new(Eip1559GasPricer {
        rpc_url: config.public_tx.rpc_url.clone(),
        base_fee_multiplier: 2.0,
        priority_fee_gwei: 1,
    });
    let ptx_manager = Arc::new(PublicTxManager::new(
        pool.clone(),
        PublicTxManagerConfig {
            rpc_url: config.public_tx.rpc_url.clone(),
            resubmit_after: Duration::from_secs(config.public_tx.resubmit_after_secs),
            fueling: None::<AutoFuelingConfig>,
        },
        signers,
        nonce_callback,
        gas_pricer,
    ));

    let transport_client = TransportClient::connect(config.transport.peer_endpoint.clone())
        .await
        .wrap_err("failed to connect to peer transport endpoint")?;
    let publisher = Publisher::new(transport_client);
    let peer = Arc::new(PublisherPeerSender { publisher, shutdown: shutdown_rx.clone() });
    let delegator = Arc::new(Delegator::new(peer.clone()));

    let engine = Engine::new(
        config.orchestrator.clone(),
        state_store.clone(),
        domain_manager.clone(),
        ptx_manager.clone(),
        peer.clone(),
        shutdown_rx.clone(),
    );
    let engine_handle = EngineHandle::new(engine.clone());

    spawn_shutdown_signal_listener(shutdown_tx);
    spawn_resubmission_loop(ptx_manager.clone(), shutdown_rx.clone());
    spawn_delegation_retry_loop(delegator.clone(), shutdown_rx.clone());
    tokio::spawn(engine.clone().run_metrics_loop(shutdown_rx.clone()));

    let transport_listen_addr: SocketAddr =
        config.transport.listen_addr.parse().wrap_err("invalid transport listen address")?;
    let transport_server = TonicServer::builder()
        .add_service(PaladinTransportServer::new(TransportServer::new(InboundHandler {
            engine: engine.clone(),
            delegator: delegator.clone(),
        })))
        .serve(transport_listen_addr);

    let api_addr: SocketAddr = config.api_bind.parse().wrap_err("invalid api bind address")?;

    tokio::select! {
        result = transport_server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "transport server error");
            }
        }
        result = api::start_api_server(api_addr, pool.clone(), engine_handle) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "api server error");
            }
        }
    }

    tracing::info!("paladin engine stopped");
    Ok(())
}

fn build_signers(keys: &[String]) -> Result<HashMap<String, PrivateKeySigner>> {
    let mut signers = HashMap::new();
    for key in keys {
        let signer = PrivateKeySigner::from_str(key).wrap_err("invalid signer private key")?;
        signers.insert(signer.address().to_string().to_lowercase(), signer);
    }
    Ok(signers)
}

fn spawn_shutdown_signal_listener(shutdown_tx: tokio::sync::watch::Sender<bool>) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });
}

fn spawn_resubmission_loop(ptx_manager: Arc<PublicTxManager>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = ptx_manager.resubmit_stale().await {
                        tracing::warn!(error = %e, "resubmission sweep failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });
}

fn spawn_delegation_retry_loop(delegator: Arc<Delegator>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    delegator.retry_due().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,paladin_engine=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
