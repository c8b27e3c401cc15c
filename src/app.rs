use crate::app_state::AppState;
use crate::config::BeaconConfig;
use crate::error::{Context, Result};
use crate::notify::sink_from_config;
use crate::probe::HttpProber;
use crate::store::{MemoryStore, StatusStore};
use crate::transport;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "db-postgres")]
use crate::store::PgStatusStore;

pub struct BeaconApp {
    state: AppState,
    listen_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl BeaconApp {
    pub async fn initialise(config: BeaconConfig) -> Result<Self> {
        let listen_addr = format!("{}:{}", config.server.host, config.server.port)
            .parse::<SocketAddr>()
            .with_context(|| {
                format!(
                    "invalid listen address {}:{}",
                    config.server.host, config.server.port
                )
            })?;

        let store = build_store(&config).await?;
        let prober = HttpProber::new(&config.probe).context("failed to construct prober")?;
        let sink = sink_from_config(&config.notifications)
            .context("failed to construct notification sink")?;

        if config.cron_secret().is_none() {
            tracing::warn!("retention.cron_secret is not set; cleanup requests will be rejected");
        }

        let state = AppState::assemble(&config, store, Arc::new(prober), sink);

        Ok(Self {
            state,
            listen_addr,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            state,
            listen_addr,
            shutdown,
        } = self;

        let server_shutdown = shutdown.clone();
        let mut server_task =
            tokio::spawn(async move { transport::serve(listen_addr, state, server_shutdown).await });

        tracing::info!("beacon service ready; press Ctrl+C to stop");

        tokio::select! {
            res = &mut server_task => {
                tracing::warn!("http server task terminated unexpectedly");
                return match res {
                    Ok(result) => result,
                    Err(join_err) => Err(crate::err!("http server task join error: {join_err}")),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
            }
        }

        shutdown.cancel();
        match server_task.await {
            Ok(result) => result,
            Err(join_err) => Err(crate::err!("http server task join error: {join_err}")),
        }
    }
}

async fn build_store(config: &BeaconConfig) -> Result<Arc<dyn StatusStore>> {
    match config.database.as_ref() {
        #[cfg(feature = "db-postgres")]
        Some(database) => {
            let store = PgStatusStore::connect(database).await?;
            tracing::info!("connected to status database");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db-postgres"))]
        Some(_) => {
            tracing::warn!(
                "database configured but the db-postgres feature is disabled; using in-memory store"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
        None => {
            tracing::warn!("no database configured; using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
