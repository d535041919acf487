//! Gateway server

use std::future::{Future, IntoFuture};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use super::service::EmployeeGateway;
use crate::config::Config;
use crate::{Error, Result};

/// HTTP server in front of an [`EmployeeGateway`]
pub struct Server {
    /// Configuration
    config: Config,
    /// Shared gateway
    gateway: Arc<EmployeeGateway>,
}

impl Server {
    /// Create a new server
    pub fn new(config: Config) -> Result<Self> {
        let gateway = Arc::new(EmployeeGateway::new(&config)?);
        Ok(Self { config, gateway })
    }

    /// Gateway the handlers delegate to
    pub fn gateway(&self) -> Arc<EmployeeGateway> {
        Arc::clone(&self.gateway)
    }

    /// Bind the configured address and serve until Ctrl-C / SIGTERM
    pub async fn run(self) -> Result<()> {
        let host: IpAddr = self
            .config
            .server
            .host
            .parse()
            .map_err(|e| Error::Config(format!("Invalid host: {e}")))?;
        let addr = SocketAddr::new(host, self.config.server.port);

        #[cfg(feature = "metrics")]
        if let Some(port) = self.config.server.metrics_port {
            install_metrics_exporter(SocketAddr::new(host, port))?;
        }

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` completes
    ///
    /// In-flight requests get `server.shutdown_timeout` to finish after the
    /// signal; connections still open after that are dropped.
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let drain_timeout = self.config.server.shutdown_timeout;

        let app = create_router(
            Arc::new(AppState {
                gateway: Arc::clone(&self.gateway),
            }),
            &self.config.server,
        )?;

        info!(
            version = env!("CARGO_PKG_VERSION"),
            addr = %local_addr,
            base_path = %self.config.server.base_path,
            upstream = %self.config.upstream.base_url,
            "Employee gateway listening"
        );

        let (draining_tx, mut draining_rx) = watch::channel(false);
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Shutdown signal received, draining connections");
                let _ = draining_tx.send(true);
            })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            biased;
            result = &mut server => {
                result.map_err(|e| Error::Io(e.to_string()))?;
            }
            () = async {
                if draining_rx.wait_for(|draining| *draining).await.is_ok() {
                    tokio::time::sleep(drain_timeout).await;
                } else {
                    std::future::pending::<()>().await;
                }
            } => {
                warn!(
                    timeout_ms = drain_timeout.as_millis(),
                    "Shutdown timeout elapsed, dropping open connections"
                );
            }
        }

        info!("Employee gateway stopped");
        Ok(())
    }
}

#[cfg(feature = "metrics")]
fn install_metrics_exporter(addr: SocketAddr) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| Error::Config(format!("Failed to install Prometheus exporter: {e}")))?;
    info!(addr = %addr, "Prometheus metrics exporter listening");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
