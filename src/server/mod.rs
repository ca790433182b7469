pub mod api;
pub mod websocket;

use crate::agent::Assistant;
use crate::config::AppConfig;
use std::error::Error;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use log::info;

pub struct Server {
    config: AppConfig,
    assistant: Arc<Assistant>,
}

impl Server {
    pub fn new(config: AppConfig, assistant: Arc<Assistant>) -> Self {
        Self { config, assistant }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let tls_acceptor = match &self.config.tls {
            Some(paths) => {
                // rustls needs an explicit provider when more than one is compiled in.
                let _ = rustls::crypto::ring::default_provider().install_default();
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    paths.cert_path,
                    paths.key_path
                );
                let tls_config = websocket::load_tls_config(&paths.cert_path, &paths.key_path)?;
                Some(TlsAcceptor::from(tls_config))
            }
            None => {
                info!("TLS not enabled. Serving plain HTTP and WS.");
                None
            }
        };

        self.start_http_server().await?;
        self.start_ws_server(tls_acceptor).await
    }

    async fn start_http_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let state = api::AppState {
            assistant: Arc::clone(&self.assistant),
            page: Arc::new(api::render_index(&self.config.public_ws_url)),
        };
        api::start_http_server(self.config.http_port, state, self.config.tls.clone()).await
    }

    async fn start_ws_server(
        &self,
        tls_acceptor: Option<TlsAcceptor>
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.config.server_addr,
            Arc::clone(&self.assistant),
            tls_acceptor
        ).await
    }
}
