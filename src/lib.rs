pub mod agent;
pub mod models;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;
pub mod history;
pub mod session;
pub mod widgets;

use agent::Assistant;
use cli::Args;
use config::AppConfig;
use config::prompt::initial_prompts;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::from_args(&args)?;

    info!("--- Core Configuration ---");
    info!("Chat Base URL: {}", config.llm.base_url);
    info!("Chat Model: {}", config.llm.chat_model);
    info!("Vision Model: {}", config.llm.vision_model);
    info!("WebSocket Address: {}", config.server_addr);
    info!("Page WebSocket URL: {}", config.public_ws_url);
    info!("HTTP Port: {}", config.http_port);
    info!("Prompts Path: {}", config.prompts_path.as_deref().unwrap_or("built-in"));
    info!("TLS Enabled: {}", config.tls.is_some());
    info!("-------------------------");

    let prompts = initial_prompts(config.prompts_path.as_deref())?;
    let chat_client = llm::chat::new_client(&config.llm)?;
    let assistant = Arc::new(Assistant::new(chat_client, prompts, config.prompts_path.clone()));

    let server = Server::new(config, assistant);
    server.run().await?;

    Ok(())
}
