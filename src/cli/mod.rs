use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// API key for the OpenAI-compatible provider (OpenRouter). Required.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API (the `/chat/completions` route is appended)
    #[arg(long, env = "CHAT_BASE_URL", default_value = "https://openrouter.ai/api/v1")]
    pub chat_base_url: String,

    /// Model used for conversational replies
    #[arg(long, env = "CHAT_MODEL", default_value = "openai/gpt-4o-mini")]
    pub chat_model: String,

    /// Vision-capable model used for image analysis
    #[arg(long, env = "VISION_MODEL", default_value = "qwen/qwen2.5-vl-32b-instruct:free")]
    pub vision_model: String,

    // --- General App Args ---
    /// Optional JSON file overriding the persona prompt, user name, quotes and vision instruction.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP server that serves the chat page.
    #[arg(long, env = "HTTP_PORT", default_value = "8501")]
    pub http_port: u16,

    /// WebSocket URL the page should connect to. Derived from SERVER_ADDR when unset.
    #[arg(long, env = "PUBLIC_WS_URL")]
    pub public_ws_url: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS/HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS/HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
