use crate::agent::{ Assistant, BoxError, EventSink };
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::widgets::vision::analysis_error_message;

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use log::{ debug, info, warn, error };

// Image uploads travel in-band as base64, so frames are allowed to be large.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap()));
}

pub fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, BoxError> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

/// Forwards session events to the browser as JSON text frames.
struct SocketSink<'a, S> where S: AsyncRead + AsyncWrite + Unpin {
    tx: &'a mut SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<'a, S> EventSink for SocketSink<'a, S> where S: AsyncRead + AsyncWrite + Unpin + Send {
    async fn emit(&mut self, message: ServerMessage) -> Result<(), BoxError> {
        let json = serde_json::to_string(&message)?;
        self.tx.send(Message::Text(json)).await?;
        Ok(())
    }
}

pub async fn start_ws_server(
    addr: &str,
    assistant: Arc<Assistant>,
    tls_acceptor: Option<TlsAcceptor>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let protocol = if tls_acceptor.is_some() { "wss" } else { "ws" };
    info!("{} server listening on: {}", protocol.to_uppercase(), addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let assistant_clone = Arc::clone(&assistant);
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, assistant_clone).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, assistant_clone).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    assistant: Arc<Assistant>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let handshake_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let origin = req
            .headers()
            .get("Origin")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<none>");
        debug!("Handshake from {} (origin {})", peer, origin);
        Ok(response)
    };

    match accept_hdr_async(stream, handshake_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, assistant).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

/// Runs one session for the lifetime of the socket. Actions are handled one
/// at a time, the full streaming reply included, before the next is read.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    assistant: Arc<Assistant>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send
{
    info!("New WebSocket connection: {}", peer);

    if let Err(e) = assistant.reload_prompts_if_changed() {
        error!("Failed to reload prompts: {}", e);
    }

    let (mut tx, mut rx) = websocket.split();
    let mut session = assistant.new_session();
    info!("Assigned session ID {} to {}", session.id, peer);

    let mut sink = SocketSink { tx: &mut tx };
    let hello = ServerMessage::Session {
        id: session.id.clone(),
        tools_visible: session.tools_visible,
    };
    if let Err(e) = sink.emit(hello).await {
        error!("Failed to greet {}: {}", peer, e);
        return;
    }

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(m) => m,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            // Only image uploads get this big; the session stays open.
            let reason = format!("image too large (limit is {} MiB)", MAX_MESSAGE_SIZE / (1024 * 1024));
            let error_msg = ServerMessage::ToolError {
                message: analysis_error_message(&reason),
            };
            if let Err(e) = sink.emit(error_msg).await {
                error!("Failed to send size limit error to {}: {}", peer, e);
                break;
            }
            continue;
        }

        match message {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_message) => {
                        if let Err(e) = assistant.handle(&mut session, client_message, &mut sink).await {
                            error!("Failed to deliver events to {}: {}", peer, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse message from {}: {}", peer, e);
                        let error_msg = ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        };
                        if let Err(e) = sink.emit(error_msg).await {
                            error!("Error sending parse error to {}: {}", peer, e);
                            break;
                        }
                    }
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                if sink.tx.send(Message::Pong(ping_data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
            }
            Message::Pong(_) => {}
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
            }
            Message::Frame(_) => {}
        }
    }
    info!(
        "WebSocket connection closed for {} (session {}, {} messages)",
        peer,
        session.id,
        session.history().len()
    );
}
