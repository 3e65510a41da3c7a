use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use crate::bridge::handler::BridgeHandler;
use crate::bridge::protocol::BridgeResponse;
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};

pub struct BridgeServer {
    port: u16,
    handler: Arc<BridgeHandler>,
}

impl BridgeServer {
    pub fn new(port: u16, handler: Arc<BridgeHandler>) -> Self {
        Self { port, handler }
    }

    pub fn from_config(config: &BrokerConfig, handler: Arc<BridgeHandler>) -> Self {
        Self::new(config.bridge_port, handler)
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = format!("127.0.0.1:{}", self.port)
            .parse()
            .map_err(|e| BrokerError::Platform(format!("Invalid bridge address: {}", e)))?;
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| BrokerError::Platform(format!("Cannot bind {}: {}", addr, e)))?;
        Ok(listener)
    }

    pub async fn start(self: Arc<Self>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections on `listener` forever
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        self.handler.service().start();
        if let Ok(addr) = listener.local_addr() {
            log::info!("Bridge: running on ws://{}", addr);
        }

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            log::error!("Bridge: connection {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Bridge: error accepting connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let mut peer_origin: Option<String> = None;
        let capture_origin = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            peer_origin = request
                .headers()
                .get("origin")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            Ok(response)
        };
        let ws_stream = accept_hdr_async(stream, capture_origin)
            .await
            .map_err(|e| BrokerError::Platform(format!("Websocket handshake failed: {}", e)))?;
        if let Some(origin) = &peer_origin {
            log::info!("Bridge: connection opened by {}", origin);
        }
        let (mut write, mut read) = ws_stream.split();

        // Requests finish out of order, so replies go through one writer task
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = write.send(message).await {
                    log::error!("Bridge: failed to send frame: {}", e);
                    break;
                }
            }
        });

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match self.handler.route_frame(&text, peer_origin.as_deref()) {
                    Ok(request) => {
                        let handler = Arc::clone(&self.handler);
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let response = handler.handle_request(request).await;
                            send_response(&tx, &response);
                        });
                    }
                    Err(e) => {
                        log::warn!("Bridge: invalid frame: {}", e);
                        send_response(&tx, &BridgeResponse::error(0, &e));
                    }
                },
                Ok(Message::Close(_)) => {
                    break;
                }
                Ok(Message::Ping(data)) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Err(e) => {
                    log::error!("Bridge: websocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        drop(tx);
        writer.abort();
        Ok(())
    }
}

fn send_response(tx: &mpsc::UnboundedSender<Message>, response: &BridgeResponse) {
    match serde_json::to_string(response) {
        Ok(text) => {
            if tx.send(Message::Text(text)).is_err() {
                log::warn!("Bridge: connection closed before reply {} was sent", response.id);
            }
        }
        Err(e) => log::error!("Bridge: failed to serialize reply {}: {}", response.id, e),
    }
}
