//! WebSocket hub for pushing full-reload notifications to connected
//! browsers.
//!
//! Dev-rendered pages get a small client script injected that connects
//! back here; a template edit broadcasts one message and every client
//! reloads.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    net::{IpAddr, SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    thread,
};
use tungstenite::{Message, WebSocket};

pub struct ReloadHub {
    clients: Mutex<Vec<WebSocket<TcpStream>>>,
    port: u16,
}

impl ReloadHub {
    /// Bind the reload endpoint and start accepting connections on a
    /// background thread. Pass port 0 for an ephemeral port.
    pub fn start(interface: IpAddr, port: u16) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(SocketAddr::new(interface, port))
            .with_context(|| format!("Failed to bind reload endpoint on port {port}"))?;
        let port = listener.local_addr()?.port();

        let hub = Arc::new(Self {
            clients: Mutex::new(Vec::new()),
            port,
        });

        let accept_hub = Arc::clone(&hub);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                if let Ok(socket) = tungstenite::accept(stream) {
                    accept_hub.clients.lock().push(socket);
                }
            }
        });

        Ok(hub)
    }

    /// Tell every connected client to reload. Dead connections are
    /// dropped.
    pub fn broadcast_reload(&self) {
        self.clients
            .lock()
            .retain_mut(|socket| socket.send(Message::text("reload")).is_ok());
    }

    /// Client snippet injected into dev-rendered HTML.
    pub fn client_script(&self) -> String {
        format!(
            r#"<script>new WebSocket("ws://" + location.hostname + ":{}").onmessage = () => location.reload();</script>"#,
            self.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_client_script_embeds_port() {
        let hub = ReloadHub::start("127.0.0.1".parse().unwrap(), 0).unwrap();
        let script = hub.client_script();
        assert!(script.contains(&format!(":{}\")", hub.port)));
        assert!(script.contains("location.reload()"));
    }

    #[test]
    fn test_broadcast_reaches_connected_client() {
        let hub = ReloadHub::start("127.0.0.1".parse().unwrap(), 0).unwrap();

        let (mut client, _) =
            tungstenite::connect(format!("ws://127.0.0.1:{}", hub.port)).unwrap();

        // Give the accept thread a moment to register the connection.
        thread::sleep(Duration::from_millis(200));
        hub.broadcast_reload();

        let message = client.read().unwrap();
        assert_eq!(message.to_text().unwrap(), "reload");
    }
}
