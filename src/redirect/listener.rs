//! redirect::listener
//!
//! Loopback HTTP listener that answers the provider's browser redirect.
//!
//! Only the request line is read. The request target is handed to the
//! [`UriHandler`] and the browser gets a short HTML page back:
//!
//! - `200` when a waiting sign-in received the redirect
//! - `404` when nobody was waiting (the attempt timed out or never started)
//! - `400` for anything that is not a parseable `GET`
//!
//! A connection that sends no complete request head within
//! [`READ_TIMEOUT`] is closed without a reply.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{RedirectError, UriHandler};

const MAX_REQUEST_BYTES: usize = 8192;

/// How long a connection may take to send its request head.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

const SIGNED_IN_PAGE: &str = "<!DOCTYPE html><html><head><title>Docs sign-in</title></head>\
<body><h1>Signed in</h1><p>You can close this window and return to your editor.</p></body></html>";

const NOT_WAITING_PAGE: &str = "<!DOCTYPE html><html><head><title>Docs sign-in</title></head>\
<body><h1>Sign-in expired</h1><p>No sign-in is waiting for this redirect. Start sign-in again.</p></body></html>";

const BAD_REQUEST_PAGE: &str = "<!DOCTYPE html><html><head><title>Docs sign-in</title></head>\
<body><h1>Bad request</h1></body></html>";

/// A running loopback listener. The accept loop stops when this is dropped.
pub struct RedirectListener {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl RedirectListener {
    /// Bind `127.0.0.1:port` (0 for an ephemeral port) and start serving.
    pub async fn bind(port: u16, hub: UriHandler) -> Result<Self, RedirectError> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port)))
            .await
            .map_err(|e| RedirectError::Listener(format!("bind 127.0.0.1:{}: {}", port, e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| RedirectError::Listener(e.to_string()))?;

        tracing::info!(%addr, "redirect listener started");

        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "redirect connection accepted");
                        let hub = hub.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve(stream, &hub, READ_TIMEOUT).await {
                                tracing::warn!(error = %e, "redirect connection failed");
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "redirect accept failed"),
                }
            }
        });

        Ok(Self { addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Origin to use as the provider's redirect target.
    pub fn callback_base(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for RedirectListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for RedirectListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectListener")
            .field("addr", &self.addr)
            .finish()
    }
}

async fn serve(
    mut stream: TcpStream,
    hub: &UriHandler,
    read_timeout: Duration,
) -> std::io::Result<()> {
    let request = match timeout(read_timeout, read_head(&mut stream)).await {
        Ok(head) => head?,
        Err(_) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "no request head before the read deadline",
            ))
        }
    };

    let response = match request_target(&request) {
        Some(target) => match hub.handle_uri(target) {
            Ok(0) => response(404, "Not Found", NOT_WAITING_PAGE),
            Ok(_) => response(200, "OK", SIGNED_IN_PAGE),
            Err(e) => {
                tracing::debug!(error = %e, "rejected redirect target");
                response(400, "Bad Request", BAD_REQUEST_PAGE)
            }
        },
        None => response(400, "Bad Request", BAD_REQUEST_PAGE),
    };

    stream.write_all(response.as_bytes()).await?;
    stream.flush().await
}

/// Read until the end of the request head (or the size cap).
async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Extract the target of a `GET` request line.
fn request_target(request: &str) -> Option<&str> {
    let mut parts = request.lines().next()?.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Some(target),
        _ => None,
    }
}

fn response(status: u16, reason: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let request = format!("GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", target, addr);
        stream.write_all(request.as_bytes()).await.expect("write");
        let mut out = String::new();
        stream.read_to_string(&mut out).await.expect("read");
        out
    }

    #[test]
    fn request_target_requires_get() {
        assert_eq!(
            request_target("GET /github-authenticate?id=1 HTTP/1.1\r\n"),
            Some("/github-authenticate?id=1")
        );
        assert_eq!(request_target("POST / HTTP/1.1\r\n"), None);
        assert_eq!(request_target(""), None);
    }

    #[tokio::test]
    async fn forwards_redirect_to_waiting_sign_in() {
        let hub = UriHandler::new();
        let listener = RedirectListener::bind(0, hub.clone()).await.expect("bind");
        let mut sub = hub.subscribe("/github-authenticate");

        let reply = get(
            listener.local_addr(),
            "/github-authenticate?id=1&name=octo&X-OP-BuildUserToken=t",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 200 OK"));

        let payload = sub.recv().await.expect("payload");
        assert_eq!(payload.get("name"), Some("octo"));
    }

    #[tokio::test]
    async fn idle_connection_is_dropped_after_read_deadline() {
        let server = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = server.local_addr().expect("addr");
        let _idle = TcpStream::connect(addr).await.expect("connect");
        let (stream, _) = server.accept().await.expect("accept");

        let served = tokio::time::timeout(
            Duration::from_secs(5),
            serve(stream, &UriHandler::new(), Duration::from_millis(50)),
        )
        .await
        .expect("serve returns once the deadline passes");

        let err = served.expect_err("idle connection is not answered");
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn unexpected_redirect_gets_404() {
        let hub = UriHandler::new();
        let listener = RedirectListener::bind(0, hub).await.expect("bind");

        let reply = get(listener.local_addr(), "/azure-devops-authenticate?id=1").await;
        assert!(reply.starts_with("HTTP/1.1 404"));
        assert!(listener.callback_base().starts_with("http://127.0.0.1:"));
    }
}
