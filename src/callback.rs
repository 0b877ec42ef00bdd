// ABOUTME: Loopback HTTP listener for the Pocket authorization redirect
// ABOUTME: Serves on its own thread and signals the waiting flow exactly once

use crate::{Error, Result};
use rand::{distributions::Alphanumeric, Rng};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_BYTES: usize = 8192;
const NONCE_LEN: usize = 32;

const AUTHORIZED_BODY: &str = "Authorized. You can close this tab and return to your terminal.\n";
const WAITING_BODY: &str = "Waiting for Pocket authorization.\n";

/// What an inbound request means to the waiting flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    /// Browser noise such as favicon probes; answered 404.
    Noise,
    /// The redirect we are waiting for.
    Authorized,
    /// Anything else; answered 400 and ignored.
    Unexpected,
}

/// Classifies a request target (`/path?query`) against the run's nonce.
pub fn classify(target: &str, nonce: &str) -> Callback {
    let parsed = match Url::parse("http://localhost").and_then(|base| base.join(target)) {
        Ok(url) => url,
        Err(_) => return Callback::Unexpected,
    };

    let path = parsed.path();
    let file = path.rsplit('/').next().unwrap_or_default();
    if file == "favicon.ico" || (file.starts_with("apple-touch-icon") && file.ends_with(".png")) {
        return Callback::Noise;
    }

    let carries_nonce = parsed
        .query_pairs()
        .any(|(key, value)| key == "state" && value == nonce);

    if carries_nonce {
        Callback::Authorized
    } else {
        Callback::Unexpected
    }
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// Ephemeral loopback endpoint owned by one acquisition attempt.
///
/// The socket is released by `stop()` or, failing that, on drop.
pub struct CallbackListener {
    addr: SocketAddr,
    nonce: String,
    signal: Receiver<()>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Binds an ephemeral port on 127.0.0.1 and starts serving.
    pub fn start() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .map_err(|e| Error::Auth(format!("Failed to bind callback listener: {}", e)))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let nonce = generate_nonce();
        let (tx, rx) = mpsc::sync_channel(1);
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = thread::Builder::new().name("pocket-callback".into()).spawn({
            let nonce = nonce.clone();
            let shutdown = Arc::clone(&shutdown);
            move || serve(listener, &nonce, tx, &shutdown)
        })?;

        info!("Listening for Pocket callback on {}", addr);

        Ok(CallbackListener {
            addr,
            nonce,
            signal: rx,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Callback target handed to Pocket as `redirect_uri`.
    pub fn address_url(&self) -> String {
        format!("http://{}/?state={}", self.addr, self.nonce)
    }

    /// Blocks until the authorization redirect arrives or `timeout` passes.
    pub fn await_signal(&self, timeout: Duration) -> Result<()> {
        match self.signal.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Auth(
                "Callback listener stopped before authorization arrived".into(),
            )),
        }
    }

    /// Stops serving and releases the port. Safe to call more than once.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Callback listener thread panicked");
            }
            debug!("Callback listener on {} stopped", self.addr);
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(listener: TcpListener, nonce: &str, signal: SyncSender<()>, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("Callback connection from {}", peer);
                match handle_connection(stream, nonce) {
                    Ok(Callback::Authorized) => {
                        // Single slot; the flow only ever waits once
                        let _ = signal.try_send(());
                        return;
                    }
                    Ok(other) => debug!("Ignored callback request ({:?})", other),
                    Err(e) => warn!("Callback connection failed: {}", e),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                error!("Callback listener accept failed: {}", e);
                return;
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, nonce: &str) -> std::io::Result<Callback> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let request = read_request_head(&mut stream)?;
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default();

    let outcome = classify(target, nonce);
    let response = match outcome {
        Callback::Noise => response("404 Not Found", "Not Found\n"),
        Callback::Authorized => response("200 OK", AUTHORIZED_BODY),
        Callback::Unexpected => response("400 Bad Request", WAITING_BODY),
    };
    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok(outcome)
}

fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}
