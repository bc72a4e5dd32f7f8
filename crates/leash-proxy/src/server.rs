//! The per-connection request pipeline (spec.md §4.6): connect decision,
//! TLS termination via a minted leaf certificate, header rewrite, secret
//! substitution, and bidirectional streaming, with one `event=http.request`
//! emitted per request in strict per-connection order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body::Body as _;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, HOST};
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use leash_core::Action;
use leash_log::{Event, LoggerHandle};
use leash_secrets::SecretVault;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::ca::CertificateAuthority;
use crate::cert_cache::{CertCache, LeafCert};
use crate::connect;
use crate::detect::{self, ConnectionKind};
use crate::rewrite;
use crate::state::StateReceiver;
use crate::substitute::{self, Encoding};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared, cheaply cloneable handles every connection task needs.
#[derive(Clone)]
pub struct ProxyHandles {
    /// Runtime CA used to mint leaf certificates.
    pub ca: Arc<CertificateAuthority>,
    /// Bounded LRU of previously minted leaf certificates.
    pub certs: Arc<CertCache>,
    /// The secret vault consulted for placeholder substitution.
    pub vault: Arc<SecretVault>,
    /// Structured event sink.
    pub logger: LoggerHandle,
    /// Latest published connect policy and HTTP rewrite rules.
    pub state: StateReceiver,
    /// Trust store used to validate upstream TLS certificates.
    pub roots: Arc<RootCertStore>,
}

impl ProxyHandles {
    /// Build the handles bundle, loading the platform's native trust roots.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the system root store cannot be read.
    pub fn new(
        ca: CertificateAuthority,
        vault: Arc<SecretVault>,
        logger: LoggerHandle,
        state: StateReceiver,
        cert_cache_capacity: usize,
    ) -> std::io::Result<Self> {
        let mut roots = RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs().certs {
            let _ = roots.add(cert);
        }
        Ok(Self {
            ca: Arc::new(ca),
            certs: Arc::new(CertCache::new(cert_cache_capacity)),
            vault,
            logger,
            state,
            roots: Arc::new(roots),
        })
    }
}

/// Bind `addr` and accept connections until the process exits, spawning one
/// task per connection.
///
/// # Errors
///
/// Returns an I/O error if the listener cannot bind.
pub async fn spawn(addr: SocketAddr, handles: ProxyHandles) -> std::io::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    Ok(tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let handles = handles.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve_connection(stream, peer, handles).await {
                            tracing::warn!(error = %err, peer = %peer, "leash-proxy: connection ended with an error");
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "leash-proxy: accept failed");
                }
            }
        }
    }))
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, handles: ProxyHandles) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let Some((host, port)) = read_connect_target(&mut reader).await? else {
        return Ok(());
    };

    let policy = handles.state.borrow().policy.clone();
    let decision = connect::check(&policy, Some(&host), None, port);
    let addr = format!("{host}:{port}");
    let mut stream = reader.into_inner();

    if decision == Action::Deny {
        stream.write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n").await?;
        handles
            .logger
            .emit(Event::new("http.request").field("decision", "denied").field("addr", &addr))
            .await;
        return Ok(());
    }

    stream.write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n").await?;

    let mut prefix = [0u8; 1];
    let peeked = stream.peek(&mut prefix).await?;
    let kind = if peeked == 0 { ConnectionKind::Unknown } else { detect::classify(&prefix) };

    match kind {
        ConnectionKind::Tls => serve_tls(stream, host, port, handles).await,
        _ => serve_plain(stream, host, port, handles).await,
    }
}

#[derive(Clone, Copy)]
enum Upstream {
    Tls,
    Plain,
}

/// Reads a `CONNECT host:port HTTP/1.1` request line plus headers up to the
/// blank line, returning the target. Non-CONNECT opening lines are not
/// supported by this listener (the proxy is reached only via an explicit
/// `CONNECT` tunnel) and cause the connection to be dropped.
async fn read_connect_target(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<(String, u16)>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let authority = parts.next().unwrap_or_default();
    if method != "CONNECT" {
        return Ok(None);
    }

    loop {
        let mut header_line = String::new();
        if reader.read_line(&mut header_line).await? == 0 {
            return Ok(None);
        }
        if header_line == "\r\n" || header_line == "\n" {
            break;
        }
    }

    let (host, port) = authority.rsplit_once(':').unwrap_or((authority, "443"));
    let port: u16 = port.trim().parse().unwrap_or(443);
    Ok(Some((host.to_string(), port)))
}

async fn serve_tls(stream: TcpStream, host: String, port: u16, handles: ProxyHandles) -> std::io::Result<()> {
    let leaf = leaf_for_host(&host, &handles)?;
    let server_config = build_server_config(&leaf)?;
    let acceptor = TlsAcceptor::from(Arc::new(server_config));
    let tls_stream = acceptor.accept(stream).await?;
    serve_http1(tls_stream, host, port, Upstream::Tls, handles).await
}

async fn serve_plain(stream: TcpStream, host: String, port: u16, handles: ProxyHandles) -> std::io::Result<()> {
    serve_http1(stream, host, port, Upstream::Plain, handles).await
}

fn leaf_for_host(host: &str, handles: &ProxyHandles) -> std::io::Result<LeafCert> {
    if let Some(cached) = handles.certs.get(host) {
        return Ok(cached);
    }
    let (cert_pem, key_pem) = handles
        .ca
        .issue_leaf(host)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let leaf = LeafCert { cert_pem, key_pem };
    handles.certs.insert(host, leaf.clone());
    Ok(leaf)
}

fn build_server_config(leaf: &LeafCert) -> std::io::Result<ServerConfig> {
    let certs = rustls_pemfile::certs(&mut leaf.cert_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(std::io::Error::other)?;
    let key = rustls_pemfile::private_key(&mut leaf.key_pem.as_bytes())
        .map_err(std::io::Error::other)?
        .ok_or_else(|| std::io::Error::other("leaf certificate carries no private key"))?;

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(std::io::Error::other)
}

async fn serve_http1<S>(stream: S, host: String, port: u16, upstream: Upstream, handles: ProxyHandles) -> std::io::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
        let host = host.clone();
        let handles = handles.clone();
        async move { Ok::<_, std::convert::Infallible>(handle_request(req, host, port, upstream, handles).await) }
    });

    hyper::server::conn::http1::Builder::new()
        .serve_connection(io, service)
        .await
        .map_err(std::io::Error::other)
}

async fn handle_request(req: Request<Incoming>, host: String, port: u16, upstream: Upstream, handles: ProxyHandles) -> Response<BoxBody> {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path_and_query().map(ToString::to_string).unwrap_or_default();

    let state = handles.state.borrow().clone();
    let vault = handles.vault.clone();

    let (mut parts, body) = req.into_parts();
    rewrite::apply(&state.http_rewrites, &host, &mut parts.headers);

    let placeholders = vault.placeholders();
    let path = substitute_text(&path, &placeholders, &vault);
    parts.uri = path.parse::<Uri>().unwrap_or(parts.uri);
    for value in parts.headers.values_mut() {
        if let Ok(text) = value.to_str() {
            let rewritten = substitute_text(text, &placeholders, &vault);
            if rewritten != text {
                if let Ok(header_value) = HeaderValue::from_str(&rewritten) {
                    *value = header_value;
                }
            }
        }
    }

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return error_response(StatusCode::BAD_GATEWAY, &format!("failed to read request body: {err}")),
    };
    let encoding = parts
        .headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map_or(Encoding::Identity, Encoding::from_header);
    let substituted = substitute::substitute_body(&vault, &body_bytes, encoding);
    if substituted.len() != body_bytes.len() {
        parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(substituted.len()));
    }
    if let Some(host_header) = HeaderValue::from_str(&host).ok() {
        parts.headers.insert(HOST, host_header);
    }

    let upstream_req = Request::from_parts(parts, Full::new(Bytes::from(substituted)));
    let bytes_in = body_bytes.len() as u64;

    let outcome = forward(upstream_req, &host, port, upstream, &handles.roots).await;

    let (status, bytes_out) = match &outcome {
        Ok(resp) => (resp.status().as_u16(), resp.body().size_hint().lower()),
        Err(_) => (502, 0),
    };
    handles
        .logger
        .emit(
            Event::new("http.request")
                .field("method", &method)
                .field("host", &host)
                .field("path", &path)
                .field("status", status)
                .field("decision", "allowed")
                .field("bytes_in", bytes_in)
                .field("bytes_out", bytes_out)
                .field("latency_ms", start.elapsed().as_millis() as u64),
        )
        .await;

    match outcome {
        Ok(resp) => resp,
        Err(err) => error_response(StatusCode::BAD_GATEWAY, &err),
    }
}

fn substitute_text(text: &str, placeholders: &[(String, String)], _vault: &SecretVault) -> String {
    let mut rewritten = text.to_string();
    for (placeholder, value) in placeholders {
        if rewritten.contains(placeholder.as_str()) {
            rewritten = rewritten.replace(placeholder.as_str(), value);
            _vault.inc_activations_by_placeholder(placeholder);
        }
    }
    rewritten
}

async fn forward(
    req: Request<Full<Bytes>>,
    host: &str,
    port: u16,
    upstream: Upstream,
    roots: &Arc<RootCertStore>,
) -> Result<Response<BoxBody>, String> {
    let addr = format!("{host}:{port}");
    let tcp = TcpStream::connect(&addr).await.map_err(|e| e.to_string())?;

    match upstream {
        Upstream::Tls => {
            let client_config = ClientConfig::builder().with_root_certificates(roots.as_ref().clone()).with_no_client_auth();
            let connector = TlsConnector::from(Arc::new(client_config));
            let server_name = ServerName::try_from(host.to_string()).map_err(|e| e.to_string())?;
            let tls_stream = connector.connect(server_name, tcp).await.map_err(|e| e.to_string())?;
            send_over(TokioIo::new(tls_stream), req).await
        }
        Upstream::Plain => send_over(TokioIo::new(tcp), req).await,
    }
}

async fn send_over<I>(io: I, req: Request<Full<Bytes>>) -> Result<Response<BoxBody>, String>
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await.map_err(|e| e.to_string())?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            tracing::debug!(error = %err, "leash-proxy: upstream connection closed");
        }
    });

    let resp = sender.send_request(req).await.map_err(|e| e.to_string())?;
    let (parts, body) = resp.into_parts();
    let collected = body.collect().await.map_err(|e| e.to_string())?.to_bytes();
    let boxed = Full::new(collected).map_err(|never| match never {}).boxed();
    Ok(Response::from_parts(parts, boxed))
}

fn error_response(status: StatusCode, message: &str) -> Response<BoxBody> {
    let body = Full::new(Bytes::from(message.to_string())).map_err(|never| match never {}).boxed();
    Response::builder().status(status).body(body).unwrap_or_else(|_| {
        let mut resp = Response::new(Full::new(Bytes::new()).map_err(|never| match never {}).boxed());
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        resp
    })
}
