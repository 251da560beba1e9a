//! Frames requests onto a [`Transport`] and routes responses back to callers.
//!
//! One [`Messenger`] owns one physical connection: a write half guarded by a
//! mutex, a monotonic correlation-id counter, and a single background reader
//! task that demultiplexes length-prefixed frames by correlation id onto
//! waiting [`oneshot`] channels. Everything above this layer (`client::admin`,
//! `client::partition`) only ever sees `Messenger::request`.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, warn};

use crate::connection::sasl::{self, Metadata as SaslMetadata, SaslMechanism};
use crate::connection::transport::{Dialer, Transport};
use crate::protocol::api_key::ApiKey;
use crate::protocol::api_version::{ApiVersion, ApiVersionRange};
use crate::protocol::messages::{
    ApiVersionsRequest, ApiVersionsResponse, ReadVersionedType, RequestBody, RequestHeader,
    ResponseHeader, SaslAuthenticateRequest, SaslHandshakeRequest, WriteVersionedType,
};

/// Read/write deadline applied to every request that does not specify its
/// own (e.g. `Fetch`, which derives a longer one from `max_wait_ms`).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_FRAME_SIZE: i32 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("cannot decode framed message: {0}")]
    Read(#[from] crate::protocol::messages::ReadVersionedError),

    #[error("cannot encode framed message: {0}")]
    Write(#[from] crate::protocol::messages::WriteVersionedError),

    #[error(
        "no version of API {api_key:?} is supported by both ends (client supports {client_range}, broker supports {broker_range})"
    )]
    NoVersionMatch {
        api_key: ApiKey,
        client_range: ApiVersionRange,
        broker_range: ApiVersionRange,
    },

    #[error("received frame of {0} bytes, exceeding the configured maximum")]
    FrameTooLarge(i32),

    #[error("invalid broker address: {0}")]
    InvalidAddress(String),

    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("SASL error: {0}")]
    Sasl(#[from] sasl::Error),

    #[error("connection is poisoned by a prior fatal error")]
    Poisoned,

    #[error("connection closed while request was in flight")]
    Closed,
}

impl RequestError {
    /// Whether this error means the underlying socket/framing is broken and
    /// the connection must be evicted rather than reused -- a plain
    /// `RequestTimeout` is transient and says nothing about the socket, so
    /// it must not poison the connection (the next request may well succeed
    /// on the same `Messenger`).
    fn indicates_dead_socket(&self) -> bool {
        matches!(
            self,
            Self::IO(_) | Self::Read(_) | Self::Write(_) | Self::FrameTooLarge(_) | Self::Closed
        )
    }
}

type Frame = Vec<u8>;
type Waiters = Arc<Mutex<HashMap<i32, oneshot::Sender<Frame>>>>;

/// A single connection to one broker, post version-negotiation (and,
/// optionally, post SASL handshake).
pub struct Messenger {
    write_half: Mutex<WriteHalf<Transport>>,
    correlation_id: AtomicI32,
    waiters: Waiters,
    api_versions: Mutex<HashMap<ApiKey, ApiVersionRange>>,
    client_id: Arc<str>,
    poisoned: AtomicBool,
    reader_task: tokio::task::JoinHandle<()>,
}

impl Drop for Messenger {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("client_id", &self.client_id)
            .field("poisoned", &self.poisoned.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Messenger {
    /// Dials `addr`, negotiates API versions, and optionally runs a SASL
    /// handshake before returning a ready-to-use connection.
    pub async fn connect(
        dialer: &dyn Dialer,
        addr: &str,
        client_id: Arc<str>,
        sasl: Option<&sasl::Credentials>,
        deadline: Option<Duration>,
    ) -> Result<Self, RequestError> {
        let transport = dialer.dial(addr, deadline).await.map_err(std::io::Error::other)?;
        let (read_half, write_half) = tokio::io::split(transport);

        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let reader_task = tokio::spawn(reader_loop(read_half, Arc::clone(&waiters)));

        let messenger = Self {
            write_half: Mutex::new(write_half),
            correlation_id: AtomicI32::new(0),
            waiters,
            api_versions: Mutex::new(HashMap::new()),
            client_id,
            poisoned: AtomicBool::new(false),
            reader_task,
        };

        let negotiated = messenger
            .round_trip_fixed(
                &ApiVersionsRequest {
                    client_software_name: None,
                    client_software_version: None,
                    tagged_fields: None,
                },
                ApiVersion(0),
                ApiVersion(0),
                DEFAULT_TIMEOUT,
            )
            .await?;
        messenger.install_api_versions(negotiated).await;

        if let Some(credentials) = sasl {
            let (host, port) = split_host_port(addr)?;
            messenger
                .sasl_handshake(credentials.as_mechanism(), SaslMetadata { host, port })
                .await?;
        }

        Ok(messenger)
    }

    /// Whether a prior request observed this connection's socket/framing to
    /// be broken. A poisoned `Messenger` must be evicted from the shared
    /// connection pool and redialed, never reused.
    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    async fn install_api_versions(&self, response: ApiVersionsResponse) {
        let mut versions = self.api_versions.lock().await;
        for key in response.api_keys {
            versions.insert(key.api_key, ApiVersionRange::new(key.min_version.0, key.max_version.0));
        }
    }

    async fn sasl_handshake(
        &self,
        mechanism: &dyn SaslMechanism,
        metadata: SaslMetadata,
    ) -> Result<(), RequestError> {
        let handshake_req = SaslHandshakeRequest::new(mechanism.name());
        let handshake_resp = self.request(&handshake_req).await?;
        if let Some(err) = handshake_resp.error_code {
            return Err(RequestError::Sasl(sasl::Error::Rejected(
                mechanism.name().to_string(),
                err.to_string(),
            )));
        }

        let (mut session, mut token) = mechanism.start(&metadata).await?;
        loop {
            let auth_req = SaslAuthenticateRequest::new(token);
            let auth_resp = self.request(&auth_req).await?;
            if let Some(err) = auth_resp.error_code {
                return Err(RequestError::Sasl(sasl::Error::Rejected(
                    mechanism.name().to_string(),
                    auth_resp.error_message.unwrap_or_else(|| err.to_string()),
                )));
            }

            let (done, response_token) = session.next(&auth_resp.auth_bytes).await?;
            if done {
                return Ok(());
            }
            token = response_token;
        }
    }

    /// Issues `request` and returns the decoded response body, negotiating
    /// the wire version from the cached `ApiVersions` exchange.
    pub async fn request<R>(&self, request: &R) -> Result<R::ResponseBody, RequestError>
    where
        R: RequestBody,
        for<'a> R: WriteVersionedType<Cursor<&'a mut Vec<u8>>>,
        R::ResponseBody: ReadVersionedType<Cursor<Vec<u8>>>,
    {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(RequestError::Poisoned);
        }

        let version = self.negotiate_version(R::API_KEY, R::API_VERSION_RANGE).await?;

        let deadline = if R::API_KEY == ApiKey::Fetch {
            DEFAULT_TIMEOUT + Duration::from_secs(30)
        } else {
            DEFAULT_TIMEOUT
        };

        match self.round_trip_fixed(request, version, version, deadline).await {
            Ok(response) => Ok(response),
            Err(err) => {
                if err.indicates_dead_socket() {
                    self.poisoned.store(true, Ordering::SeqCst);
                }
                Err(err)
            }
        }
    }

    async fn negotiate_version(
        &self,
        api_key: ApiKey,
        client_range: ApiVersionRange,
    ) -> Result<ApiVersion, RequestError> {
        let versions = self.api_versions.lock().await;
        let broker_range = match versions.get(&api_key) {
            Some(range) => *range,
            // Broker never advertised this key (e.g. we are negotiating
            // `ApiVersions` itself); fall back to our own minimum.
            None => return Ok(client_range.min()),
        };

        let Some(max) = client_range.intersect(&broker_range) else {
            return Err(RequestError::NoVersionMatch {
                api_key,
                client_range,
                broker_range,
            });
        };
        Ok(max)
    }

    /// Sends `request` at exactly `request_version`/`response_version`
    /// without consulting the negotiated version table. Used for the
    /// bootstrapping `ApiVersions` exchange before any table exists.
    async fn round_trip_fixed<Req>(
        &self,
        request: &Req,
        request_version: ApiVersion,
        response_version: ApiVersion,
        timeout: Duration,
    ) -> Result<Req::ResponseBody, RequestError>
    where
        Req: RequestBody,
        for<'a> Req: WriteVersionedType<Cursor<&'a mut Vec<u8>>>,
        Req::ResponseBody: ReadVersionedType<Cursor<Vec<u8>>>,
    {
        let correlation_id = self.correlation_id.fetch_add(1, Ordering::SeqCst);

        let request_header_version = if request_version >= Req::FIRST_TAGGED_FIELD_IN_REQUEST_VERSION {
            ApiVersion(2)
        } else {
            ApiVersion(1)
        };
        let response_header_version = if response_version >= Req::FIRST_TAGGED_FIELD_IN_RESPONSE_VERSION {
            ApiVersion(1)
        } else {
            ApiVersion(0)
        };

        let header = RequestHeader {
            request_api_key: Req::API_KEY,
            request_api_version: request_version,
            correlation_id,
            client_id: Some(self.client_id.to_string()),
            tagged_fields: None,
        };

        let mut body = Vec::new();
        {
            let mut cursor = Cursor::new(&mut body);
            header.write_versioned(&mut cursor, request_header_version)?;
            request.write_versioned(&mut cursor, request_version)?;
        }

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(correlation_id, tx);

        let write_result = async {
            let mut write_half = self.write_half.lock().await;
            let len = i32::try_from(body.len()).map_err(|_| {
                RequestError::IO(std::io::Error::other("request body too large to frame"))
            })?;
            write_half.write_all(&len.to_be_bytes()).await?;
            write_half.write_all(&body).await?;
            write_half.flush().await?;
            Ok::<_, RequestError>(())
        }
        .await;

        if let Err(err) = write_result {
            self.waiters.lock().await.remove(&correlation_id);
            return Err(err);
        }

        let frame = tokio::time::timeout(timeout, rx)
            .await
            .map_err(|_| RequestError::RequestTimeout(timeout))?
            .map_err(|_| RequestError::Closed)?;

        let mut cursor = Cursor::new(frame);
        let response_header = ResponseHeader::read_versioned(&mut cursor, response_header_version)?;
        debug_assert_eq!(response_header.correlation_id, correlation_id);
        let response = Req::ResponseBody::read_versioned(&mut cursor, response_version)?;
        Ok(response)
    }
}

/// Demultiplexes length-prefixed frames off the wire onto per-correlation-id
/// waiters until the connection is closed or produces a malformed frame.
async fn reader_loop(mut read_half: ReadHalf<Transport>, waiters: Waiters) {
    loop {
        let mut len_buf = [0u8; 4];
        if let Err(err) = read_half.read_exact(&mut len_buf).await {
            debug!(%err, "connection reader exiting");
            break;
        }
        let len = i32::from_be_bytes(len_buf);
        if len < 0 || len > MAX_FRAME_SIZE {
            error!(len, "received out-of-range frame length, closing connection");
            break;
        }

        let mut payload = vec![0u8; len as usize];
        if let Err(err) = read_half.read_exact(&mut payload).await {
            debug!(%err, "connection reader exiting mid-frame");
            break;
        }

        if payload.len() < 4 {
            warn!("frame too short to contain a correlation id");
            break;
        }
        let correlation_id = i32::from_be_bytes(payload[0..4].try_into().unwrap());

        if let Some(tx) = waiters.lock().await.remove(&correlation_id) {
            let _ = tx.send(payload);
        } else {
            warn!(correlation_id, "no waiter for correlation id, dropping frame");
        }
    }

    // Wake every still-pending waiter with a dropped sender so callers
    // observe `RequestError::Closed` instead of hanging forever.
    waiters.lock().await.clear();
}

fn split_host_port(addr: &str) -> Result<(String, u16), RequestError> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| RequestError::InvalidAddress(addr.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| RequestError::InvalidAddress(addr.to_string()))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::connection::transport::TcpDialer;
    use crate::protocol::messages::ApiVersionsResponseApiKey;

    #[test]
    fn split_host_port_parses_host_and_port() {
        assert_eq!(split_host_port("broker-1:9092").unwrap(), ("broker-1".to_string(), 9092));
    }

    #[test]
    fn split_host_port_rejects_missing_port() {
        assert!(matches!(split_host_port("broker-1"), Err(RequestError::InvalidAddress(_))));
    }

    #[test]
    fn split_host_port_rejects_non_numeric_port() {
        assert!(matches!(split_host_port("broker-1:kafka"), Err(RequestError::InvalidAddress(_))));
    }

    #[test]
    fn dead_socket_errors_are_distinguished_from_transient_ones() {
        assert!(RequestError::IO(std::io::Error::other("boom")).indicates_dead_socket());
        assert!(RequestError::Closed.indicates_dead_socket());
        assert!(!RequestError::RequestTimeout(Duration::from_secs(1)).indicates_dead_socket());
        assert!(!RequestError::Poisoned.indicates_dead_socket());
    }

    /// Binds a loopback listener, starts dialing it through the real
    /// `TcpDialer`/`Transport` stack, and returns both the connected
    /// `Transport` and the accepted server-side socket so a test can script
    /// broker behavior on one end and drive `Messenger` on the other.
    async fn fake_broker() -> (Transport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });

        let transport = TcpDialer::default().dial(&addr, None).await.unwrap();
        let server = accept.await.unwrap();
        (transport, server)
    }

    async fn read_request_frame(server: &mut TcpStream) -> (i32, Vec<u8>) {
        let mut len_buf = [0u8; 4];
        server.read_exact(&mut len_buf).await.unwrap();
        let len = i32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        server.read_exact(&mut body).await.unwrap();
        let correlation_id = i32::from_be_bytes(body[4..8].try_into().unwrap());
        (correlation_id, body)
    }

    async fn write_api_versions_response(server: &mut TcpStream, correlation_id: i32) {
        let header = ResponseHeader { correlation_id, tagged_fields: None };
        let response = ApiVersionsResponse {
            error_code: None,
            api_keys: vec![ApiVersionsResponseApiKey {
                api_key: ApiKey::ApiVersions,
                min_version: ApiVersion(0),
                max_version: ApiVersion(3),
                tagged_fields: None,
            }],
            throttle_time_ms: None,
            tagged_fields: None,
        };

        let mut body = Vec::new();
        {
            let mut cursor = Cursor::new(&mut body);
            header.write_versioned(&mut cursor, ApiVersion(0)).unwrap();
            response.write_versioned(&mut cursor, ApiVersion(0)).unwrap();
        }
        let len = i32::try_from(body.len()).unwrap();
        server.write_all(&len.to_be_bytes()).await.unwrap();
        server.write_all(&body).await.unwrap();
        server.flush().await.unwrap();
    }

    #[tokio::test]
    async fn connect_negotiates_api_versions_against_a_fake_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let broker = tokio::spawn(async move {
            let (mut server, _) = listener.accept().await.unwrap();
            let (correlation_id, _) = read_request_frame(&mut server).await;
            write_api_versions_response(&mut server, correlation_id).await;
        });

        let dialer = TcpDialer::default();
        let messenger = Messenger::connect(
            &dialer,
            &addr,
            Arc::from("test-client"),
            None,
            Some(Duration::from_secs(5)),
        )
        .await
        .unwrap();

        assert!(!messenger.is_poisoned());
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn round_trip_fixed_times_out_when_broker_never_responds() {
        let (transport, mut server) = fake_broker().await;
        let (read_half, write_half) = tokio::io::split(transport);

        // Drain the handshake frame so the write side doesn't block, but
        // never answer it.
        tokio::spawn(async move {
            let _ = read_request_frame(&mut server).await;
        });

        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let reader_task = tokio::spawn(reader_loop(read_half, Arc::clone(&waiters)));
        let messenger = Messenger {
            write_half: Mutex::new(write_half),
            correlation_id: AtomicI32::new(0),
            waiters,
            api_versions: Mutex::new(HashMap::new()),
            client_id: Arc::from("test-client"),
            poisoned: AtomicBool::new(false),
            reader_task,
        };

        let result = messenger
            .round_trip_fixed(
                &ApiVersionsRequest {
                    client_software_name: None,
                    client_software_version: None,
                    tagged_fields: None,
                },
                ApiVersion(0),
                ApiVersion(0),
                Duration::from_millis(200),
            )
            .await;

        assert!(matches!(result, Err(RequestError::RequestTimeout(_))));
    }

    #[tokio::test]
    async fn request_short_circuits_once_poisoned() {
        let (transport, _server) = fake_broker().await;
        let (read_half, write_half) = tokio::io::split(transport);

        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let reader_task = tokio::spawn(reader_loop(read_half, Arc::clone(&waiters)));
        let messenger = Messenger {
            write_half: Mutex::new(write_half),
            correlation_id: AtomicI32::new(0),
            waiters,
            api_versions: Mutex::new(HashMap::new()),
            client_id: Arc::from("test-client"),
            poisoned: AtomicBool::new(true),
            reader_task,
        };

        let result = messenger
            .request(&ApiVersionsRequest {
                client_software_name: None,
                client_software_version: None,
                tagged_fields: None,
            })
            .await;

        assert!(matches!(result, Err(RequestError::Poisoned)));
    }
}
