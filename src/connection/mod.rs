//! Resolves (topic, partition) to a broker connection and keeps a shared,
//! replaceable cluster snapshot.
//!
//! [`BrokerConnector`] owns the bootstrap broker list, the current
//! [`BrokerTopology`], and a pool of live [`Messenger`] connections keyed by
//! broker id. [`BrokerCache`] is the trait `client::admin::ControllerClient`
//! and `client::partition::PartitionClient` implement over their own cached
//! "current broker" so a shared `maybe_retry` helper can invalidate on stale
//! reads without knowing which cache it is holding.

pub mod sasl;
pub mod transport;

mod topology;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::backoff::BackoffConfig;
use crate::messenger::{Messenger, RequestError};
use crate::protocol::messages::{MetadataRequest, MetadataRequestTopic, MetadataResponse};

pub use sasl::{Credentials, OauthBearerCredentials, SaslConfig};
pub use topology::{Broker, BrokerTopology};
pub use transport::{Dialer, TcpDialer, TlsConfig};
#[cfg(feature = "transport-tls")]
pub use transport::TlsDialer;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("request error: {0}")]
    Request(#[from] RequestError),

    #[error("transport error: {0}")]
    Transport(#[from] transport::Error),

    #[error("no metadata available after exhausting the seed broker list")]
    NoMetadataAvailable,

    #[error("broker {0} is not known to the current cluster topology")]
    UnknownBroker(i32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Alias for the concrete connection type handed out by [`BrokerConnector`],
/// named to match what `client::admin`/`client::partition` cache.
pub type MessengerTransport = Messenger;
pub type BrokerConnection = Arc<MessengerTransport>;

/// A monotonic stamp distinguishing successive "current broker" values held
/// by a [`BrokerCache`] implementor, so a stale concurrent invalidation
/// request (racing a newer, already-refreshed value) is a no-op.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BrokerCacheGeneration(u64);

impl BrokerCacheGeneration {
    pub const START: Self = Self(0);

    pub fn bump(&mut self) {
        self.0 += 1;
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A cached "current broker" that `maybe_retry`-style helpers can refresh
/// and invalidate generically, independent of which logical role (admin
/// controller, partition leader, group coordinator) the broker plays.
#[async_trait]
pub trait BrokerCache: Send + Sync {
    type R: Send + Sync;
    type E;

    async fn get(&self) -> std::result::Result<(Arc<Self::R>, BrokerCacheGeneration), Self::E>;

    async fn invalidate(&self, reason: &'static str, gen: BrokerCacheGeneration);
}

/// Which brokers a metadata refresh should be allowed to contact.
#[derive(Debug, Clone)]
pub enum MetadataLookupMode {
    /// Ask whatever broker answers first from the seed/known-broker list.
    ArbitraryBroker,

    /// Ask a specific broker (used when re-validating a single partition's
    /// leader without disturbing the cached view of the rest of the
    /// cluster).
    SpecificBroker(i32),
}

/// Resolves broker ids to live [`Messenger`] connections and keeps the
/// cluster-wide [`BrokerTopology`] fresh.
pub struct BrokerConnector {
    bootstrap_brokers: Vec<String>,
    client_id: Arc<str>,
    tls_config: TlsConfig,
    socks5_proxy: Option<String>,
    sasl_config: Option<SaslConfig>,
    max_message_size: usize,
    backoff_config: Arc<BackoffConfig>,

    pub topology: BrokerTopology,
    connections: Mutex<std::collections::HashMap<i32, BrokerConnection>>,
    seed_cursor: AtomicUsize,
    /// Serializes concurrent metadata refreshes. A caller that finds the
    /// lock held waits for it, then checks whether `metadata_epoch` moved
    /// while it waited; if so it reuses the snapshot the lock holder just
    /// installed instead of issuing a redundant request.
    metadata_fetch: Mutex<()>,
    last_metadata: Mutex<Option<MetadataResponse>>,
    metadata_epoch: AtomicU64,
}

impl std::fmt::Debug for BrokerConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnector")
            .field("bootstrap_brokers", &self.bootstrap_brokers)
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

impl BrokerConnector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bootstrap_brokers: Vec<String>,
        client_id: Arc<str>,
        tls_config: TlsConfig,
        socks5_proxy: Option<String>,
        sasl_config: Option<SaslConfig>,
        max_message_size: usize,
        backoff_config: Arc<BackoffConfig>,
    ) -> Self {
        Self {
            bootstrap_brokers,
            client_id,
            tls_config,
            socks5_proxy,
            sasl_config,
            max_message_size,
            backoff_config,
            topology: BrokerTopology::default(),
            connections: Mutex::new(std::collections::HashMap::new()),
            seed_cursor: AtomicUsize::new(0),
            metadata_fetch: Mutex::new(()),
            last_metadata: Mutex::new(None),
            metadata_epoch: AtomicU64::new(0),
        }
    }

    fn dialer(&self) -> Box<dyn Dialer> {
        #[cfg(feature = "transport-tls")]
        if self.tls_config.is_some() {
            return Box::new(TlsDialer {
                socks5_proxy: self.socks5_proxy.clone(),
                tls_config: self.tls_config.clone(),
            });
        }
        Box::new(TcpDialer {
            socks5_proxy: self.socks5_proxy.clone(),
        })
    }

    /// Dials and authenticates a fresh connection to `addr`, independent of
    /// any cached pool entry.
    async fn dial(&self, addr: &str) -> Result<BrokerConnection> {
        let dialer = self.dialer();
        let credentials = self.sasl_config.as_ref().map(|c| &c.credentials);
        let messenger = Messenger::connect(
            dialer.as_ref(),
            addr,
            Arc::clone(&self.client_id),
            credentials,
            Some(Duration::from_secs(10)),
        )
        .await?;
        Ok(Arc::new(messenger))
    }

    /// Returns a cached connection to `broker_id`, dialing and caching a new
    /// one if there is no entry or the cached entry's reader task died.
    pub async fn connect(&self, broker_id: i32) -> Result<Option<BrokerConnection>> {
        let mut connections = self.connections.lock().await;
        if let Some(conn) = connections.get(&broker_id) {
            if !conn.is_poisoned() {
                return Ok(Some(Arc::clone(conn)));
            }
            debug!(broker_id, "dropping poisoned connection, redialing");
            connections.remove(&broker_id);
        }

        let Some(broker) = self.topology.get_broker(broker_id).await else {
            return Ok(None);
        };

        let conn = self.dial(&broker.to_string()).await?;
        connections.insert(broker_id, Arc::clone(&conn));
        Ok(Some(conn))
    }

    /// Drops the cached connection for `broker_id`, e.g. after observing a
    /// broken pipe or a stale-controller error.
    pub async fn invalidate_connection(&self, broker_id: i32) {
        self.connections.lock().await.remove(&broker_id);
    }

    /// Forces a metadata refresh and installs the result, regardless of
    /// whether the cached topology looks fresh.
    pub async fn refresh_metadata(&self) -> Result<()> {
        self.request_metadata(&MetadataLookupMode::ArbitraryBroker, Some(vec![]))
            .await?;
        Ok(())
    }

    /// Fetches metadata for `topics` (`None` = all topics), coalescing
    /// concurrent callers onto a single in-flight request so a burst of
    /// `NOT_LEADER`-triggered refreshes only hits the network once.
    pub async fn request_metadata(
        &self,
        mode: &MetadataLookupMode,
        topics: Option<Vec<String>>,
    ) -> Result<(MetadataResponse, BrokerCacheGeneration)> {
        let epoch_before = self.metadata_epoch.load(Ordering::SeqCst);
        let _guard = self.metadata_fetch.lock().await;

        let epoch_now = self.metadata_epoch.load(Ordering::SeqCst);
        if epoch_now != epoch_before {
            // Someone else refreshed while we were waiting for the lock;
            // reuse what they just installed instead of asking again.
            if let Some(response) = self.last_metadata.lock().await.clone() {
                return Ok((response, BrokerCacheGeneration(epoch_now)));
            }
        }

        let response = self.fetch_metadata(mode.clone(), topics).await?;
        self.topology.update(&response.brokers);
        *self.last_metadata.lock().await = Some(response.clone());
        let gen = BrokerCacheGeneration(self.metadata_epoch.fetch_add(1, Ordering::SeqCst) + 1);
        Ok((response, gen))
    }

    async fn fetch_metadata(
        &self,
        mode: MetadataLookupMode,
        topics: Option<Vec<String>>,
    ) -> Result<MetadataResponse> {
        let seeds = self.seed_addresses(&mode);
        if seeds.is_empty() {
            return Err(Error::NoMetadataAvailable);
        }

        let request = MetadataRequest {
            topics: topics.map(|names| {
                names
                    .into_iter()
                    .map(|name| MetadataRequestTopic { name })
                    .collect()
            }),
            allow_auto_topic_creation: Some(false),
        };

        let mut last_err = None;
        for addr in seeds {
            match self.dial(&addr).await {
                Ok(conn) => match conn.request(&request).await {
                    Ok(response) => return Ok(response),
                    Err(err) => {
                        warn!(addr, %err, "metadata request failed, trying next seed");
                        last_err = Some(Error::from(err));
                    }
                },
                Err(err) => {
                    debug!(addr, %err, "failed to dial seed broker");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or(Error::NoMetadataAvailable))
    }

    fn seed_addresses(&self, mode: &MetadataLookupMode) -> Vec<String> {
        match mode {
            MetadataLookupMode::SpecificBroker(id) => self
                .topology
                .get_brokers()
                .into_iter()
                .find(|b| b.id == *id)
                .map(|b| vec![b.to_string()])
                .unwrap_or_default(),
            MetadataLookupMode::ArbitraryBroker => {
                let known: Vec<String> = self
                    .topology
                    .get_brokers()
                    .into_iter()
                    .map(|b| b.to_string())
                    .collect();

                if !known.is_empty() {
                    let start = self.seed_cursor.fetch_add(1, Ordering::Relaxed) % known.len();
                    let mut rotated = known[start..].to_vec();
                    rotated.extend_from_slice(&known[..start]);
                    rotated
                } else {
                    self.bootstrap_brokers.clone()
                }
            }
        }
    }
}
