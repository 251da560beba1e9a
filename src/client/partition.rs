//! Single-partition leader client, and the higher-level streaming [`Reader`]
//! built on top of it.
//!
//! [`PartitionClient`] issues one Fetch/ListOffsets call at a time against
//! the partition's current leader, caching the connection behind
//! [`BrokerCache`] the same way `client::admin::ControllerClient` caches the
//! controller -- both drive their requests through a `maybe_retry` helper
//! that invalidates the cache on a stale-leader response, though each module
//! keeps its own copy since the two caches react to different broker errors
//! (`NOT_CONTROLLER` vs. `NOT_LEADER_OR_FOLLOWER`).
//!
//! [`Reader`] layers the streaming consumer described for the partition
//! fetch loop on top: a background task owns the (offset, lag, version)
//! state and pushes `(epoch, item)` pairs onto a bounded queue, so a
//! `set_offset` call can start a fresh epoch and have the reading side
//! silently drop whatever the cancelled epoch still has in flight.

use std::ops::{ControlFlow, Range};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, BackoffConfig, BackoffError, ErrorOrThrottle};
use crate::client::error::{Error, RequestContext, Result};
use crate::connection::{
    BrokerCache, BrokerCacheGeneration, BrokerConnection, BrokerConnector, MessengerTransport,
    MetadataLookupMode,
};
use crate::messenger::RequestError;
use crate::protocol::error::Error as ProtocolError;
use crate::protocol::messages::{
    FetchRequest, FetchRequestPartition, FetchRequestTopic, IsolationLevel, ListOffsetsRequest,
    ListOffsetsRequestPartition, ListOffsetsRequestTopic,
};
use crate::protocol::record::{ControlBatchOrRecords, Record};
use crate::throttle::maybe_throttle;
use crate::validation::ExactlyOne;

/// Seek to the partition's current earliest retained offset.
pub const FIRST: i64 = -1;
/// Seek to the partition's current high watermark.
pub const LAST: i64 = -2;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_MAX_BYTES: i32 = 1_000_000;
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);
pub const DEFAULT_MIN_BYTES: i32 = DEFAULT_MAX_BYTES;

/// The first few initialization/fetch failures after a fresh epoch start are
/// logged but not surfaced to the user, to ride out transient startup races
/// (e.g. dialing a leader before it has finished handling the last election).
const INIT_FAILURE_LOG_THRESHOLD: u32 = 3;

/// Controls how [`crate::client::Client::partition_client`] reacts when the
/// cluster's metadata does not (yet) know about the requested topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownTopicHandling {
    /// Fail construction immediately.
    Error,
    /// Wait, with backoff, for a metadata refresh to learn about the topic.
    Retry,
}

/// Where [`PartitionClient::get_offset`] should seek to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetAt {
    Earliest,
    Latest,
    Timestamp(i64),
}

impl OffsetAt {
    fn as_timestamp(self) -> i64 {
        match self {
            // KIP-79 sentinel timestamps.
            Self::Earliest => -2,
            Self::Latest => -1,
            Self::Timestamp(ts) => ts,
        }
    }
}

/// A decoded record plus the absolute offset it was fetched at.
#[derive(Debug, Clone)]
pub struct RecordAndOffset {
    pub record: Record,
    pub offset: i64,
}

/// A request/response client bound to one partition's current leader.
///
/// Construction resolves the partition's leader at least once, so a
/// successfully built `PartitionClient` is immediately usable.
#[derive(Debug)]
pub struct PartitionClient {
    brokers: Arc<BrokerConnector>,
    topic: String,
    partition: i32,
    backoff_config: Arc<BackoffConfig>,
    current_broker: Mutex<(Option<(i32, BrokerConnection)>, BrokerCacheGeneration)>,
}

impl PartitionClient {
    pub(super) async fn new(
        topic: String,
        partition: i32,
        brokers: Arc<BrokerConnector>,
        unknown_topic_handling: UnknownTopicHandling,
        backoff_config: Arc<BackoffConfig>,
    ) -> Result<Self> {
        if topic.is_empty() {
            return Err(Error::InvalidResponse(
                "topic name must not be empty".to_owned(),
            ));
        }
        if partition < 0 {
            return Err(Error::InvalidResponse(format!(
                "partition {partition} out of range"
            )));
        }

        let client = Self {
            brokers,
            topic,
            partition,
            backoff_config,
            current_broker: Mutex::new((None, BrokerCacheGeneration::START)),
        };

        let outcome = {
            let mut backoff = Backoff::new(&client.backoff_config);
            backoff
                .retry_with_backoff("partition_client_init", || async {
                    match client.leader_id().await {
                        Ok(Some(_)) => ControlFlow::Break(Ok(())),
                        Ok(None) if unknown_topic_handling == UnknownTopicHandling::Error => {
                            ControlFlow::Break(Err(Error::InvalidResponse(format!(
                                "unknown topic/partition {}-{}",
                                client.topic, client.partition
                            ))))
                        }
                        Ok(None) => ControlFlow::Continue(ErrorOrThrottle::Error(
                            Error::InvalidResponse(format!(
                                "topic/partition {}-{} not yet visible in cluster metadata",
                                client.topic, client.partition
                            )),
                        )),
                        Err(e) if !e.is_retriable() => ControlFlow::Break(Err(e)),
                        Err(e) => ControlFlow::Continue(ErrorOrThrottle::Error(e)),
                    }
                })
                .await
        };

        match outcome {
            Ok(inner) => inner?,
            Err(e) => {
                return Err(Error::RetryFailed(BackoffError {
                    total: e.total,
                    deadline: e.deadline,
                    source: e.source.map(Box::new),
                }));
            }
        }

        Ok(client)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Looks up the current earliest/latest/at-timestamp offset for this
    /// partition.
    pub async fn get_offset(&self, at: OffsetAt) -> Result<i64> {
        let request = &ListOffsetsRequest {
            replica_id: -1,
            isolation_level: Some(IsolationLevel::ReadCommitted),
            topics: vec![ListOffsetsRequestTopic {
                name: self.topic.clone(),
                partitions: vec![ListOffsetsRequestPartition {
                    partition_index: self.partition,
                    timestamp: at.as_timestamp(),
                    max_num_offsets: None,
                }],
            }],
        };

        maybe_retry(&self.backoff_config, self, "list_offsets", || async move {
            let (broker, gen) = self
                .get()
                .await
                .map_err(|e| ErrorOrThrottle::Error((e, None)))?;
            let response = broker
                .request(request)
                .await
                .map_err(|e| ErrorOrThrottle::Error((e.into(), Some(gen))))?;

            maybe_throttle(response.throttle_time_ms)?;

            let topic = response.topics.exactly_one().map_err(|e| {
                ErrorOrThrottle::Error((
                    Error::exactly_one(RequestContext::Topic(self.topic.clone()), e),
                    Some(gen),
                ))
            })?;
            let partition = topic.partitions.exactly_one().map_err(|e| {
                ErrorOrThrottle::Error((
                    Error::exactly_one(
                        RequestContext::Partition(self.topic.clone(), self.partition),
                        e,
                    ),
                    Some(gen),
                ))
            })?;

            if let Some(protocol_error) = partition.error_code {
                return Err(ErrorOrThrottle::Error((
                    Error::ServerError {
                        protocol_error,
                        error_message: None,
                        request: RequestContext::Partition(self.topic.clone(), self.partition),
                        is_virtual: false,
                    },
                    Some(gen),
                )));
            }

            partition
                .offset
                .or_else(|| partition.old_style_offsets.as_ref().and_then(|o| o.first().copied()))
                .ok_or_else(|| {
                    ErrorOrThrottle::Error((
                        Error::InvalidResponse(
                            "list offsets response carried no offset".to_owned(),
                        ),
                        Some(gen),
                    ))
                })
        })
        .await
    }

    /// Fetches whatever records are available starting at `offset`, waiting
    /// up to `max_wait_ms` for at least `bytes.start` bytes (or returning
    /// early once `bytes.end` is reached).
    pub async fn fetch_records(
        &self,
        offset: i64,
        bytes: Range<i32>,
        max_wait_ms: i32,
    ) -> Result<(Vec<RecordAndOffset>, i64)> {
        let request = &FetchRequest {
            replica_id: -1,
            max_wait_ms,
            min_bytes: bytes.start,
            max_bytes: Some(bytes.end),
            isolation_level: Some(IsolationLevel::ReadCommitted),
            topics: vec![FetchRequestTopic {
                topic: self.topic.clone(),
                partitions: vec![FetchRequestPartition {
                    partition: self.partition,
                    fetch_offset: offset,
                    partition_max_bytes: bytes.end,
                }],
            }],
        };

        maybe_retry(&self.backoff_config, self, "fetch", || async move {
            let (broker, gen) = self
                .get()
                .await
                .map_err(|e| ErrorOrThrottle::Error((e, None)))?;
            let response = broker
                .request(request)
                .await
                .map_err(|e| ErrorOrThrottle::Error((e.into(), Some(gen))))?;

            maybe_throttle(response.throttle_time_ms)?;

            let topic = response.responses.exactly_one().map_err(|e| {
                ErrorOrThrottle::Error((
                    Error::exactly_one(RequestContext::Topic(self.topic.clone()), e),
                    Some(gen),
                ))
            })?;
            let partition = topic.partitions.exactly_one().map_err(|e| {
                ErrorOrThrottle::Error((
                    Error::exactly_one(
                        RequestContext::Partition(self.topic.clone(), self.partition),
                        e,
                    ),
                    Some(gen),
                ))
            })?;

            if let Some(protocol_error) = partition.error_code {
                return Err(ErrorOrThrottle::Error((
                    Error::ServerError {
                        protocol_error,
                        error_message: None,
                        request: RequestContext::Partition(self.topic.clone(), self.partition),
                        is_virtual: false,
                    },
                    Some(gen),
                )));
            }

            let mut records = Vec::new();
            for batch in partition.records.0 {
                if let ControlBatchOrRecords::Records(batch_records) = batch.records {
                    records.extend(
                        batch_records
                            .into_iter()
                            .map(|record| RecordAndOffset { offset: record.offset, record }),
                    );
                }
            }

            Ok((records, partition.high_watermark))
        })
        .await
    }

    /// Resolves the partition's current leader broker id, or `None` if the
    /// topic/partition does not (yet) exist.
    async fn leader_id(&self) -> Result<Option<i32>> {
        let (metadata, _gen) = self
            .brokers
            .request_metadata(
                &MetadataLookupMode::ArbitraryBroker,
                Some(vec![self.topic.clone()]),
            )
            .await?;

        let Some(topic) = metadata.topics.into_iter().find(|t| t.name == self.topic) else {
            return Ok(None);
        };

        if let Some(protocol_error) = topic.error {
            if protocol_error == ProtocolError::UnknownTopicOrPartition {
                return Ok(None);
            }
            return Err(Error::ServerError {
                protocol_error,
                error_message: None,
                request: RequestContext::Topic(self.topic.clone()),
                is_virtual: false,
            });
        }

        Ok(topic
            .partitions
            .into_iter()
            .find(|p| p.partition_index == self.partition)
            .map(|p| p.leader_id))
    }
}

/// Caches the partition's current leader broker.
#[async_trait]
impl BrokerCache for &PartitionClient {
    type R = MessengerTransport;
    type E = Error;

    async fn get(&self) -> Result<(Arc<Self::R>, BrokerCacheGeneration)> {
        let mut current = self.current_broker.lock().await;
        if let Some((_, broker)) = &current.0 {
            return Ok((Arc::clone(broker), current.1));
        }

        let leader_id = self.leader_id().await?.ok_or_else(|| {
            Error::InvalidResponse(format!(
                "topic/partition {}-{} no longer present in cluster metadata",
                self.topic, self.partition
            ))
        })?;

        info!(topic = %self.topic, partition = self.partition, leader_id, "connecting to partition leader");
        let broker = self.brokers.connect(leader_id).await?.ok_or_else(|| {
            Error::InvalidResponse(format!("leader {leader_id} not found in metadata response"))
        })?;

        current.0 = Some((leader_id, Arc::clone(&broker)));
        current.1.bump();

        Ok((broker, current.1))
    }

    async fn invalidate(&self, reason: &'static str, gen: BrokerCacheGeneration) {
        let mut guard = self.current_broker.lock().await;

        if guard.1 != gen {
            debug!(
                reason,
                current_gen = guard.1.get(),
                request_gen = gen.get(),
                "stale invalidation request for partition leader cache",
            );
            return;
        }

        info!(reason, topic = %self.topic, partition = self.partition, "invalidating cached partition leader");
        if let Some((broker_id, _)) = guard.0.take() {
            self.brokers.invalidate_connection(broker_id).await;
        }
    }
}

/// Drives `f` with backoff, invalidating the cached leader connection on a
/// broken pipe or a retriable coded error (stale leader, unknown topic
/// during a partition reassignment, a timed-out request) and giving up on
/// anything else.
///
/// `pub(super)` so `client::producer::Writer` can drive its produce round
/// trip through the same cached-leader/invalidate-on-retry policy as
/// `PartitionClient` without duplicating it.
pub(super) async fn maybe_retry<B, R, F, T>(
    backoff_config: &BackoffConfig,
    broker_cache: B,
    request_name: &str,
    f: R,
) -> Result<T>
where
    B: BrokerCache,
    R: (Fn() -> F) + Send + Sync,
    F: std::future::Future<Output = Result<T, ErrorOrThrottle<(Error, Option<BrokerCacheGeneration>)>>>
        + Send,
{
    let mut backoff = Backoff::new(backoff_config);

    backoff
        .retry_with_backoff(request_name, || async {
            let (error, cache_gen) = match f().await {
                Ok(v) => return ControlFlow::Break(Ok(v)),
                Err(ErrorOrThrottle::Throttle(t)) => {
                    return ControlFlow::Continue(ErrorOrThrottle::Throttle(t));
                }
                Err(ErrorOrThrottle::Error(e)) => e,
            };

            let should_invalidate = match &error {
                Error::Request(RequestError::Poisoned | RequestError::IO(_))
                | Error::Connection(_) => true,
                Error::ServerError { protocol_error, .. } if protocol_error.is_retriable() => true,
                _ => false,
            };

            if !should_invalidate {
                error!(e=%error, request_name, "request encountered fatal error");
                return ControlFlow::Break(Err(error));
            }

            if let Some(cache_gen) = cache_gen {
                broker_cache
                    .invalidate("partition client: retriable error", cache_gen)
                    .await;
            }
            ControlFlow::Continue(ErrorOrThrottle::Error(error))
        })
        .await
        .map_err(|e| {
            Error::RetryFailed(BackoffError {
                total: e.total,
                deadline: e.deadline,
                source: e.source.map(Box::new),
            })
        })?
}

/// A cancellation signal that survives a missed wakeup: `cancelled()` checks
/// the flag before awaiting the notification, so a `cancel()` that fires in
/// the narrow gap between two `select!` polls is still observed the next
/// time anything calls `cancelled()`, instead of being lost to a plain
/// `Notify` with no persisted state.
struct Cancel {
    flag: AtomicBool,
    notify: Notify,
}

impl Cancel {
    fn new() -> Arc<Self> {
        Arc::new(Self { flag: AtomicBool::new(false), notify: Notify::new() })
    }

    fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn cancelled(&self) {
        if self.flag.load(Ordering::SeqCst) {
            return;
        }
        self.notify.notified().await;
    }
}

/// One item delivered through a [`Reader`]'s queue, tagged with the fetch
/// epoch that produced it so a concurrent `set_offset` can discard it.
#[derive(Debug)]
struct QueueItem {
    version: u64,
    item: FetchItem,
}

#[derive(Debug)]
enum FetchItem {
    Record { record_and_offset: RecordAndOffset, high_watermark: i64 },
    Error(Error),
}

/// Tuning knobs for a [`Reader`], mirroring `configure(...)` in the
/// partition consumer contract.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub client: Arc<PartitionClient>,
    /// `FIRST`, `LAST`, or an absolute offset.
    pub start_offset: i64,
    pub min_bytes: i32,
    pub max_bytes: i32,
    pub max_wait: Duration,
    pub queue_capacity: usize,
}

impl ReaderConfig {
    pub fn new(client: Arc<PartitionClient>) -> Self {
        Self {
            client,
            start_offset: LAST,
            min_bytes: DEFAULT_MIN_BYTES,
            max_bytes: DEFAULT_MAX_BYTES,
            max_wait: DEFAULT_MAX_WAIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn start_offset(mut self, offset: i64) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn bytes(mut self, min_bytes: i32, max_bytes: i32) -> Self {
        self.min_bytes = min_bytes;
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }
}

/// An error observed while reading; distinguishes a deliberate [`Reader::close`]
/// from every other failure so callers can tell "done" from "broken".
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReadError {
    #[error("reader is closed")]
    Closed,

    #[error("timed out waiting for a record")]
    Timeout,

    #[error(transparent)]
    Client(#[from] Error),
}

/// A streaming consumer for one partition, built on top of [`PartitionClient`].
///
/// Runs a background fetch loop that owns the (offset, lag, version) state
/// and streams decoded records onto a bounded queue. `set_offset` starts a
/// fresh epoch: the previous loop is cancelled, and `read_message` drops
/// whatever that cancelled epoch still has in flight rather than delivering
/// it, so a seek never races a stale record onto the stream.
pub struct Reader {
    client: Arc<PartitionClient>,
    min_bytes: i32,
    max_bytes: i32,
    max_wait: Duration,
    rx: Mutex<mpsc::Receiver<QueueItem>>,
    tx: mpsc::Sender<QueueItem>,
    version: Arc<AtomicU64>,
    offset: Arc<AtomicI64>,
    high_watermark: Arc<AtomicI64>,
    closed: Arc<AtomicBool>,
    cancel: Mutex<Arc<Cancel>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("topic", &self.client.topic())
            .field("partition", &self.client.partition())
            .field("offset", &self.offset.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Reader {
    pub fn new(config: ReaderConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let version = Arc::new(AtomicU64::new(0));
        let offset = Arc::new(AtomicI64::new(config.start_offset));
        let high_watermark = Arc::new(AtomicI64::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let cancel = Cancel::new();

        let join_handle = tokio::spawn(run_fetch_loop(
            Arc::clone(&config.client),
            config.min_bytes,
            config.max_bytes,
            config.max_wait,
            tx.clone(),
            0,
            config.start_offset,
            Arc::clone(&offset),
            Arc::clone(&high_watermark),
            Arc::clone(&cancel),
        ));

        Self {
            client: config.client,
            min_bytes: config.min_bytes,
            max_bytes: config.max_bytes,
            max_wait: config.max_wait,
            rx: Mutex::new(rx),
            tx,
            version,
            offset,
            high_watermark,
            closed,
            cancel: Mutex::new(cancel),
            join_handle: Mutex::new(Some(join_handle)),
        }
    }

    /// Blocks until a record is available, the reader is closed, or
    /// `deadline` elapses.
    pub async fn read_message(
        &self,
        deadline: Option<Duration>,
    ) -> std::result::Result<RecordAndOffset, ReadError> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(ReadError::Closed);
            }

            let mut rx = self.rx.lock().await;
            let recv = rx.recv();
            let item = match deadline {
                Some(d) => tokio::time::timeout(d, recv)
                    .await
                    .map_err(|_| ReadError::Timeout)?,
                None => recv.await,
            };
            drop(rx);

            let Some(item) = item else {
                return Err(ReadError::Closed);
            };

            if item.version != self.version.load(Ordering::SeqCst) {
                // Stale item from a cancelled epoch; drop and keep waiting.
                continue;
            }

            return match item.item {
                FetchItem::Record { record_and_offset, .. } => Ok(record_and_offset),
                FetchItem::Error(e) => Err(ReadError::Client(e)),
            };
        }
    }

    /// Seeks to `offset` (an absolute offset, or `FIRST`/`LAST`), cancelling
    /// whatever epoch is currently running.
    pub async fn set_offset(&self, offset: i64) {
        let new_version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        self.offset.store(offset, Ordering::SeqCst);

        let old_cancel = {
            let mut guard = self.cancel.lock().await;
            std::mem::replace(&mut *guard, Cancel::new())
        };
        old_cancel.cancel();

        let new_cancel = self.cancel.lock().await.clone();
        let handle = tokio::spawn(run_fetch_loop(
            Arc::clone(&self.client),
            self.min_bytes,
            self.max_bytes,
            self.max_wait,
            self.tx.clone(),
            new_version,
            offset,
            Arc::clone(&self.offset),
            Arc::clone(&self.high_watermark),
            new_cancel,
        ));

        if let Some(old) = self.join_handle.lock().await.replace(handle) {
            old.abort();
        }
    }

    /// The next offset this reader will deliver (the offset of the last
    /// delivered record, plus one).
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// `high_watermark - offset`, as of the most recent fetch -- independent
    /// of whether `read_message` has drained the queue.
    pub fn lag(&self) -> i64 {
        (self.high_watermark.load(Ordering::SeqCst) - self.offset.load(Ordering::SeqCst)).max(0)
    }

    /// Asks the partition leader for a fresh high watermark and reports lag
    /// against it, bypassing whatever the fetch loop last observed.
    ///
    /// `deadline`, when given, bounds the whole call regardless of how many
    /// retries `get_offset` would otherwise be willing to make -- the result
    /// is "independent of read progress" but still a bounded wait, not an
    /// unconditional one.
    pub async fn read_lag(&self, deadline: Option<Duration>) -> Result<i64> {
        let fetch = self.client.get_offset(OffsetAt::Latest);
        let high_watermark = match deadline {
            Some(deadline) => tokio::time::timeout(deadline, fetch)
                .await
                .map_err(|_| Error::Request(RequestError::RequestTimeout(deadline)))??,
            None => fetch.await?,
        };
        let offset = self.offset.load(Ordering::SeqCst).max(0);
        Ok((high_watermark - offset).max(0))
    }

    /// Stops the fetch loop and closes the record queue. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.lock().await.cancel();

        if let Some(handle) = self.join_handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

/// SEEKING resolves the starting offset, FETCHING issues Fetch requests and
/// streams decoded records; a retriable failure at either step drops into a
/// backoff sleep before returning to SEEKING. `client.get_offset`/
/// `client.fetch_records` already resolve and retry against the leader
/// internally, so this loop only needs to decide what to do with whatever
/// they hand back: forward a record, forward a non-fatal coded error, or
/// sleep and start a fresh epoch.
#[allow(clippy::too_many_arguments)]
async fn run_fetch_loop(
    client: Arc<PartitionClient>,
    min_bytes: i32,
    max_bytes: i32,
    max_wait: Duration,
    tx: mpsc::Sender<QueueItem>,
    version: u64,
    start_offset: i64,
    offset: Arc<AtomicI64>,
    high_watermark: Arc<AtomicI64>,
    cancel: Arc<Cancel>,
) {
    let mut backoff = Backoff::new(&BackoffConfig::default());
    let mut failures: u32 = 0;
    let mut pending_offset = start_offset;

    'epoch: loop {
        // SEEKING: translate FIRST/LAST into an absolute offset and clamp
        // anything below the partition's earliest retained offset.
        let seeked = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            r = seek(&client, pending_offset) => r,
        };

        let mut current_offset = match seeked {
            Ok(o) => {
                backoff.reset();
                failures = 0;
                o
            }
            Err(e) => {
                if !report_failure(&tx, version, &mut failures, e, &cancel).await {
                    return;
                }
                let wait = backoff.next();
                if !sleep_or_cancel(wait, &cancel).await {
                    return;
                }
                continue 'epoch;
            }
        };

        // FETCHING: issue Fetch, stream whatever comes back, and react to
        // the terminal (non-retried) error this call surfaced, if any.
        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                r = client.fetch_records(current_offset, min_bytes..max_bytes, max_wait.as_millis() as i32) => r,
            };

            match fetched {
                Ok((records, hw)) => {
                    backoff.reset();
                    failures = 0;
                    high_watermark.store(hw, Ordering::SeqCst);

                    for record_and_offset in records {
                        current_offset = record_and_offset.offset + 1;
                        offset.store(current_offset, Ordering::SeqCst);

                        let item = QueueItem {
                            version,
                            item: FetchItem::Record { record_and_offset, high_watermark: hw },
                        };
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return,
                            r = tx.send(item) => if r.is_err() { return },
                        }
                    }
                }
                Err(Error::ServerError { protocol_error: ProtocolError::OffsetOutOfRange, .. }) => {
                    // The producer may not have caught up yet; stay in
                    // FETCHING and let the broker's own max-wait pace us.
                    warn!(topic = %client.topic(), partition = client.partition(), current_offset, "offset out of range, backing off without resetting epoch");
                    let wait = backoff.next();
                    if !sleep_or_cancel(wait, &cancel).await {
                        return;
                    }
                }
                Err(e @ Error::ServerError { .. }) => {
                    // A generic coded broker error is forwarded to the user
                    // without tearing the connection down.
                    let item = QueueItem { version, item: FetchItem::Error(e) };
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        r = tx.send(item) => if r.is_err() { return },
                    }
                }
                Err(e) => {
                    // Unknown/network error: the leader connection has
                    // already been dropped by `PartitionClient`'s own retry
                    // driver. Back off and start a fresh epoch.
                    if !report_failure(&tx, version, &mut failures, e, &cancel).await {
                        return;
                    }
                    let wait = backoff.next();
                    if !sleep_or_cancel(wait, &cancel).await {
                        return;
                    }
                    pending_offset = current_offset;
                    continue 'epoch;
                }
            }
        }
    }
}

async fn seek(client: &PartitionClient, requested: i64) -> Result<i64> {
    let resolved = match requested {
        FIRST => client.get_offset(OffsetAt::Earliest).await?,
        LAST => client.get_offset(OffsetAt::Latest).await?,
        o => o,
    };

    if requested >= 0 {
        let first = client.get_offset(OffsetAt::Earliest).await?;
        Ok(resolved.max(first))
    } else {
        Ok(resolved)
    }
}

/// Logs the first few initialization/fetch failures without surfacing them;
/// from the fourth onward, sends them to the queue as error records. Returns
/// `false` if the reader was cancelled or closed while sending.
async fn report_failure(
    tx: &mpsc::Sender<QueueItem>,
    version: u64,
    failures: &mut u32,
    error: Error,
    cancel: &Cancel,
) -> bool {
    *failures += 1;
    if *failures <= INIT_FAILURE_LOG_THRESHOLD {
        warn!(%error, failures = *failures, "partition fetch loop failure, not yet surfaced to reader");
        return true;
    }

    error!(%error, failures = *failures, "partition fetch loop failure");
    let item = QueueItem { version, item: FetchItem::Error(error) };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        r = tx.send(item) => r.is_ok(),
    }
}

/// Sleeps for `wait`, or returns `false` early if cancelled.
async fn sleep_or_cancel(wait: Duration, cancel: &Cancel) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_at_uses_kip_79_sentinels() {
        assert_eq!(OffsetAt::Earliest.as_timestamp(), -2);
        assert_eq!(OffsetAt::Latest.as_timestamp(), -1);
        assert_eq!(OffsetAt::Timestamp(1_700_000_000_000).as_timestamp(), 1_700_000_000_000);
    }

    #[tokio::test]
    async fn cancel_before_any_waiter_is_not_missed() {
        // cancel() before anything ever awaits cancelled() -- must not be
        // lost, unlike a plain `Notify::notify_waiters()` with no waiters.
        let cancel = Cancel::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_millis(100), cancel.cancelled())
            .await
            .expect("cancelled() must return immediately once the flag is set");
    }

    #[tokio::test]
    async fn cancel_wakes_a_waiter_that_was_already_parked() {
        let cancel = Cancel::new();
        let parked = Arc::clone(&cancel);

        let handle = tokio::spawn(async move { parked.cancelled().await });
        tokio::task::yield_now().await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("waiter must be woken by cancel()")
            .unwrap();
    }
}
