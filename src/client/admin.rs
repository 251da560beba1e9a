//! Low-level, non-consumer-group admin RPC wrappers.
//!
//! [`ControllerClient`] caches the cluster controller connection the way
//! `client::partition::PartitionClient` caches a partition leader: behind the
//! [`BrokerCache`] trait, so the shared [`maybe_retry`] helper can invalidate
//! a stale cached broker without knowing which role it plays. Only the
//! RPCs that are genuine "ask one broker a question" operations live here --
//! topic/consumer-group management is out of scope.

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::backoff::{Backoff, BackoffConfig, BackoffError, ErrorOrThrottle};
use crate::client::error::{Error, RequestContext, Result};
use crate::connection::{
    BrokerCache, BrokerCacheGeneration, BrokerConnection, BrokerConnector, MessengerTransport,
    MetadataLookupMode,
};
use crate::messenger::RequestError;
use crate::protocol::error::Error as ProtocolError;
use crate::protocol::messages::{
    AlterPartitionReassignmentsRequest, AlterPartitionReassignmentsRequestPartition,
    AlterPartitionReassignmentsRequestTopic, AlterPartitionReassignmentsResponseTopic,
    CoordinatorType, DescribeUserScramCredentialsRequest, DescribeUserScramCredentialsRequestUser,
    DescribeUserScramCredentialsResponseResult, FindCoordinatorRequest, InitProducerIdRequest,
    InitProducerIdResponse, MetadataResponse,
};
use crate::throttle::maybe_throttle;
use crate::validation::ExactlyOne;

#[derive(Debug)]
pub struct ControllerClient {
    brokers: Arc<BrokerConnector>,
    backoff_config: Arc<BackoffConfig>,
    current_broker: Mutex<(Option<(i32, BrokerConnection)>, BrokerCacheGeneration)>,
}

impl ControllerClient {
    pub(super) fn new(brokers: Arc<BrokerConnector>, backoff_config: Arc<BackoffConfig>) -> Self {
        Self {
            brokers,
            backoff_config,
            current_broker: Mutex::new((None, BrokerCacheGeneration::START)),
        }
    }

    /// Fetches a fresh, uncached metadata snapshot for every topic the
    /// cluster currently hosts.
    pub async fn metadata(&self) -> Result<MetadataResponse> {
        let (metadata, _gen) = self
            .brokers
            .request_metadata(&MetadataLookupMode::ArbitraryBroker, None)
            .await?;
        Ok(metadata)
    }

    /// Looks up the coordinator broker for a group or transactional id.
    pub async fn find_coordinator(
        &self,
        key: &str,
        key_type: CoordinatorType,
    ) -> Result<(i32, String, i32)> {
        let request = &FindCoordinatorRequest {
            key: key.to_owned(),
            key_type,
            tagged_fields: None,
        };

        maybe_retry(&self.backoff_config, self, "find_coordinator", || async move {
            let (broker, gen) = self.get().await.map_err(|e| ErrorOrThrottle::Error((e, None)))?;
            let response = broker
                .request(request)
                .await
                .map_err(|e| ErrorOrThrottle::Error((e.into(), Some(gen))))?;

            maybe_throttle(response.throttle_time_ms)?;

            match response.error_code {
                None => Ok((response.node_id, response.host, response.port)),
                Some(protocol_error) => Err(ErrorOrThrottle::Error((
                    Error::ServerError {
                        protocol_error,
                        error_message: response.error_message,
                        request: RequestContext::Coordinator(key.to_owned()),
                        is_virtual: false,
                    },
                    Some(gen),
                ))),
            }
        })
        .await
    }

    /// Obtains (or bumps the epoch of) a producer id.
    pub async fn init_producer_id(
        &self,
        transactional_id: Option<String>,
        transaction_timeout_ms: i32,
    ) -> Result<(i64, i16)> {
        let request = &InitProducerIdRequest {
            transactional_id,
            transaction_timeout_ms,
            producer_id: None,
            producer_epoch: None,
            tagged_fields: None,
        };

        maybe_retry(
            &self.backoff_config,
            self,
            "init_producer_id",
            || async move {
                let (broker, gen) =
                    self.get().await.map_err(|e| ErrorOrThrottle::Error((e, None)))?;
                let response: InitProducerIdResponse = broker
                    .request(request)
                    .await
                    .map_err(|e| ErrorOrThrottle::Error((e.into(), Some(gen))))?;

                maybe_throttle(Some(response.throttle_time_ms))?;

                match response.error_code {
                    None => Ok((response.producer_id, response.producer_epoch)),
                    Some(protocol_error) => Err(ErrorOrThrottle::Error((
                        Error::ServerError {
                            protocol_error,
                            error_message: None,
                            request: RequestContext::Topic("<init-producer-id>".to_owned()),
                            is_virtual: false,
                        },
                        Some(gen),
                    ))),
                }
            },
        )
        .await
    }

    /// Reassigns the replica set of one or more partitions.
    pub async fn alter_partition_reassignments(
        &self,
        topic: &str,
        reassignments: Vec<(i32, Option<Vec<i32>>)>,
        timeout_ms: i32,
    ) -> Result<()> {
        let request = &AlterPartitionReassignmentsRequest {
            timeout_ms,
            topics: vec![AlterPartitionReassignmentsRequestTopic {
                name: topic.to_owned(),
                partitions: reassignments
                    .iter()
                    .map(|(partition_index, replicas)| AlterPartitionReassignmentsRequestPartition {
                        partition_index: *partition_index,
                        replicas: replicas.clone(),
                        tagged_fields: None,
                    })
                    .collect(),
                tagged_fields: None,
            }],
            tagged_fields: None,
        };

        maybe_retry(
            &self.backoff_config,
            self,
            "alter_partition_reassignments",
            || async move {
                let (broker, gen) =
                    self.get().await.map_err(|e| ErrorOrThrottle::Error((e, None)))?;
                let response = broker
                    .request(request)
                    .await
                    .map_err(|e| ErrorOrThrottle::Error((e.into(), Some(gen))))?;

                maybe_throttle(Some(response.throttle_time_ms))?;

                if let Some(protocol_error) = response.error_code {
                    return Err(ErrorOrThrottle::Error((
                        Error::ServerError {
                            protocol_error,
                            error_message: response.error_message,
                            request: RequestContext::Topic(topic.to_owned()),
                            is_virtual: false,
                        },
                        Some(gen),
                    )));
                }

                let topic_result: AlterPartitionReassignmentsResponseTopic = response
                    .responses
                    .exactly_one()
                    .map_err(|e| {
                        ErrorOrThrottle::Error((
                            Error::exactly_one(RequestContext::Topic(topic.to_owned()), e),
                            Some(gen),
                        ))
                    })?;

                for partition in topic_result.partitions {
                    if let Some(protocol_error) = partition.error_code {
                        return Err(ErrorOrThrottle::Error((
                            Error::ServerError {
                                protocol_error,
                                error_message: partition.error_message,
                                request: RequestContext::Partition(
                                    topic.to_owned(),
                                    partition.partition_index,
                                ),
                                is_virtual: false,
                            },
                            Some(gen),
                        )));
                    }
                }

                Ok(())
            },
        )
        .await
    }

    /// Describes the stored SCRAM credentials for one or more users, or for
    /// every user when `users` is empty.
    pub async fn describe_user_scram_credentials(
        &self,
        users: Vec<String>,
    ) -> Result<Vec<DescribeUserScramCredentialsResponseResult>> {
        let request = &DescribeUserScramCredentialsRequest {
            users: (!users.is_empty()).then(|| {
                users
                    .iter()
                    .map(|name| DescribeUserScramCredentialsRequestUser {
                        name: name.clone(),
                        tagged_fields: None,
                    })
                    .collect()
            }),
            tagged_fields: None,
        };

        maybe_retry(
            &self.backoff_config,
            self,
            "describe_user_scram_credentials",
            || async move {
                let (broker, gen) =
                    self.get().await.map_err(|e| ErrorOrThrottle::Error((e, None)))?;
                let response = broker
                    .request(request)
                    .await
                    .map_err(|e| ErrorOrThrottle::Error((e.into(), Some(gen))))?;

                maybe_throttle(Some(response.throttle_time_ms))?;

                if let Some(protocol_error) = response.error_code {
                    return Err(ErrorOrThrottle::Error((
                        Error::ServerError {
                            protocol_error,
                            error_message: response.error_message,
                            request: RequestContext::Topic("<describe-user-scram-credentials>".to_owned()),
                            is_virtual: false,
                        },
                        Some(gen),
                    )));
                }

                Ok(response.results)
            },
        )
        .await
    }

    /// Retrieves the broker id of the current controller.
    async fn get_controller_id(&self) -> Result<i32> {
        let (metadata, _gen) = self
            .brokers
            .request_metadata(&MetadataLookupMode::ArbitraryBroker, Some(vec![]))
            .await?;

        metadata
            .controller_id
            .ok_or_else(|| Error::InvalidResponse("metadata response had no controller".to_owned()))
    }
}

/// Caches the cluster controller broker.
#[async_trait]
impl BrokerCache for &ControllerClient {
    type R = MessengerTransport;
    type E = Error;

    async fn get(&self) -> Result<(Arc<Self::R>, BrokerCacheGeneration)> {
        let mut current_broker = self.current_broker.lock().await;
        if let Some((_, broker)) = &current_broker.0 {
            return Ok((Arc::clone(broker), current_broker.1));
        }

        info!("creating new controller broker connection");

        let controller_id = self.get_controller_id().await?;
        let broker = self.brokers.connect(controller_id).await?.ok_or_else(|| {
            Error::InvalidResponse(format!(
                "controller {controller_id} not found in metadata response"
            ))
        })?;

        current_broker.0 = Some((controller_id, Arc::clone(&broker)));
        current_broker.1.bump();

        Ok((broker, current_broker.1))
    }

    async fn invalidate(&self, reason: &'static str, gen: BrokerCacheGeneration) {
        let mut guard = self.current_broker.lock().await;

        if guard.1 != gen {
            debug!(
                reason,
                current_gen = guard.1.get(),
                request_gen = gen.get(),
                "stale invalidation request for controller broker cache",
            );
            return;
        }

        info!(reason, "invalidating cached controller broker");
        if let Some((broker_id, _)) = guard.0.take() {
            self.brokers.invalidate_connection(broker_id).await;
        }
    }
}

/// Drives `f` with backoff, invalidating the broker cache on a broken
/// connection or a stale-controller response and giving up on anything else.
async fn maybe_retry<B, R, F, T>(
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

            match &error {
                Error::Request(RequestError::Poisoned | RequestError::IO(_))
                | Error::Connection(_) => {
                    if let Some(cache_gen) = cache_gen {
                        broker_cache
                            .invalidate("controller client: connection broken", cache_gen)
                            .await
                    }
                }

                Error::ServerError {
                    protocol_error: ProtocolError::NotController,
                    ..
                } => {
                    if let Some(cache_gen) = cache_gen {
                        broker_cache
                            .invalidate(
                                "controller client: server error: not controller",
                                cache_gen,
                            )
                            .await;
                    }
                }

                _ => {
                    error!(e=%error, request_name, "request encountered fatal error");
                    return ControlFlow::Break(Err(error));
                }
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
