//! The well-known broker error code space.
//!
//! # References
//! - <https://kafka.apache.org/protocol#protocol_error_codes>

use thiserror::Error;

macro_rules! broker_errors {
    ($($variant:ident => ($code:expr, $retriable:expr, $msg:expr)),* $(,)?) => {
        /// A coded error returned by a broker in a response body.
        ///
        /// The classifier is total: [`Error::new`] never panics and an unrecognized
        /// code becomes [`Error::Unknown`] rather than an error of its own.
        #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
        #[non_exhaustive]
        pub enum Error {
            $(
                #[error($msg)]
                $variant,
            )*

            #[error("unknown broker error code {0}")]
            Unknown(i16),
        }

        impl Error {
            /// Build an `Error` from a wire error code, or `None` for `0` (no error).
            pub fn new(code: i16) -> Option<Self> {
                match code {
                    0 => None,
                    $($code => Some(Self::$variant),)*
                    other => Some(Self::Unknown(other)),
                }
            }

            pub fn code(&self) -> i16 {
                match self {
                    $(Self::$variant => $code,)*
                    Self::Unknown(code) => *code,
                }
            }

            /// Whether a client may reasonably retry the request that produced this error.
            pub fn is_retriable(&self) -> bool {
                match self {
                    $(Self::$variant => $retriable,)*
                    Self::Unknown(_) => false,
                }
            }
        }
    };
}

broker_errors!(
    UnknownServerError => (-1, false, "the server experienced an unexpected error when processing the request"),
    OffsetOutOfRange => (1, false, "the requested offset is not within the range of offsets maintained by the server"),
    CorruptMessage => (2, true, "this message has failed its CRC checksum, exceeds the valid size, or is otherwise corrupt"),
    UnknownTopicOrPartition => (3, true, "this server does not host this topic-partition"),
    InvalidFetchSize => (4, false, "the requested fetch size is invalid"),
    LeaderNotAvailable => (5, true, "there is no leader for this topic-partition as we are in the middle of a leadership election"),
    NotLeaderOrFollower => (6, true, "this broker is not the leader or a replica of the requested topic-partition"),
    RequestTimedOut => (7, true, "the request timed out"),
    BrokerNotAvailable => (8, false, "the broker is not available"),
    ReplicaNotAvailable => (9, true, "the replica is not available for the requested topic-partition"),
    MessageTooLarge => (10, false, "the request included a message larger than the max message size the server will accept"),
    StaleControllerEpoch => (11, false, "the controller moved to another broker"),
    OffsetMetadataTooLarge => (12, false, "the metadata field of the offset request was too large"),
    NetworkException => (13, true, "the server disconnected before a response was received"),
    CoordinatorLoadInProgress => (14, true, "the coordinator is loading and hence can't process requests"),
    CoordinatorNotAvailable => (15, true, "the coordinator is not available"),
    NotCoordinator => (16, true, "this is not the correct coordinator"),
    InvalidTopicException => (17, false, "the request attempted to perform an operation on an invalid topic"),
    RecordListTooLarge => (18, false, "the request included a message batch larger than the configured segment size on the server"),
    NotEnoughReplicas => (19, true, "messages are rejected since there are fewer in-sync replicas than required"),
    NotEnoughReplicasAfterAppend => (20, true, "messages are written to the log, but to fewer in-sync replicas than required"),
    InvalidRequiredAcks => (21, false, "produce request specified an invalid value for required acks"),
    IllegalGeneration => (22, false, "specified group generation id is not valid"),
    InconsistentGroupProtocol => (23, false, "the group member's supported protocols are incompatible with those of existing members"),
    InvalidGroupId => (24, false, "the configured group id is invalid"),
    UnknownMemberId => (25, false, "the coordinator is not aware of this member"),
    InvalidSessionTimeout => (26, false, "the session timeout is not within the range allowed by the broker"),
    RebalanceInProgress => (27, false, "the group is rebalancing, so a rejoin is needed"),
    InvalidCommitOffsetSize => (28, false, "the committing offset data size is not valid"),
    TopicAuthorizationFailed => (29, false, "topic authorization failed"),
    GroupAuthorizationFailed => (30, false, "group authorization failed"),
    ClusterAuthorizationFailed => (31, false, "cluster authorization failed"),
    InvalidTimestamp => (32, false, "the timestamp of the message is out of acceptable range"),
    UnsupportedSaslMechanism => (33, false, "the broker does not support the requested SASL mechanism"),
    IllegalSaslState => (34, false, "request is not valid given the current SASL state"),
    UnsupportedVersion => (35, false, "the version of the API is not supported"),
    TopicAlreadyExists => (36, false, "topic with this name already exists"),
    InvalidPartitions => (37, false, "number of partitions is below 1"),
    InvalidReplicationFactor => (38, false, "replication factor is below 1 or larger than the number of available brokers"),
    InvalidReplicaAssignment => (39, false, "replica assignment is invalid"),
    InvalidConfig => (40, false, "configuration is invalid"),
    NotController => (41, true, "this is not the correct controller for this cluster"),
    InvalidRequest => (42, false, "the request is malformed or was sent to an incompatible broker"),
    UnsupportedForMessageFormat => (43, false, "the message format version on the broker does not support the request"),
    PolicyViolation => (44, false, "request parameters do not satisfy the configured policy"),
    OutOfOrderSequenceNumber => (45, false, "the broker received an out of order sequence number"),
    DuplicateSequenceNumber => (46, false, "the broker received a duplicate sequence number"),
    InvalidProducerEpoch => (47, false, "producer attempted to produce with an old epoch"),
    InvalidTxnState => (48, false, "the producer attempted a transactional operation in an invalid state"),
    InvalidProducerIdMapping => (49, false, "the producer attempted to use a producer id which is not currently assigned to its transactional id"),
    InvalidTransactionTimeout => (50, false, "the transaction timeout is larger than the maximum value allowed by the broker"),
    ConcurrentTransactions => (51, true, "the producer attempted to update a transaction while another concurrent operation was ongoing"),
    TransactionCoordinatorFenced => (52, false, "the transaction coordinator sending this marker is no longer the current coordinator for this producer"),
    TransactionalIdAuthorizationFailed => (53, false, "transactional id authorization failed"),
    SecurityDisabled => (54, false, "security features are disabled"),
    OperationNotAttempted => (55, false, "the broker did not attempt to execute this operation"),
    KafkaStorageError => (56, true, "disk error when trying to access the log file on disk"),
    LogDirNotFound => (57, false, "the user-specified log directory is not found in the broker config"),
    SaslAuthenticationFailed => (58, false, "SASL authentication failed"),
    UnknownProducerId => (59, false, "the broker could not locate the producer metadata associated with the producer id in question"),
    ReassignmentInProgress => (60, false, "a partition reassignment is in progress"),
    DelegationTokenAuthDisabled => (61, false, "delegation token feature is not enabled"),
    DelegationTokenNotFound => (62, false, "delegation token is not found on server"),
    DelegationTokenOwnerMismatch => (63, false, "specified principal is not a valid owner or renewer"),
    DelegationTokenRequestNotAllowed => (64, false, "delegation token requests are not allowed on this channel"),
    DelegationTokenAuthorizationFailed => (65, false, "delegation token authorization failed"),
    DelegationTokenExpired => (66, false, "delegation token is expired"),
    InvalidPrincipalType => (67, false, "supplied principal type is not supported"),
    NonEmptyGroup => (68, false, "the group is not empty"),
    GroupIdNotFound => (69, false, "the group id does not exist"),
    FetchSessionIdNotFound => (70, true, "the fetch session id was not found"),
    InvalidFetchSessionEpoch => (71, true, "the fetch session epoch is invalid"),
    ListenerNotFound => (72, true, "there is no listener on the leader broker that matches the one the metadata request was processed on"),
    TopicDeletionDisabled => (73, false, "topic deletion is disabled"),
    FencedLeaderEpoch => (74, true, "the leader epoch in the request is older than the epoch on the broker"),
    UnknownLeaderEpoch => (75, true, "the leader epoch in the request is newer than the epoch on the broker"),
    UnsupportedCompressionType => (76, false, "the requesting client does not support the compression type of the given partition"),
    StaleBrokerEpoch => (77, false, "broker epoch has changed"),
    OffsetNotAvailable => (78, true, "the leader high watermark has not caught up from a recent leader election"),
    MemberIdRequired => (79, false, "the group member needs a valid member id before joining the group"),
    PreferredLeaderNotAvailable => (80, true, "the preferred leader was not available"),
    GroupMaxSizeReached => (81, false, "the consumer group has reached its max size"),
    FencedInstanceId => (82, false, "the broker rejected this static member since another member registered with the same instance id"),
    EligibleLeadersNotAvailable => (83, true, "eligible topic partition leaders are not available"),
    ElectionNotNeeded => (84, true, "leader election not needed for this topic partition"),
    NoReassignmentInProgress => (85, false, "no partition reassignment is in progress"),
    GroupSubscribedToTopic => (86, false, "deleting offsets of a topic is forbidden while a group is subscribed to it"),
    InvalidRecord => (87, false, "this record failed validation on the broker and was rejected"),
    UnstableOffsetCommit => (88, true, "there are unstable offsets that need to be cleared"),
    ThrottlingQuotaExceeded => (89, true, "the throttling quota has been exceeded"),
    ProducerFenced => (90, false, "there is a newer producer with the same transactional id which fences the current one"),
    ResourceNotFound => (91, false, "a request illegally referred to a resource that does not exist"),
    DuplicateResource => (92, false, "a request illegally referred to the same resource twice"),
    UnacceptableCredential => (93, false, "requested credential would not meet the criteria for acceptability"),
    InconsistentVoterSet => (94, false, "either the sender or recipient of this voter-only request is not one of the expected voters"),
    InvalidUpdateVersion => (95, false, "the given update version was invalid"),
    FeatureUpdateFailed => (96, false, "unable to update finalized features due to an unexpected server error"),
    PrincipalDeserializationFailure => (97, false, "request principal deserialization failed during forwarding"),
    SnapshotNotFound => (98, false, "requested snapshot was not found"),
    PositionOutOfRange => (99, false, "requested position is out of range for the snapshot"),
    UnknownTopicId => (100, true, "this server does not host this topic id"),
    DuplicateBrokerRegistration => (101, false, "this broker id is already in use"),
    BrokerIdNotRegistered => (102, false, "the given broker id was not registered"),
    InconsistentTopicId => (103, true, "the log's topic id did not match the topic id in the request"),
    InconsistentClusterId => (104, false, "the cluster id in the request does not match that found on the server"),
    TransactionalIdNotFound => (105, false, "the transactional id could not be found"),
    FetchSessionTopicIdError => (106, true, "the fetch session encountered inconsistent topic id usage"),
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_error_is_none() {
        assert!(Error::new(0).is_none());
    }

    #[test]
    fn known_code_roundtrips() {
        let err = Error::new(1).unwrap();
        assert_eq!(err, Error::OffsetOutOfRange);
        assert_eq!(err.code(), 1);
        assert!(!err.is_retriable());
    }

    #[test]
    fn retriable_code_is_flagged() {
        let err = Error::new(7).unwrap();
        assert_eq!(err, Error::RequestTimedOut);
        assert!(err.is_retriable());
    }

    #[test]
    fn unknown_code_is_classified_non_retriable() {
        let err = Error::new(12345).unwrap();
        assert_eq!(err, Error::Unknown(12345));
        assert_eq!(err.code(), 12345);
        assert!(!err.is_retriable());
    }
}
