//! A minimal async client for a Kafka-compatible distributed commit log.
//!
//! [`Client`] resolves cluster metadata and hands out task-specific
//! sub-clients: [`client::admin::ControllerClient`] for admin-style RPCs,
//! [`client::partition::PartitionClient`] for a single partition's
//! request/response operations, and [`client::producer::Writer`] for
//! producing to a partition. [`Reader`] wraps a `PartitionClient` with a
//! background fetch loop and a bounded queue, so consuming a partition is a
//! matter of constructing a [`client::partition::ReaderConfig`] and calling
//! [`Reader::read_message`] in a loop.
//!
//! Everything under [`protocol`] is wire-format codec: primitives, the
//! record batch format, and per-message (request/response) (de)serialization
//! keyed by API version. [`connection`] and [`messenger`] own the transport
//! underneath that: dialing, optional TLS/SOCKS5, SASL, and the length-framed
//! request/response multiplexing over one physical connection.

pub mod backoff;
pub mod build_info;
pub mod client;
pub mod connection;
pub mod messenger;
pub mod protocol;
pub mod throttle;
pub mod topic;
pub mod validation;

pub use client::{Client, ClientBuilder};
pub use client::partition::Reader;
pub use topic::Topic;
