//! The cluster's current broker address book, as last seen in a `Metadata`
//! response.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use parking_lot::RwLock;
use tracing::info;

use crate::protocol::messages::MetadataResponseBroker;

/// One broker's dial address, as advertised by the cluster.
#[derive(Debug, Clone)]
pub struct Broker {
    pub id: i32,
    host: String,
    port: i32,
}

impl Display for Broker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<&MetadataResponseBroker> for Broker {
    fn from(b: &MetadataResponseBroker) -> Self {
        Self {
            id: b.node_id,
            host: b.host.clone(),
            port: b.port,
        }
    }
}

/// A `broker_id -> Broker` snapshot, replaced wholesale by each `Metadata`
/// refresh but readable concurrently with an in-flight refresh via
/// `parking_lot::RwLock`.
#[derive(Debug, Default)]
pub struct BrokerTopology {
    brokers: RwLock<HashMap<i32, Broker>>,
}

impl BrokerTopology {
    pub fn is_empty(&self) -> bool {
        self.brokers.read().is_empty()
    }

    pub async fn get_broker(&self, broker_id: i32) -> Option<Broker> {
        self.brokers.read().get(&broker_id).cloned()
    }

    pub fn get_brokers(&self) -> Vec<Broker> {
        self.brokers.read().values().cloned().collect()
    }

    /// Merges a fresh broker list into the snapshot, logging the brokers
    /// that are new or whose address changed. Brokers that disappear from
    /// `brokers` are left in place rather than evicted -- a single metadata
    /// response not mentioning a broker doesn't mean that broker is gone,
    /// only that the responding node didn't list it.
    pub fn update(&self, brokers: &[MetadataResponseBroker]) {
        let mut current = self.brokers.write();
        for wire in brokers {
            let incoming = Broker::from(wire);
            match current.get_mut(&wire.node_id) {
                Some(existing) if existing.host == incoming.host && existing.port == incoming.port => {}
                Some(existing) => {
                    info!(broker = wire.node_id, old = %existing, new = %incoming, "broker address changed");
                    *existing = incoming;
                }
                None => {
                    info!(broker = wire.node_id, addr = %incoming, "discovered broker");
                    current.insert(wire.node_id, incoming);
                }
            }
        }
    }
}
