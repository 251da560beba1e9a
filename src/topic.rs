//! A topic as seen from a cluster-wide metadata snapshot.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    /// The name of this topic.
    pub name: String,

    /// The partition indices that belong to this topic.
    pub partitions: Vec<i32>,
}
