//! Wire-level API version numbers and the inclusive ranges a client/broker
//! pair negotiates over before a request can be framed.

/// A single protocol version number for one Kafka-style API key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ApiVersion(pub i16);

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inclusive `[min, max]` range of versions a request body (or a
/// broker's `ApiVersions` advertisement) supports.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ApiVersionRange {
    min: ApiVersion,
    max: ApiVersion,
}

impl ApiVersionRange {
    /// Builds a range from raw version numbers. Panics if `min > max`,
    /// which would only happen from a hardcoded mistake in a `RequestBody`
    /// impl, never from wire input.
    pub const fn new(min: i16, max: i16) -> Self {
        assert!(min <= max);

        Self {
            min: ApiVersion(min),
            max: ApiVersion(max),
        }
    }

    pub fn min(&self) -> ApiVersion {
        self.min
    }

    pub fn max(&self) -> ApiVersion {
        self.max
    }

    /// The highest version both `self` and `other` support, or `None` if
    /// the two ranges don't overlap at all.
    pub fn intersect(&self, other: &Self) -> Option<ApiVersion> {
        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        (lo <= hi).then_some(hi)
    }
}

impl std::fmt::Display for ApiVersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.min, self.max)
    }
}
