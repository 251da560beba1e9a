//! Build-time constants sent to brokers during the handshake.

/// The `client_id` sent on every request when the caller does not override it.
pub const DEFAULT_CLIENT_ID: &str = concat!("kaskade/", env!("CARGO_PKG_VERSION"));
