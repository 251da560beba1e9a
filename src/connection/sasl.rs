//! SASL authentication plugin interface.
//!
//! The wire-level `SaslHandshake`/`SaslAuthenticate` exchange is generic: the
//! connection only knows how to ferry opaque challenge/response tokens back
//! and forth. The actual mechanism (PLAIN, SCRAM, OAUTHBEARER, a cloud
//! provider's IAM signer, ...) is an opaque plugin implementing
//! [`SaslMechanism`]/[`SaslSession`], matched to the real `kafka-go`
//! `sasl.Mechanism`/`sasl.StateMachine` split.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("SASL mechanism {0} rejected by broker: {1}")]
    Rejected(String, String),

    #[error("SASL mechanism requires broker metadata that was not supplied")]
    MissingMetadata,

    #[error("SASL mechanism failed: {0}")]
    Mechanism(String),
}

/// The (host, port) of the broker a handshake is being performed against,
/// handed to mechanisms that need to bind their response to the target
/// (e.g. a signed IAM request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub host: String,
    pub port: u16,
}

/// One step of a SASL exchange: whether the server is satisfied, and the
/// token to send back (empty once `done` is `true` and there is nothing left
/// to send).
#[async_trait]
pub trait SaslSession: Send + Sync + fmt::Debug {
    async fn next(&mut self, challenge: &[u8]) -> Result<(bool, Vec<u8>), Error>;
}

/// A pluggable SASL mechanism.
///
/// `name()` is sent verbatim as the `mechanism` field of
/// [`SaslHandshakeRequest`](crate::protocol::messages::sasl::SaslHandshakeRequest).
#[async_trait]
pub trait SaslMechanism: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    async fn start(
        &self,
        metadata: &Metadata,
    ) -> Result<(Box<dyn SaslSession>, Vec<u8>), Error>;
}

/// RFC 4616 PLAIN: `\0authzid\0authcid\0passwd` sent as a single token, no
/// further challenge/response round trips.
#[derive(Clone)]
pub struct PlainCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PlainCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[async_trait]
impl SaslMechanism for PlainCredentials {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    async fn start(
        &self,
        _metadata: &Metadata,
    ) -> Result<(Box<dyn SaslSession>, Vec<u8>), Error> {
        let mut token = Vec::with_capacity(self.username.len() + self.password.len() + 2);
        token.push(0u8);
        token.extend_from_slice(self.username.as_bytes());
        token.push(0u8);
        token.extend_from_slice(self.password.as_bytes());

        Ok((Box::new(PlainSession), token))
    }
}

#[derive(Debug)]
struct PlainSession;

#[async_trait]
impl SaslSession for PlainSession {
    async fn next(&mut self, _challenge: &[u8]) -> Result<(bool, Vec<u8>), Error> {
        Ok((true, vec![]))
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches a fresh bearer token on demand, e.g. from an OIDC provider.
pub type OauthCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<String, Error>> + Send + Sync>;

#[derive(Clone)]
pub struct OauthBearerCredentials {
    pub token_callback: OauthCallback,
}

impl fmt::Debug for OauthBearerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OauthBearerCredentials").finish()
    }
}

#[async_trait]
impl SaslMechanism for OauthBearerCredentials {
    fn name(&self) -> &'static str {
        "OAUTHBEARER"
    }

    async fn start(
        &self,
        _metadata: &Metadata,
    ) -> Result<(Box<dyn SaslSession>, Vec<u8>), Error> {
        let token = (self.token_callback)().await?;
        let kv = format!("n,,\x01auth=Bearer {token}\x01\x01");
        Ok((Box::new(OauthBearerSession), kv.into_bytes()))
    }
}

#[derive(Debug)]
struct OauthBearerSession;

#[async_trait]
impl SaslSession for OauthBearerSession {
    async fn next(&mut self, challenge: &[u8]) -> Result<(bool, Vec<u8>), Error> {
        if challenge.is_empty() {
            Ok((true, vec![]))
        } else {
            // The broker rejected the bearer token; the dummy response (`\x01`)
            // tells it we're done retrying.
            Ok((true, vec![0x01]))
        }
    }
}

/// A credential set the client was configured with. Matches the teacher's
/// `Credentials` enum shape, widened to hold any [`SaslMechanism`] so
/// third-party mechanisms (AWS MSK IAM, Kerberos, ...) can be plugged in
/// without the core depending on their SDKs.
#[derive(Clone)]
pub enum Credentials {
    Plain(PlainCredentials),
    OauthBearer(OauthBearerCredentials),
    Custom(Arc<dyn SaslMechanism>),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(c) => f.debug_tuple("Plain").field(c).finish(),
            Self::OauthBearer(c) => f.debug_tuple("OauthBearer").field(c).finish(),
            Self::Custom(c) => f.debug_tuple("Custom").field(c).finish(),
        }
    }
}

impl Credentials {
    pub(crate) fn as_mechanism(&self) -> &dyn SaslMechanism {
        match self {
            Self::Plain(c) => c,
            Self::OauthBearer(c) => c,
            Self::Custom(c) => c.as_ref(),
        }
    }
}

/// Optional SASL configuration for a [`crate::client::ClientBuilder`].
#[derive(Debug, Clone)]
pub struct SaslConfig {
    pub credentials: Credentials,
}

impl SaslConfig {
    pub fn plain(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::Plain(PlainCredentials {
                username: username.into(),
                password: password.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_token_is_null_separated() {
        let creds = PlainCredentials {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let metadata = Metadata {
            host: "localhost".to_string(),
            port: 9092,
        };
        let (_session, token) = creds.start(&metadata).await.unwrap();
        assert_eq!(token, b"\0alice\0hunter2");
    }
}
