/// Credentials consulted when the server challenges a request with status
/// 407 (spec.md §4.C). Grounded on the teacher's `gazette::auth::Auth`: a
/// thin credential holder, minus the gRPC-specific `Interceptor` impl since
/// this protocol's auth is a request/response SASL exchange rather than a
/// per-call metadata header.
#[derive(Clone)]
pub struct AuthInfo {
    username: String,
    password: String,
}

impl AuthInfo {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Encodes the SASL PLAIN mechanism payload: `base64("\0user\0pass")`.
    pub fn sasl_plain(&self) -> String {
        let raw = format!("\0{}\0{}", self.username, self.password);
        base64::encode(raw)
    }
}

impl std::fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque TLS configuration, passed through unexamined to the transport.
///
/// Mirrors spec.md §6's `TlsConfig` collaborator; this crate never inspects
/// its contents, only forwards it to `tokio-tungstenite`'s connector, the
/// way the teacher forwards `tonic`'s TLS feature configuration straight to
/// the gRPC channel builder.
#[derive(Clone, Default)]
pub struct TlsConfig {
    inner: Option<tokio_tungstenite::Connector>,
}

impl TlsConfig {
    pub fn new(connector: tokio_tungstenite::Connector) -> Self {
        Self {
            inner: Some(connector),
        }
    }

    pub fn connector(&self) -> Option<&tokio_tungstenite::Connector> {
        self.inner.as_ref()
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("configured", &self.inner.is_some())
            .finish()
    }
}
