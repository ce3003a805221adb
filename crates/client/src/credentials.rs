//! Credential providers for authorizing the stream.
//!
//! The transport treats the credential as an opaque string and asks for it on
//! every connection attempt, so a refreshed token is picked up on reconnect.

/// Supplies the credential embedded in the connection URL.
pub trait CredentialProvider: Send + Sync {
    /// The current credential, or `None` if the user is not signed in.
    fn credential(&self) -> Option<String>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn credential(&self) -> Option<String> {
        self()
    }
}

/// A fixed credential.
#[derive(Debug, Clone)]
pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(credential: impl Into<String>) -> Self {
        Self(credential.into())
    }
}

impl CredentialProvider for StaticCredential {
    fn credential(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the credential from an environment variable on each attempt.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredential {
    fn credential(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}
