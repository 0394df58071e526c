use thiserror::Error;
use tracing::warn;

/// Display string recorded when the caller cannot be resolved.
pub const UNKNOWN_CALLER: &str = "Unknown.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no caller identity available: {0}")]
    Unavailable(String),
}

/// Maps the current caller to a display string.
///
/// Injected into the engine; the engine never looks identity up from
/// ambient state.
pub trait IdentityResolver: Send + Sync {
    fn resolve_caller(&self) -> Result<String, IdentityError>;
}

/// Resolve the caller, degrading any failure (or a blank name) to
/// [`UNKNOWN_CALLER`].
pub fn caller_or_unknown(resolver: &dyn IdentityResolver) -> String {
    match resolver.resolve_caller() {
        Ok(name) if !name.trim().is_empty() => name,
        Ok(_) => {
            warn!("caller identity is blank; recording as unknown");
            UNKNOWN_CALLER.to_string()
        }
        Err(e) => {
            warn!(error = %e, "caller identity unavailable; recording as unknown");
            UNKNOWN_CALLER.to_string()
        }
    }
}

/// A fixed caller name.
#[derive(Clone, Debug)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl IdentityResolver for StaticIdentity {
    fn resolve_caller(&self) -> Result<String, IdentityError> {
        Ok(self.0.clone())
    }
}

/// Reads the caller name from an environment variable at resolve time.
#[derive(Clone, Debug)]
pub struct EnvIdentity {
    var: String,
}

impl EnvIdentity {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl IdentityResolver for EnvIdentity {
    fn resolve_caller(&self) -> Result<String, IdentityError> {
        std::env::var(&self.var)
            .map_err(|e| IdentityError::Unavailable(format!("{}: {e}", self.var)))
    }
}

/// A caller that never resolves.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousIdentity;

impl IdentityResolver for AnonymousIdentity {
    fn resolve_caller(&self) -> Result<String, IdentityError> {
        Err(IdentityError::Unavailable("anonymous caller".into()))
    }
}
