use thiserror::Error;

/// Canonical Ember error taxonomy used across crates.
///
/// Classification guidance:
/// - [`EmberError::InvalidConfig`]: cluster/table/config contract violations found at load time
/// - [`EmberError::InvalidTemplate`]: a source-path template whose macros do not form a valid
///   time decomposition
/// - [`EmberError::Rpc`]: transient node communication failures (unreachable, timeout); the
///   reconciliation loop retries these on the next cycle
/// - [`EmberError::NodeGone`]: a node left the membership view or its address disappeared
/// - [`EmberError::Unsupported`]: valid request for a scheme/feature not wired in this build
/// - [`EmberError::Io`]: raw filesystem IO failures from std APIs
#[derive(Debug, Error)]
pub enum EmberError {
    /// Invalid or inconsistent configuration/cluster state.
    ///
    /// Examples:
    /// - missing table location
    /// - unparsable cluster definition file
    /// - invalid retention/window option values
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A path template whose placeholders do not form a prefix-complete time
    /// decomposition (for example `{minute}` without `{hour}` and `{date}`).
    ///
    /// Tables carrying such templates fail registration at refresh time.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// Transient node communication failure.
    ///
    /// Examples:
    /// - node unreachable
    /// - per-RPC timeout exceeded
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A node disappeared from the cluster view while work was routed to it.
    #[error("node gone: {0}")]
    NodeGone(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Valid request for a scheme/feature not available in this build.
    ///
    /// Examples:
    /// - cloud filesystem scheme with no registered adapter
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Standard Ember result alias.
pub type Result<T> = std::result::Result<T, EmberError>;
