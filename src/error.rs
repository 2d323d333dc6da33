//! Error types for fleet-dispatch
//!
//! This module defines the error hierarchy for the dispatcher:
//! - Configuration and CLI errors (reported before any queue exists)
//! - Resource errors (creating, opening or unlinking named queues)
//! - IPC errors (sending or receiving on an existing queue)
//! - Process errors (spawning or joining units of execution)
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Would-block is an outcome, not an error, and never appears here
//! - Every variant carries the name of the queue or worker it concerns

use thiserror::Error;

/// Top-level error type for the fleet-dispatch application
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Named queue lifecycle errors
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Queue send/receive errors
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// Worker/collector spawn and join errors
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
}

impl DispatchError {
    /// Returns true if this error was raised before any resource was created
    pub fn is_usage(&self) -> bool {
        matches!(self, DispatchError::Config(_))
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Arguments could not be parsed
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid run duration
    #[error("Invalid duration {secs}s: must be at least 1 second")]
    InvalidDuration { secs: u64 },

    /// Invalid queue capacity
    #[error("Invalid {queue} capacity {capacity}: must be at least 1")]
    InvalidCapacity { queue: &'static str, capacity: usize },

    /// Interval range is empty
    #[error("Invalid interval range {min}..={max} ms: minimum exceeds maximum")]
    InvalidInterval { min: u64, max: u64 },

    /// Coordinate bound out of range
    #[error("Invalid coordinate bound {bound}: must be between 0 and {max}")]
    InvalidCoordinateBound { bound: i32, max: i32 },
}

/// Named queue lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Queue name does not follow the `/name` convention
    #[error("Invalid queue name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Queue attributes rejected
    #[error("Invalid attributes for '{name}': {reason}")]
    InvalidAttributes { name: String, reason: String },

    /// Exclusive create of an existing name
    #[error("Queue '{name}' already exists")]
    AlreadyExists { name: String },

    /// Open or unlink of a missing name
    #[error("Queue '{name}' does not exist")]
    NotFound { name: String },

    /// Namespace is at its object limit
    #[error("Cannot create '{name}': namespace limit of {limit} queues reached")]
    LimitReached { name: String, limit: usize },
}

impl ResourceError {
    /// Returns true if the named object was already absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound { .. })
    }
}

/// Errors on an existing queue, excluding would-block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IpcError {
    /// Record larger than the queue's message size
    #[error("Record of {size} bytes exceeds message size {max} of '{queue}'")]
    MessageTooLarge { queue: String, size: usize, max: usize },

    /// Record could not be decoded
    #[error("Malformed record on '{queue}': {source}")]
    Malformed {
        queue: String,
        #[source]
        source: CodecError,
    },

    /// All endpoints of the queue are gone
    #[error("Queue '{queue}' is closed")]
    Closed { queue: String },
}

/// Wire record decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Record length does not match the fixed record size
    #[error("expected a {expected}-byte record, got {actual} bytes")]
    Length { expected: usize, actual: usize },
}

/// Worker and collector process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Unit of execution could not be started
    #[error("Failed to spawn {role} {id}: {reason}")]
    SpawnFailed {
        role: &'static str,
        id: i32,
        reason: String,
    },

    /// Unit of execution panicked
    #[error("{role} {id} panicked")]
    Panicked { role: &'static str, id: i32 },

    /// Worker or collector stopped while the dispatcher was still running
    #[error("{role} {id} exited unexpectedly")]
    UnexpectedExit { role: &'static str, id: i32 },

    /// Shutdown timer could not be started
    #[error("Failed to arm shutdown timer: {0}")]
    Timer(#[source] std::io::Error),
}

/// Result type alias for DispatchError
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Result type alias for IpcError
pub type IpcResult<T> = std::result::Result<T, IpcError>;
