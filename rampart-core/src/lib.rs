//! Rampart Core - Data Types and Policies
//!
//! Pure data structures shared by the cache and client crates: the error
//! taxonomy, configuration, retry policy, provisional identity and the
//! purchase order records built optimistically on the client.

pub mod config;
pub mod entities;
pub mod error;
pub mod identity;
pub mod retry;

pub use config::{
    CacheSettings, LoggingSettings, RampartConfig, RetrySettings, DEFAULT_CACHE_TTL,
    DEFAULT_SWEEP_INTERVAL,
};
pub use entities::{LineItem, LineItemInput, PurchaseOrder, PurchaseOrderInput};
pub use error::{
    ConfigError, ErrorKind, RampartError, RampartResult, Retryable, TransportError,
    ValidationError,
};
pub use identity::{
    generate_provisional_id, is_provisional_id, is_provisional_value, ProvisionalId, RecordId,
    Timestamp, PROVISIONAL_PREFIX,
};
pub use retry::{RetryPolicy, RetryPreset};
