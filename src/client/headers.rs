//! Protocol header names and fixed values

/// Bearer-token authorization header
pub const AUTHORIZATION: &str = "Authorization";

/// Protocol version header
pub const API_VERSION: &str = "X-Tide-Api-Version";

/// Fixed protocol version this crate speaks
pub const API_VERSION_VALUE: &str = "4";

/// Driver identity header
pub const DRIVER: &str = "X-Tide-Driver";

/// Fixed driver identity
pub const DRIVER_VALUE: &str = "tidewire-rust";

/// Causal watermark header: latest transaction time seen by this client
pub const LAST_SEEN_TXN: &str = "X-Last-Seen-Txn";

/// Server-side query deadline header, in milliseconds
pub const QUERY_TIMEOUT: &str = "X-Query-Timeout";

/// Response header carrying the transaction time of the answered request
pub const TXN_TIME: &str = "X-Txn-Time";
