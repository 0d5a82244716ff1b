//! # kiu-shared
//!
//! Domain types shared by the BorderKiu chat core: channel identifiers,
//! the closed message variant type, the record normalizer that turns loosely
//! typed history/live records into messages, and the transport protocol.

pub mod constants;
pub mod error;
pub mod message;
pub mod normalize;
pub mod protocol;
pub mod types;

pub use error::{KiuError, Result};
pub use message::{DedupKey, Message, MessageBody, TimestampSource};
pub use normalize::MessageNormalizer;
pub use protocol::{HistorySnapshot, TransportEvent};
pub use types::{ChannelId, ConnectionState};
