/// Username used when a record does not carry one.
pub const ANONYMOUS: &str = "Anonymous";

/// Unread counts above this are shown as "9+" on compact badges.
pub const COMPACT_BADGE_CAP: u32 = 9;

/// Unread counts above this are shown as "99+" on list badges.
pub const LIST_BADGE_CAP: u32 = 99;

/// Delay before re-fetching history after a confirmed send (absorbs the echo).
pub const SEND_REFRESH_DELAY_MS: u64 = 500;

/// Numeric timestamps below this are Unix seconds, otherwise milliseconds.
pub const SECONDS_TIMESTAMP_LIMIT: i64 = 100_000_000_000;

/// Default buffer size for per-channel event and command queues.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Live feed event names.
pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_CHAT_MESSAGE: &str = "chat message";
pub const EVENT_HISTORY: &str = "history";
pub const EVENT_CHAT_HISTORY: &str = "chat history";
pub const EVENT_USER_COUNT: &str = "user count";
pub const EVENT_JOIN: &str = "join";
