//! Data models shared across the server.

pub mod data;
pub mod memo;
pub mod platform;

pub use data::{DataEnvelope, QueryRows, Row};
pub use memo::{InsightMemo, MEMO_DESCRIPTION, MEMO_NAME, MEMO_URI};
pub use platform::Platform;
