//! Wire types of the HTTP API, shared by the routes and the polling client.

use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod catalog;
pub mod health;
pub mod player;
pub mod room;
pub mod sse;
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
