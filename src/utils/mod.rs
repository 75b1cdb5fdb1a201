//! Helpers shared by the endpoint modules.

pub mod join;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_server;

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// RFC 3339 timestamp stamped on every payload.
pub fn timestamp(now: OffsetDateTime) -> String {
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
