//! Type-safe wrappers for Discord snowflake IDs
//!
//! Communities, destinations and messages are all plain `u64` snowflakes on
//! the wire. Wrapping them keeps a channel ID from being passed where a
//! message ID is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Bit-preserving conversion for SQLite `INTEGER` columns
            pub const fn as_i64(self) -> i64 {
                self.0 as i64
            }

            pub const fn from_i64(raw: i64) -> Self {
                Self(raw as u64)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self::new(id)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// A community (Discord guild) subscribed to the roster feed
    CommunityId
);

snowflake_id!(
    /// The channel a roster message is posted in
    DestinationId
);

snowflake_id!(
    /// A posted roster message
    MessageId
);

impl DestinationId {
    /// Channel mention markup, e.g. `<#123>`
    pub fn mention(self) -> String {
        format!("<#{}>", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: CommunityId = " 1234567890 ".parse().unwrap();
        assert_eq!(id.get(), 1234567890);
        assert_eq!(id.to_string(), "1234567890");
        assert!("not-a-number".parse::<MessageId>().is_err());
    }

    #[test]
    fn test_i64_round_trip_keeps_high_bit() {
        let id = MessageId::new(u64::MAX - 7);
        assert_eq!(MessageId::from_i64(id.as_i64()), id);
    }

    #[test]
    fn test_mention() {
        assert_eq!(DestinationId::new(42).mention(), "<#42>");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&MessageId::new(99)).unwrap();
        assert_eq!(json, "99");
    }
}
