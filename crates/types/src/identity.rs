//! Fixed-length identifiers for accounts and documents.

use crate::error::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Length in bytes of every identifier.
pub const IDENTIFIER_LENGTH: usize = 32;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; IDENTIFIER_LENGTH]);

        impl $name {
            /// Create a new identifier from raw bytes.
            pub const fn new(bytes: [u8; IDENTIFIER_LENGTH]) -> Self {
                Self(bytes)
            }

            /// Try to create an identifier from a byte slice.
            pub fn try_from_slice(bytes: &[u8]) -> TypesResult<Self> {
                let inner: [u8; IDENTIFIER_LENGTH] = bytes.try_into().map_err(|_| {
                    TypesError::InvalidIdentifierLength {
                        expected: IDENTIFIER_LENGTH,
                        actual: bytes.len(),
                    }
                })?;
                Ok(Self(inner))
            }

            /// The raw bytes.
            pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LENGTH] {
                &self.0
            }

            /// Owned copy of the raw bytes.
            pub fn to_vec(&self) -> Vec<u8> {
                self.0.to_vec()
            }

            /// Generate a random identifier.
            #[cfg(any(test, feature = "test-utils"))]
            pub fn random() -> Self {
                Self(rand::random())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let stripped = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(stripped)?;
                Self::try_from_slice(&bytes)
            }
        }

        // hex strings for config files, raw bytes on the wire
        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.collect_str(self)
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    Self::from_str(&s).map_err(serde::de::Error::custom)
                } else {
                    <[u8; IDENTIFIER_LENGTH]>::deserialize(deserializer).map(Self)
                }
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; IDENTIFIER_LENGTH]> for $name {
            fn from(bytes: [u8; IDENTIFIER_LENGTH]) -> Self {
                Self(bytes)
            }
        }
    };
}

identifier!(
    /// Identity of an account hosted by a node.
    ///
    /// Protocol ids embed the account identity so one node can serve many accounts.
    AccountId
);

identifier!(
    /// Identifier of a document or one of its versions.
    DocumentId
);

impl AccountId {
    /// Lowercase hex without prefix, as embedded in protocol ids.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}
