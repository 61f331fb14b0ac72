//! Versioned envelope for serialized data.
//!
//! All data persisted to the event store or object store is wrapped in a
//! versioned envelope so the format can evolve without breaking stored
//! runs or in-flight work items during rolling deployments.

use serde::{Deserialize, Serialize};

/// The current envelope version.
pub const CURRENT_VERSION: u32 = 1;

/// A versioned envelope that wraps serialized data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The version of the envelope format.
    pub version: u32,
    /// The wrapped payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current version.
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION,
            payload,
        }
    }

    /// Unwraps the envelope, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Returns a reference to the payload.
    #[must_use]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Returns true if this envelope uses the current version.
    #[must_use]
    pub fn is_current_version(&self) -> bool {
        self.version == CURRENT_VERSION
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl<T: for<'de> Deserialize<'de>> Envelope<T> {
    /// Deserializes an envelope from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
