//! `BuildReport.elapsed` on the wire: whole milliseconds under `elapsed_ms`,
//! so `imsim build` output is easy to consume from scripts.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Builds longer than `u64::MAX` ms saturate instead of wrapping.
pub fn serialize<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
