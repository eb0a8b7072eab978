use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque camera identifier, unique per configured source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(String);

impl CameraId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CameraId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Numeric slot ids render as their decimal form
impl From<u32> for CameraId {
    fn from(slot: u32) -> Self {
        Self(slot.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_ids_match_string_ids() {
        assert_eq!(CameraId::from(7u32), CameraId::from("7"));
        assert_eq!(CameraId::from(7u32).to_string(), "7");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&CameraId::from("front")).unwrap();
        assert_eq!(json, "\"front\"");
    }
}
