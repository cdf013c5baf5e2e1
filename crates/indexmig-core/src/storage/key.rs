//! Key encoding for per-tenant records.

use crate::error::Error;
use std::fmt;

/// Separator between the tenant and feature components.
const SEPARATOR: u8 = 0x00;

/// Key of a per-tenant, per-feature record.
///
/// Key format: `[tenant][0x00][feature]`
///
/// Tenant and feature names containing a NUL byte are rejected, so all keys of
/// one tenant share the prefix `[tenant][0x00]`, a prefix scan lists exactly
/// that tenant and no two distinct pairs encode to the same bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    /// Tenant name.
    pub tenant: String,
    /// Feature identifier.
    pub feature: String,
}

impl RecordKey {
    /// Create a new record key.
    pub fn new(tenant: impl Into<String>, feature: impl Into<String>) -> Result<Self, Error> {
        let tenant = tenant.into();
        let feature = feature.into();
        check_component("tenant", &tenant)?;
        check_component("feature", &feature)?;
        Ok(Self { tenant, feature })
    }

    /// Encode the key to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.tenant.len() + 1 + self.feature.len());
        buf.extend_from_slice(self.tenant.as_bytes());
        buf.push(SEPARATOR);
        buf.extend_from_slice(self.feature.as_bytes());
        buf
    }

    /// Decode a key from bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let split = bytes.iter().position(|b| *b == SEPARATOR)?;
        let tenant = std::str::from_utf8(&bytes[..split]).ok()?;
        let feature = std::str::from_utf8(&bytes[split + 1..]).ok()?;
        Self::new(tenant, feature).ok()
    }

    /// Prefix shared by every key of a tenant.
    pub fn tenant_prefix(tenant: &str) -> Result<Vec<u8>, Error> {
        check_component("tenant", tenant)?;
        let mut buf = Vec::with_capacity(tenant.len() + 1);
        buf.extend_from_slice(tenant.as_bytes());
        buf.push(SEPARATOR);
        Ok(buf)
    }
}

fn check_component(what: &str, value: &str) -> Result<(), Error> {
    if value.as_bytes().contains(&SEPARATOR) {
        return Err(Error::InvalidData(format!(
            "{} name contains a NUL byte: {:?}",
            what, value
        )));
    }
    Ok(())
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.feature)
    }
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
