use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllowlistBlock {
    pub ip_block: String,
    pub org_id: String,
    pub created_at: DateTime<Utc>,
}

impl AllowlistBlock {
    pub fn new(ip_block: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            ip_block: ip_block.into(),
            org_id: org_id.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AllowlistRequest {
    pub ip_block: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DenyQuery {
    pub block: Option<String>,
}

/// Parses a CIDR block. A bare address becomes a host route (/32 or /128).
pub fn parse_block(raw: &str) -> Result<IpNetwork, String> {
    raw.trim()
        .parse::<IpNetwork>()
        .map_err(|e| format!("invalid ip block [{}]: {}", raw, e))
}

/// Canonical text stored for a block, always carrying an explicit prefix.
pub fn normalize_block(raw: &str) -> Result<String, String> {
    parse_block(raw).map(|network| network.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_addresses_become_host_routes() {
        assert_eq!(normalize_block("10.0.0.5").unwrap(), "10.0.0.5/32");
        assert_eq!(normalize_block("::1").unwrap(), "::1/128");
        assert_eq!(normalize_block("10.0.0.0/24").unwrap(), "10.0.0.0/24");
    }

    #[test]
    fn test_malformed_block_rejected() {
        assert!(normalize_block("10.0.0.300/24").is_err());
        assert!(normalize_block("10.0.0.0/40").is_err());
        assert!(normalize_block("not-an-ip").is_err());
    }
}
