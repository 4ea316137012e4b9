//! Protocol descriptors and the immutable protocol table.
//!
//! The table is static configuration: it is built once (from defaults or a
//! TOML file), validated, and then handed to the pipeline by reference.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// One tracked protocol and where its data comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolDescriptor {
    /// Short identifier, e.g. `"aave"`.
    pub key: String,
    /// Display name; also the protocol half of the history natural key.
    pub name: String,
    pub chain: String,
    pub category: String,
    /// Valuation provider coin id (`/coins/{id}`).
    pub valuation_id: String,
    /// Revenue provider slug (`/summary/fees/{slug}`). Absent when the
    /// provider does not list the protocol.
    #[serde(default)]
    pub revenue_slug: Option<String>,
    /// Manually maintained annual revenue in USD. Takes precedence over the
    /// revenue endpoint when set.
    #[serde(default, rename = "manual_revenue")]
    pub manual_annual_revenue: Option<f64>,
}

/// How the revenue side of a protocol is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RevenuePlan<'a> {
    /// Synthesize from a manually configured annual figure.
    Manual(f64),
    /// Fetch from the revenue provider using this slug.
    Endpoint(&'a str),
    /// Neither an endpoint nor an override is configured.
    Missing,
}

impl ProtocolDescriptor {
    pub fn revenue_plan(&self) -> RevenuePlan<'_> {
        if let Some(annual) = self.manual_annual_revenue {
            return RevenuePlan::Manual(annual);
        }
        match self.revenue_slug.as_deref() {
            Some(slug) if !slug.trim().is_empty() => RevenuePlan::Endpoint(slug),
            _ => RevenuePlan::Missing,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolTableError {
    #[error("protocol table is empty")]
    Empty,

    #[error("duplicate protocol key '{0}'")]
    DuplicateKey(String),

    #[error("duplicate protocol name '{0}' (names key the history table)")]
    DuplicateName(String),

    #[error("protocol '{key}': {reason}")]
    InvalidDescriptor { key: String, reason: String },
}

/// Validated, ordered set of protocols processed by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolTable {
    protocols: Vec<ProtocolDescriptor>,
}

impl ProtocolTable {
    /// Build a table, rejecting empty tables, duplicate keys or names, and
    /// descriptors with unusable fields.
    pub fn new(protocols: Vec<ProtocolDescriptor>) -> Result<Self, ProtocolTableError> {
        if protocols.is_empty() {
            return Err(ProtocolTableError::Empty);
        }

        let mut keys = HashSet::new();
        let mut names = HashSet::new();
        for p in &protocols {
            if p.key.trim().is_empty() {
                return Err(ProtocolTableError::InvalidDescriptor {
                    key: p.key.clone(),
                    reason: "key is empty".into(),
                });
            }
            if p.name.trim().is_empty() {
                return Err(ProtocolTableError::InvalidDescriptor {
                    key: p.key.clone(),
                    reason: "name is empty".into(),
                });
            }
            if p.valuation_id.trim().is_empty() {
                return Err(ProtocolTableError::InvalidDescriptor {
                    key: p.key.clone(),
                    reason: "valuation_id is empty".into(),
                });
            }
            if let Some(manual) = p.manual_annual_revenue {
                if !manual.is_finite() || manual <= 0.0 {
                    return Err(ProtocolTableError::InvalidDescriptor {
                        key: p.key.clone(),
                        reason: format!("manual_revenue must be a positive number, got {manual}"),
                    });
                }
            }
            if !keys.insert(p.key.as_str()) {
                return Err(ProtocolTableError::DuplicateKey(p.key.clone()));
            }
            if !names.insert(p.name.as_str()) {
                return Err(ProtocolTableError::DuplicateName(p.name.clone()));
            }
        }

        Ok(Self { protocols })
    }

    /// The built-in five-protocol table.
    pub fn builtin() -> Self {
        Self {
            protocols: builtin_protocols(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtocolDescriptor> {
        self.protocols.iter()
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Look up a protocol by key or display name (case-insensitive).
    pub fn find(&self, key_or_name: &str) -> Option<&ProtocolDescriptor> {
        self.protocols.iter().find(|p| {
            p.key.eq_ignore_ascii_case(key_or_name) || p.name.eq_ignore_ascii_case(key_or_name)
        })
    }
}

/// Default tracked protocols.
pub fn builtin_protocols() -> Vec<ProtocolDescriptor> {
    fn descriptor(
        key: &str,
        name: &str,
        chain: &str,
        category: &str,
        valuation_id: &str,
        revenue_slug: Option<&str>,
        manual: Option<f64>,
    ) -> ProtocolDescriptor {
        ProtocolDescriptor {
            key: key.into(),
            name: name.into(),
            chain: chain.into(),
            category: category.into(),
            valuation_id: valuation_id.into(),
            revenue_slug: revenue_slug.map(String::from),
            manual_annual_revenue: manual,
        }
    }

    vec![
        descriptor(
            "hyperliquid",
            "Hyperliquid",
            "Hyperliquid L1",
            "Derivatives",
            "hyperliquid",
            Some("hyperliquid"),
            None,
        ),
        descriptor(
            "pump",
            "Pump.fun",
            "Solana",
            "Launchpad",
            "pump-fun",
            None,
            Some(492_000_000.0),
        ),
        descriptor(
            "ethena",
            "Ethena",
            "Ethereum",
            "Stablecoin",
            "ethena",
            Some("ethena"),
            None,
        ),
        descriptor("aave", "Aave", "Multi-chain", "Lending", "aave", Some("aave"), None),
        descriptor(
            "metadao",
            "MetaDAO",
            "Solana",
            "DAO",
            "meta-2",
            Some("metadao"),
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_valid() {
        let table = ProtocolTable::new(builtin_protocols()).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table, ProtocolTable::builtin());
    }

    #[test]
    fn manual_revenue_takes_precedence() {
        let mut p = builtin_protocols().remove(1);
        assert_eq!(p.revenue_plan(), RevenuePlan::Manual(492_000_000.0));
        p.revenue_slug = Some("pump".into());
        assert_eq!(p.revenue_plan(), RevenuePlan::Manual(492_000_000.0));
    }

    #[test]
    fn missing_revenue_source_is_reported() {
        let mut p = builtin_protocols().remove(0);
        p.revenue_slug = None;
        assert_eq!(p.revenue_plan(), RevenuePlan::Missing);
        p.revenue_slug = Some("  ".into());
        assert_eq!(p.revenue_plan(), RevenuePlan::Missing);
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut protocols = builtin_protocols();
        protocols[1].name = "Aave".into();
        assert_eq!(
            ProtocolTable::new(protocols).unwrap_err(),
            ProtocolTableError::DuplicateName("Aave".into())
        );
    }

    #[test]
    fn rejects_duplicate_keys() {
        let mut protocols = builtin_protocols();
        protocols[4].key = "aave".into();
        assert_eq!(
            ProtocolTable::new(protocols).unwrap_err(),
            ProtocolTableError::DuplicateKey("aave".into())
        );
    }

    #[test]
    fn rejects_non_positive_manual_revenue() {
        let mut protocols = builtin_protocols();
        protocols[1].manual_annual_revenue = Some(0.0);
        assert!(matches!(
            ProtocolTable::new(protocols),
            Err(ProtocolTableError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn rejects_empty_table() {
        assert_eq!(ProtocolTable::new(vec![]).unwrap_err(), ProtocolTableError::Empty);
    }

    #[test]
    fn find_by_key_or_name() {
        let table = ProtocolTable::builtin();
        assert_eq!(table.find("pump").unwrap().name, "Pump.fun");
        assert_eq!(table.find("pump.fun").unwrap().key, "pump");
        assert!(table.find("uniswap").is_none());
    }
}
