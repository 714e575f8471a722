// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative egress items pushed by the control plane.

use serde::{Deserialize, Serialize};

use crate::proxy::{EgressId, ProxyVariant};

/// Per-protocol configuration, represented as a tagged union rather than a
/// schemaless key-value map. The deserialiser selects the concrete record
/// type from `protocol`; unknown keys inside a known variant are ignored by
/// serde's default struct deserialisation, keeping the wire format forward
/// compatible.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolConfig {
    Shadowsocks2022 {
        method: String,
        password: String,
        #[serde(default)]
        port: Option<u16>,
    },
    Trojan {
        password: String,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        sni: Option<String>,
    },
    Snell {
        psk: String,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        obfs: Option<String>,
    },
}

impl ProtocolConfig {
    pub fn variant(&self) -> ProxyVariant {
        match self {
            ProtocolConfig::Shadowsocks2022 { .. } => ProxyVariant::Shadowsocks2022,
            ProtocolConfig::Trojan { .. } => ProxyVariant::Trojan,
            ProtocolConfig::Snell { .. } => ProxyVariant::Snell,
        }
    }
}

/// Optional server-side overrides layered onto a protocol config at
/// reconcile time (port, password).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EgressOverrides {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: Option<String>,
}

/// One item in an `EGRESS_CONFIG` push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredEgressItem {
    pub egress_id: EgressId,
    #[serde(flatten)]
    pub config: ProtocolConfig,
    #[serde(default)]
    pub overrides: EgressOverrides,
}

impl DeclaredEgressItem {
    pub fn variant(&self) -> ProxyVariant {
        self.config.variant()
    }

    /// Apply server-side overrides onto the config blob, preferring the
    /// override value when present.
    pub fn effective_config(&self) -> ProtocolConfig {
        let mut cfg = self.config.clone();
        match (&mut cfg, &self.overrides) {
            (ProtocolConfig::Shadowsocks2022 { password, port, .. }, overrides) => {
                if let Some(p) = &overrides.password {
                    *password = p.clone();
                }
                if overrides.port.is_some() {
                    *port = overrides.port;
                }
            }
            (ProtocolConfig::Trojan { password, port, .. }, overrides) => {
                if let Some(p) = &overrides.password {
                    *password = p.clone();
                }
                if overrides.port.is_some() {
                    *port = overrides.port;
                }
            }
            (ProtocolConfig::Snell { psk, port, .. }, overrides) => {
                if let Some(p) = &overrides.password {
                    *psk = p.clone();
                }
                if overrides.port.is_some() {
                    *port = overrides.port;
                }
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence_over_declared_password() {
        let item = DeclaredEgressItem {
            egress_id: EgressId::from("e1"),
            config: ProtocolConfig::Shadowsocks2022 {
                method: "2022-blake3-aes-256-gcm".into(),
                password: "original".into(),
                port: Some(8388),
            },
            overrides: EgressOverrides { port: Some(9000), password: Some("overridden".into()) },
        };
        let effective = item.effective_config();
        match effective {
            ProtocolConfig::Shadowsocks2022 { password, port, .. } => {
                assert_eq!(password, "overridden");
                assert_eq!(port, Some(9000));
            }
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn variant_matches_config_tag() {
        let item = DeclaredEgressItem {
            egress_id: EgressId::from("e1"),
            config: ProtocolConfig::Trojan { password: "p".into(), port: None, sni: None },
            overrides: EgressOverrides::default(),
        };
        assert_eq!(item.variant(), ProxyVariant::Trojan);
    }
}
