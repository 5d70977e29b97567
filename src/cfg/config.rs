// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, fs, path::Path};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level YAML configuration for the registry/dispatch core, loaded and
/// validated the same way the iSCSI client's own `Config` is: parse, then
/// `validate_and_normalize`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RegistryConfig {
    /// Position-space sizing.
    pub fields: FieldsConfig,
    /// `custom-fields-remap` section: `old_expression -> { match_expression:
    /// new_expression }`.
    #[serde(default, rename = "custom-fields-remap")]
    pub custom_fields_remap: HashMap<String, HashMap<String, String>>,
    /// Object-store tuning (capacity hints only; the store itself has no
    /// persistence layer in scope).
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FieldsConfig {
    /// Total number of real field positions (`FIELDS_MAX`); must be a
    /// power of two.
    #[serde(rename = "FieldsMax")]
    pub fields_max: u32,
    /// Per-field string length cap before truncation kicks in.
    #[serde(default = "default_max_element_size", rename = "MaxElementSize")]
    pub max_element_size: usize,
}

fn default_max_element_size() -> usize {
    crate::field::store::MAX_ELEMENT_SIZE
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ObjectStoreConfig {
    /// Soft cap on distinct objects per session field before a session gets
    /// tagged rather than silently growing unbounded.
    #[serde(default, rename = "MaxObjectsPerField")]
    pub max_objects_per_field: Option<u32>,
}

impl RegistryConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.as_ref().display()))?;
        let mut cfg: RegistryConfig =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.fields.fields_max.is_power_of_two(),
            "FieldsMax must be a power of two, got {}",
            self.fields.fields_max
        );
        ensure!(
            self.fields.max_element_size > 0,
            "MaxElementSize must be > 0"
        );

        for (old_expr, matches) in &self.custom_fields_remap {
            ensure!(
                !old_expr.is_empty(),
                "custom-fields-remap entries must name a non-empty source expression"
            );
            for (match_expr, new_expr) in matches {
                ensure!(
                    !match_expr.is_empty() && !new_expr.is_empty(),
                    "custom-fields-remap[{old_expr}] has an empty match or target expression"
                );
            }
        }

        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            fields: FieldsConfig {
                fields_max: crate::field::registry::FIELDS_MAX,
                max_element_size: default_max_element_size(),
            },
            custom_fields_remap: HashMap::new(),
            object_store: ObjectStoreConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let mut cfg = RegistryConfig::default();
        cfg.validate_and_normalize().expect("default config valid");
    }

    #[test]
    fn rejects_non_power_of_two_fields_max() {
        let mut cfg = RegistryConfig::default();
        cfg.fields.fields_max = 100;
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn rejects_empty_remap_expressions() {
        let mut cfg = RegistryConfig::default();
        cfg.custom_fields_remap
            .insert("sip.from".to_string(), HashMap::from([("sip".to_string(), "".to_string())]));
        assert!(cfg.validate_and_normalize().is_err());
    }
}
