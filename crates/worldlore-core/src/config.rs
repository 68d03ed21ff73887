//! Knowledge engine configuration.
//!
//! Loaded either straight from the environment ([`KnowledgeConfig::from_env`]) or layered with the
//! `config` crate ([`KnowledgeConfig::load`]): defaults, then an optional TOML file, then
//! `WORLDLORE__*` overrides. Invalid values are clamped, never rejected, so a store is always
//! constructible.

use crate::error::KnowledgeResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MIN_CELL_SIZE: f32 = 1.0;
pub const MIN_EXPIRATION_INTERVAL_SECS: f64 = 0.1;

fn default_true() -> bool {
    true
}

fn default_spatial_cell_size() -> f32 {
    1000.0
}

fn default_broadcast_radius() -> f32 {
    5000.0
}

fn default_expiration_interval_secs() -> f64 {
    5.0
}

/// Knowledge store configuration.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | WORLDLORE_SPATIAL_CELL_SIZE | 1000 | Spatial grid cell edge, world units (min 1). |
/// | WORLDLORE_DEFAULT_BROADCAST_RADIUS | 5000 | Spatial event radius when a record sets none. |
/// | WORLDLORE_EXPIRATION_INTERVAL_SECS | 5 | Seconds between expiration sweeps (min 0.1). |
/// | WORLDLORE_BROADCAST_GLOBAL | true | Deliver events on the global channel. |
/// | WORLDLORE_BROADCAST_SPATIAL | true | Deliver events on the spatial channel. |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_spatial_cell_size")]
    pub spatial_cell_size: f32,
    #[serde(default = "default_broadcast_radius")]
    pub default_broadcast_radius: f32,
    #[serde(default = "default_expiration_interval_secs")]
    pub expiration_interval_secs: f64,
    #[serde(default = "default_true")]
    pub broadcast_global: bool,
    #[serde(default = "default_true")]
    pub broadcast_spatial: bool,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            spatial_cell_size: default_spatial_cell_size(),
            default_broadcast_radius: default_broadcast_radius(),
            expiration_interval_secs: default_expiration_interval_secs(),
            broadcast_global: true,
            broadcast_spatial: true,
        }
    }
}

impl KnowledgeConfig {
    /// Load from environment. Unset or invalid => defaults (see struct docs).
    pub fn from_env() -> Self {
        Self {
            spatial_cell_size: env_parse("WORLDLORE_SPATIAL_CELL_SIZE", default_spatial_cell_size()),
            default_broadcast_radius: env_parse(
                "WORLDLORE_DEFAULT_BROADCAST_RADIUS",
                default_broadcast_radius(),
            ),
            expiration_interval_secs: env_parse(
                "WORLDLORE_EXPIRATION_INTERVAL_SECS",
                default_expiration_interval_secs(),
            ),
            broadcast_global: env_bool("WORLDLORE_BROADCAST_GLOBAL", true),
            broadcast_spatial: env_bool("WORLDLORE_BROADCAST_SPATIAL", true),
        }
        .sanitized()
    }

    /// Layered load: defaults, then `$WORLDLORE_CONFIG` (or `config/worldlore.toml`) if it exists,
    /// then `WORLDLORE__*` environment overrides.
    pub fn load() -> KnowledgeResult<Self> {
        let path = std::env::var("WORLDLORE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/worldlore.toml"));
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> KnowledgeResult<Self> {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("spatial_cell_size", f64::from(defaults.spatial_cell_size))?
            .set_default(
                "default_broadcast_radius",
                f64::from(defaults.default_broadcast_radius),
            )?
            .set_default("expiration_interval_secs", defaults.expiration_interval_secs)?
            .set_default("broadcast_global", defaults.broadcast_global)?
            .set_default("broadcast_spatial", defaults.broadcast_spatial)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("WORLDLORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = built.try_deserialize()?;
        Ok(loaded.sanitized())
    }

    /// Clamps out-of-range values to the nearest sane setting.
    pub fn sanitized(mut self) -> Self {
        if !(self.spatial_cell_size >= MIN_CELL_SIZE) {
            tracing::warn!(
                target: "worldlore::knowledge",
                value = self.spatial_cell_size,
                "spatial_cell_size below minimum, clamping"
            );
            self.spatial_cell_size = MIN_CELL_SIZE;
        }
        if !(self.default_broadcast_radius >= 0.0) {
            tracing::warn!(
                target: "worldlore::knowledge",
                value = self.default_broadcast_radius,
                "default_broadcast_radius negative, clamping"
            );
            self.default_broadcast_radius = 0.0;
        }
        if !(self.expiration_interval_secs >= MIN_EXPIRATION_INTERVAL_SECS) {
            tracing::warn!(
                target: "worldlore::knowledge",
                value = self.expiration_interval_secs,
                "expiration_interval_secs below minimum, clamping"
            );
            self.expiration_interval_secs = MIN_EXPIRATION_INTERVAL_SECS;
        }
        self
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim();
            if v.is_empty() {
                default
            } else {
                v.eq_ignore_ascii_case("true") || v == "1"
            }
        }
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = KnowledgeConfig::default();
        assert_eq!(cfg.spatial_cell_size, 1000.0);
        assert_eq!(cfg.default_broadcast_radius, 5000.0);
        assert_eq!(cfg.expiration_interval_secs, 5.0);
        assert!(cfg.broadcast_global && cfg.broadcast_spatial);
    }

    #[test]
    fn sanitized_clamps_instead_of_rejecting() {
        let cfg = KnowledgeConfig {
            spatial_cell_size: -5.0,
            default_broadcast_radius: f32::NAN,
            expiration_interval_secs: 0.0,
            ..KnowledgeConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.spatial_cell_size, MIN_CELL_SIZE);
        assert_eq!(cfg.default_broadcast_radius, 0.0);
        assert_eq!(cfg.expiration_interval_secs, MIN_EXPIRATION_INTERVAL_SECS);
    }

    #[test]
    fn partial_toml_keeps_field_defaults() {
        let cfg: KnowledgeConfig = toml::from_str("spatial_cell_size = 250.0").expect("parse");
        assert_eq!(cfg.spatial_cell_size, 250.0);
        assert_eq!(cfg.default_broadcast_radius, 5000.0);
    }
}
