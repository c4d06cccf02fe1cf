use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::extract::Direction;
use crate::layout::{LayoutConfig, RepulsionLaw};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("maxHops must be at least 1")]
    ZeroHops,
    #[error("settleTicks must be at least 1")]
    ZeroSettleTicks,
    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidStrength { name: &'static str, value: f32 },
    #[error("damping must be in (0, 1] (got {0})")]
    InvalidDamping(f32),
    #[error("tickInterval must be a positive number of seconds (got {0})")]
    InvalidTickInterval(f32),
    #[error("unknown direction `{0}` (expected outgoing, incoming or both)")]
    UnknownDirection(String),
    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON")]
    Json(#[from] serde_json::Error),
}

/// Every option the core recognizes. Missing keys fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalGraphConfig {
    pub max_hops: usize,
    pub direction: Direction,
    pub repulsion_strength: f32,
    pub repulsion_law: RepulsionLaw,
    pub spring_stiffness: f32,
    pub spring_length: f32,
    pub centering_strength: f32,
    pub focal_strength: f32,
    pub convergence_threshold: f32,
    pub settle_ticks: u32,
    /// Seconds between host ticks.
    pub tick_interval: f32,
    pub damping: f32,
    pub max_displacement: f32,
    pub partition_threshold: usize,
    pub reheat_alpha: f32,
    pub drag_alpha: f32,
    pub alpha_decay: f32,
    pub jitter: f32,
    pub seed: u64,
}

impl Default for LocalGraphConfig {
    fn default() -> Self {
        Self {
            max_hops: 1,
            direction: Direction::Both,
            repulsion_strength: 4_200.0,
            repulsion_law: RepulsionLaw::InverseSquare,
            spring_stiffness: 0.08,
            spring_length: 90.0,
            centering_strength: 0.005,
            focal_strength: 0.03,
            convergence_threshold: 0.05,
            settle_ticks: 20,
            tick_interval: 1.0 / 60.0,
            damping: 0.82,
            max_displacement: 24.0,
            partition_threshold: 64,
            reheat_alpha: 1.0,
            drag_alpha: 0.3,
            alpha_decay: 0.02,
            jitter: 12.0,
            seed: 0x5eed,
        }
    }
}

impl LocalGraphConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_hops == 0 {
            return Err(ConfigError::ZeroHops);
        }
        if self.settle_ticks == 0 {
            return Err(ConfigError::ZeroSettleTicks);
        }

        let strengths = [
            ("repulsionStrength", self.repulsion_strength),
            ("springStiffness", self.spring_stiffness),
            ("springLength", self.spring_length),
            ("centeringStrength", self.centering_strength),
            ("focalStrength", self.focal_strength),
            ("convergenceThreshold", self.convergence_threshold),
            ("maxDisplacement", self.max_displacement),
            ("reheatAlpha", self.reheat_alpha),
            ("dragAlpha", self.drag_alpha),
            ("alphaDecay", self.alpha_decay),
            ("jitter", self.jitter),
        ];
        for (name, value) in strengths {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidStrength { name, value });
            }
        }

        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(ConfigError::InvalidDamping(self.damping));
        }
        if !(self.tick_interval.is_finite() && self.tick_interval > 0.0) {
            return Err(ConfigError::InvalidTickInterval(self.tick_interval));
        }

        Ok(())
    }

    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig {
            repulsion_strength: self.repulsion_strength,
            repulsion_law: self.repulsion_law,
            spring_stiffness: self.spring_stiffness,
            spring_length: self.spring_length,
            centering_strength: self.centering_strength,
            focal_strength: self.focal_strength,
            convergence_threshold: self.convergence_threshold,
            settle_ticks: self.settle_ticks,
            damping: self.damping,
            max_displacement: self.max_displacement,
            partition_threshold: self.partition_threshold,
            reheat_alpha: self.reheat_alpha,
            alpha_decay: self.alpha_decay,
            jitter: self.jitter,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LocalGraphConfig::from_json_str(
            r#"{ "maxHops": 2, "direction": "outgoing", "repulsionLaw": "inverseLinear" }"#,
        )
        .expect("config parses");

        assert_eq!(config.max_hops, 2);
        assert_eq!(config.direction, Direction::Outgoing);
        assert_eq!(config.repulsion_law, RepulsionLaw::InverseLinear);
        assert_eq!(config.spring_length, LocalGraphConfig::default().spring_length);
    }

    #[test]
    fn zero_hops_is_rejected() {
        let error = LocalGraphConfig::from_json_str(r#"{ "maxHops": 0 }"#)
            .expect_err("maxHops 0 must fail");
        assert!(matches!(error, ConfigError::ZeroHops));
    }

    #[test]
    fn zero_settle_ticks_is_rejected() {
        let error = LocalGraphConfig::from_json_str(r#"{ "settleTicks": 0 }"#)
            .expect_err("settleTicks 0 must fail");
        assert!(matches!(error, ConfigError::ZeroSettleTicks));
        assert!(LocalGraphConfig::from_json_str(r#"{ "settleTicks": 1 }"#).is_ok());
    }

    #[test]
    fn negative_strength_names_the_option() {
        let config = LocalGraphConfig {
            centering_strength: -1.0,
            ..Default::default()
        };
        let error = config.validate().expect_err("negative strength must fail");
        assert_eq!(
            error.to_string(),
            "centeringStrength must be a finite, non-negative number (got -1)"
        );
    }

    #[test]
    fn damping_and_tick_interval_bounds() {
        let config = LocalGraphConfig {
            damping: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDamping(_))));

        let config = LocalGraphConfig {
            tick_interval: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTickInterval(_))
        ));
    }
}
