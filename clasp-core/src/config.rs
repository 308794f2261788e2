//! Solver configuration.
use anyhow::{bail, Error};
use serde::Deserialize;

use clasp_macros::DocDefault;

/// Configurable parameters used during solving.
#[derive(DocDefault)]
pub struct SolverConfig {
    /// Multiplicative decay for the VSIDS decision heuristic. (Default: 0.95)
    pub vsids_decay: f32,

    /// Multiplicative decay for clause activities. (Default: 0.999)
    pub clause_activity_decay: f32,

    /// Number of conflicts between local clause reductions. (Default: 15000)
    pub reduce_locals_interval: u64,

    /// Number of conflicts between mid clause reductions. (Default: 10000)
    pub reduce_mids_interval: u64,

    /// Scaling factor for luby sequence based restarts (number of conflicts). (Default: 128)
    pub luby_restart_interval_scale: u64,
}

impl SolverConfig {
    /// A human readable listing of every config option, its default and a short description.
    ///
    /// Used by the `-C help` command line option.
    pub fn help() -> String {
        let default = SolverConfig::default();
        format!(
            concat!(
                "vsids_decay = <FLOAT>\n",
                "    Multiplicative decay for the VSIDS decision heuristic. (Default: {})\n",
                "clause_activity_decay = <FLOAT>\n",
                "    Multiplicative decay for clause activities. (Default: {})\n",
                "reduce_locals_interval = <INT>\n",
                "    Number of conflicts between local clause reductions. (Default: {})\n",
                "reduce_mids_interval = <INT>\n",
                "    Number of conflicts between mid clause reductions. (Default: {})\n",
                "luby_restart_interval_scale = <INT>\n",
                "    Scaling factor for luby sequence based restarts. (Default: {})\n",
            ),
            default.vsids_decay,
            default.clause_activity_decay,
            default.reduce_locals_interval,
            default.reduce_mids_interval,
            default.luby_restart_interval_scale,
        )
    }
}

/// A partial update to a [`SolverConfig`].
///
/// Every field is optional so that multiple updates (a config file followed by `-C` overrides on
/// the command line, for example) can be merged before being applied to a solver.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfigUpdate {
    pub vsids_decay: Option<f32>,
    pub clause_activity_decay: Option<f32>,
    pub reduce_locals_interval: Option<u64>,
    pub reduce_mids_interval: Option<u64>,
    pub luby_restart_interval_scale: Option<u64>,
}

impl SolverConfigUpdate {
    /// An empty update that changes nothing.
    pub fn new() -> SolverConfigUpdate {
        SolverConfigUpdate::default()
    }

    /// Overwrite every field set in `other`, keeping the fields not present there.
    pub fn merge(&mut self, other: SolverConfigUpdate) {
        if other.vsids_decay.is_some() {
            self.vsids_decay = other.vsids_decay;
        }
        if other.clause_activity_decay.is_some() {
            self.clause_activity_decay = other.clause_activity_decay;
        }
        if other.reduce_locals_interval.is_some() {
            self.reduce_locals_interval = other.reduce_locals_interval;
        }
        if other.reduce_mids_interval.is_some() {
            self.reduce_mids_interval = other.reduce_mids_interval;
        }
        if other.luby_restart_interval_scale.is_some() {
            self.luby_restart_interval_scale = other.luby_restart_interval_scale;
        }
    }

    /// Apply this update to a config, validating the new values.
    pub fn apply_to(&self, config: &mut SolverConfig) -> Result<(), Error> {
        if let Some(vsids_decay) = self.vsids_decay {
            if !(0.0..1.0).contains(&vsids_decay) {
                bail!("vsids_decay must be between 0.0 and 1.0");
            }
            config.vsids_decay = vsids_decay;
        }
        if let Some(clause_activity_decay) = self.clause_activity_decay {
            if !(0.0..1.0).contains(&clause_activity_decay) {
                bail!("clause_activity_decay must be between 0.0 and 1.0");
            }
            config.clause_activity_decay = clause_activity_decay;
        }
        if let Some(reduce_locals_interval) = self.reduce_locals_interval {
            config.reduce_locals_interval = reduce_locals_interval;
        }
        if let Some(reduce_mids_interval) = self.reduce_mids_interval {
            config.reduce_mids_interval = reduce_mids_interval;
        }
        if let Some(luby_restart_interval_scale) = self.luby_restart_interval_scale {
            config.luby_restart_interval_scale = luby_restart_interval_scale;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_only_set_fields() {
        let mut update = SolverConfigUpdate::new();
        update.merge(SolverConfigUpdate {
            vsids_decay: Some(0.8),
            ..SolverConfigUpdate::default()
        });
        update.merge(SolverConfigUpdate {
            reduce_locals_interval: Some(42),
            ..SolverConfigUpdate::default()
        });

        assert_eq!(update.vsids_decay, Some(0.8));
        assert_eq!(update.reduce_locals_interval, Some(42));
        assert_eq!(update.clause_activity_decay, None);
    }

    #[test]
    fn apply_rejects_out_of_range_decay() {
        let mut config = SolverConfig::default();
        let update = SolverConfigUpdate {
            vsids_decay: Some(1.5),
            ..SolverConfigUpdate::default()
        };
        assert!(update.apply_to(&mut config).is_err());
    }
}
