//! The fluid update sequence as data.
//!
//! One `update` call is exactly one traversal of [`STAGES`], in order. Each
//! stage names its kernel entry point and the field pairs it swaps after
//! dispatch; the driver loop in `fluid::mod` owns the dispatch-then-swap
//! discipline so pass ordering is a table, not scattered procedural code.

use crate::field::FieldId;

/// How often a stage's dispatch-then-swap body runs per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    /// Repeated `FluidVolumeDesc::pressure_iterations` times. The swap
    /// happens inside the loop body so each iteration reads the previous
    /// iteration's result.
    PressureIterations,
}

pub struct StageDesc {
    pub name: &'static str,
    /// WGSL entry point in `shaders/volume.wgsl`.
    pub entry_point: &'static str,
    /// Pairs whose roles are exchanged after each dispatch of this stage.
    pub swaps: &'static [FieldId],
    pub repeat: Repeat,
}

pub const STAGES: &[StageDesc] = &[
    StageDesc {
        name: "inject",
        entry_point: "inject",
        swaps: &[FieldId::Velocity, FieldId::Density, FieldId::Temperature],
        repeat: Repeat::Once,
    },
    StageDesc {
        name: "advect",
        // Self-advection must sample the pre-advection velocity, so all
        // advected quantities swap together after the single dispatch.
        entry_point: "advect",
        swaps: &[
            FieldId::Velocity,
            FieldId::Pressure,
            FieldId::Density,
            FieldId::Temperature,
        ],
        repeat: Repeat::Once,
    },
    StageDesc {
        name: "buoyancy",
        entry_point: "buoyancy",
        swaps: &[FieldId::Velocity],
        repeat: Repeat::Once,
    },
    StageDesc {
        name: "cool",
        entry_point: "cool",
        swaps: &[FieldId::Temperature],
        repeat: Repeat::Once,
    },
    StageDesc {
        name: "divergence",
        // Divergence is single-buffered and fully recomputed; nothing swaps.
        entry_point: "compute_divergence",
        swaps: &[],
        repeat: Repeat::Once,
    },
    StageDesc {
        name: "pressure",
        entry_point: "pressure_solve",
        swaps: &[FieldId::Pressure],
        repeat: Repeat::PressureIterations,
    },
    StageDesc {
        name: "project",
        entry_point: "project",
        swaps: &[FieldId::Velocity],
        repeat: Repeat::Once,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_fixed() {
        let names: Vec<_> = STAGES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "inject",
                "advect",
                "buoyancy",
                "cool",
                "divergence",
                "pressure",
                "project"
            ]
        );
    }

    #[test]
    fn test_advect_swaps_all_quantities_together() {
        let advect = STAGES.iter().find(|s| s.name == "advect").unwrap();
        assert_eq!(advect.swaps.len(), 4);
        assert!(advect.swaps.contains(&FieldId::Velocity));
        assert!(advect.swaps.contains(&FieldId::Pressure));
        assert!(advect.swaps.contains(&FieldId::Density));
        assert!(advect.swaps.contains(&FieldId::Temperature));
    }

    #[test]
    fn test_divergence_never_swaps() {
        let div = STAGES.iter().find(|s| s.name == "divergence").unwrap();
        assert!(div.swaps.is_empty());
    }

    #[test]
    fn test_only_pressure_is_iterated() {
        for stage in STAGES {
            if stage.name == "pressure" {
                assert_eq!(stage.repeat, Repeat::PressureIterations);
                assert_eq!(stage.swaps, [FieldId::Pressure]);
            } else {
                assert_eq!(stage.repeat, Repeat::Once, "stage {}", stage.name);
            }
        }
    }

    #[test]
    fn test_every_pair_swaps_at_least_once_per_frame() {
        for field in crate::field::ALL_FIELDS {
            let swapped = STAGES.iter().any(|s| s.swaps.contains(&field));
            assert!(swapped, "{field:?} would go stale");
        }
    }

    #[test]
    fn test_pressure_solve_follows_divergence() {
        let div = STAGES.iter().position(|s| s.name == "divergence").unwrap();
        let pressure = STAGES.iter().position(|s| s.name == "pressure").unwrap();
        let project = STAGES.iter().position(|s| s.name == "project").unwrap();
        assert!(div < pressure && pressure < project);
    }
}
