//! Composite operation emulation over fixed-function blending.
//!
//! All colors in the pipeline are premultiplied, which is what lets most
//! Porter-Duff operators collapse into a single blend equation.

use crate::device::{BlendConfig, BlendFactor, BlendOp};

/// A supported composite operation: the blend equation to install plus
/// whether the target must be cleared before drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeMode {
    pub blend: BlendConfig,
    /// `copy` replaces the whole target, which fixed-function blending
    /// cannot express alone.
    pub clear_first: bool,
}

/// Maps a composite operation name to its emulation, or `None` for
/// operations fixed-function blending cannot express. Unknown names also
/// return `None`; the caller keeps the previous blend state in that case.
pub fn composite_mode(op: &str) -> Option<CompositeMode> {
    let simple = |op, src, dst| CompositeMode {
        blend: BlendConfig::uniform(op, src, dst),
        clear_first: false,
    };
    match op {
        "source-over" => Some(simple(
            BlendOp::Add,
            BlendFactor::One,
            BlendFactor::OneMinusSrcAlpha,
        )),
        "copy" => Some(CompositeMode {
            blend: BlendConfig::premultiplied_over(),
            clear_first: true,
        }),
        "destination-out" => Some(simple(
            BlendOp::ReverseSubtract,
            BlendFactor::One,
            BlendFactor::One,
        )),
        "source-in" => Some(CompositeMode {
            blend: BlendConfig::separate(
                BlendOp::Add,
                BlendFactor::One,
                BlendFactor::Zero,
                BlendFactor::DstAlpha,
                BlendFactor::Zero,
            ),
            clear_first: false,
        }),
        "destination-atop" => Some(CompositeMode {
            blend: BlendConfig::separate(
                BlendOp::Add,
                BlendFactor::OneMinusDstAlpha,
                BlendFactor::DstAlpha,
                BlendFactor::One,
                BlendFactor::Zero,
            ),
            clear_first: false,
        }),
        "lighter" => Some(simple(BlendOp::Add, BlendFactor::One, BlendFactor::One)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_over_is_premultiplied_over() {
        let mode = composite_mode("source-over").unwrap();
        assert_eq!(mode.blend, BlendConfig::premultiplied_over());
        assert!(!mode.clear_first);
    }

    #[test]
    fn test_copy_clears_then_blends_like_source_over() {
        let mode = composite_mode("copy").unwrap();
        assert!(mode.clear_first);
        assert_eq!(mode.blend, BlendConfig::premultiplied_over());
    }

    #[test]
    fn test_destination_out_subtracts_coverage() {
        let mode = composite_mode("destination-out").unwrap();
        assert_eq!(mode.blend.color_op, BlendOp::ReverseSubtract);
        assert_eq!(mode.blend.color_src, BlendFactor::One);
        assert_eq!(mode.blend.color_dst, BlendFactor::One);
    }

    #[test]
    fn test_source_in_keeps_color_and_weights_alpha_by_destination() {
        let mode = composite_mode("source-in").unwrap();
        assert_eq!(mode.blend.color_src, BlendFactor::One);
        assert_eq!(mode.blend.color_dst, BlendFactor::Zero);
        assert_eq!(mode.blend.alpha_src, BlendFactor::DstAlpha);
        assert_eq!(mode.blend.alpha_dst, BlendFactor::Zero);
        assert!(!mode.clear_first);
    }

    #[test]
    fn test_destination_atop_splits_channels() {
        let mode = composite_mode("destination-atop").unwrap();
        assert_eq!(mode.blend.color_src, BlendFactor::OneMinusDstAlpha);
        assert_eq!(mode.blend.color_dst, BlendFactor::DstAlpha);
        assert_eq!(mode.blend.alpha_src, BlendFactor::One);
        assert_eq!(mode.blend.alpha_dst, BlendFactor::Zero);
    }

    #[test]
    fn test_lighter_is_additive() {
        let mode = composite_mode("lighter").unwrap();
        assert_eq!(
            mode.blend,
            BlendConfig::uniform(BlendOp::Add, BlendFactor::One, BlendFactor::One)
        );
    }

    #[test]
    fn test_unknown_operation_unmapped() {
        assert!(composite_mode("multiply").is_none());
        assert!(composite_mode("xor").is_none());
        assert!(composite_mode("").is_none());
    }
}
