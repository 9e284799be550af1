//! Fusion of dead reckoning with absolute fixes.

mod corrector;

pub use corrector::{
    blend_factor, compute_correction, Correction, CorrectionMode, ALPHA_HIGH_CONFIDENCE,
    ALPHA_LOW_CONFIDENCE, ALPHA_MEDIUM_CONFIDENCE,
};
