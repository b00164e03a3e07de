//! IIR filter design and real-time filtering

pub mod design;
pub mod iir;

pub use design::{
    design, FilterDesign, FilterError, FilterKind, FilterMode, FilterSettings, SUPPORTED_ORDERS,
};
pub use iir::IirState;
