//! Insulin pharmacokinetics and concentration-safe dosing engine.
//!
//! Pure computation: given an insulin's pharmacokinetic profile and a
//! history of delivered-insulin events, compute the insulin still on board
//! (IOB) and its instantaneous activity at any query time, and convert
//! device-reported concentrated amounts/rates into the normalized unit
//! basis the rest of the system doses in. No I/O or shared state lives in
//! the core modules; profiles are immutable and safe to share across
//! threads.

pub mod basal;
pub mod concentration;
pub mod config;
pub mod curve;
pub mod display;
pub mod dose;
pub mod engine;
pub mod error;
pub mod output;
pub mod profile;

pub use basal::{BasalSchedule, BasalSegment, FlatBasal, ScheduledBasal};
pub use concentration::{
    from_normalized, from_normalized_rate, to_normalized, to_normalized_rate, ConvertedAmount,
    ConvertedRate,
};
pub use curve::ActivityCurve;
pub use display::{format_for_display, DoseDisplay};
pub use dose::{DoseContribution, DoseEvent, DISCRETIZATION_STEP_MS};
pub use engine::{compute_iob, evaluate_timeline, TimelinePoint};
pub use error::{EngineError, EngineResult};
pub use profile::{ExerciseAdjustment, InsulinProfile};
