//! # Motion Planning Crate
//!
//! A deterministic motion planner and step generator core for a three-axis
//! CNC machine, usable on both host and MCU (`no_std`-friendly).
//!
//! Provides the motion primitives:
//! - The block ring: a bounded SPSC queue of planned motion blocks
//! - Kinematic conversion from millimetre targets to per-axis step counts
//! - A junction-deviation look-ahead planner with reverse/forward passes
//! - The trapezoid rate controller and the Bresenham step tracer as pure
//!   functions, callable from an interrupt shell or a simulator
//!
//! Planning math runs in `f32`; everything on the execution side
//! (`profile`, `bresenham`) is integer-only so interrupt code never touches
//! the FPU.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod block;
pub mod bresenham;
pub mod error;
pub mod kinematics;
pub mod planner;
pub mod profile;
pub mod ring;

mod math;

// Re-export core types for easier access
pub use block::{Block, DIRECTION_MASK, STEP_MASK};
pub use error::PlannerError;
pub use kinematics::MoveVector;
pub use planner::{PlanOutcome, Planner, PlannerConfig};
pub use profile::{RateChange, StepperRuntime};
pub use ring::BlockRing;

/// Number of controlled axes.
pub const N_AXIS: usize = 3;

pub const X_AXIS: usize = 0;
pub const Y_AXIS: usize = 1;
pub const Z_AXIS: usize = 2;

/// Virtual acceleration ticks per second; the trapezoid generator may only
/// change the step rate on these ticks.
pub const ACCELERATION_TICKS_PER_SECOND: u32 = 100;

/// Junction speed floor in mm/min. Keeps the entry-speed chain from being
/// pinned at exactly zero, which would stall the forward pass.
pub const MINIMUM_PLANNER_SPEED: f32 = 0.05;

/// Step-timer floor in steps/min. Rates below this are clamped so the step
/// timer reload value stays bounded.
pub const MINIMUM_STEPS_PER_MINUTE: u32 = 800;
