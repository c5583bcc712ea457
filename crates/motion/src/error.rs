//! Error types for the motion planning crate.

/// Represents errors that can occur during motion planning.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlannerError {
    /// The block ring is full; retry once the stepper has discarded a block.
    RingFull,
}
