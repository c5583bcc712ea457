//! # Look-Ahead Motion Planner
//!
//! Maintains, across the whole block ring, entry speeds that are
//! simultaneously reachable by acceleration from the previous block,
//! low enough to decelerate to the next block's entry within the block's
//! own length, and within the junction-deviation cornering limit.
//!
//! ## Operation
//!
//! 1. **`plan_buffer_line`**: a millimetre target plus feed rate is
//!    converted to step space, junction-limited against the previous move,
//!    and appended to the ring.
//!
//! 2. **Reverse pass**: starting from the newest block and walking back
//!    toward the executing block, every entry speed is lowered until the
//!    block can decelerate to its successor's entry within its length.
//!
//! 3. **Forward pass**: walking forward again, entry speeds that the
//!    predecessor cannot reach by accelerating over its own length are
//!    lowered to what is reachable.
//!
//! 4. **Trapezoid freeze**: each touched block gets its integer step-rate
//!    profile (`initial_rate`, `final_rate`, `rate_delta`,
//!    `accelerate_until`, `decelerate_after`) recomputed in the step-rate
//!    domain. The newest block always plans to the junction floor; its exit
//!    is raised once a successor arrives.
//!
//! The block the stepper has claimed is never rewritten; both passes stop
//! at the slot after the ring tail while it is checked out.

use crate::block::Block;
use crate::error::PlannerError;
use crate::kinematics::{convert_target, nominal_speed, MoveVector};
use crate::math::{ceilf, fabsf, floorf, sqrtf};
use crate::ring::BlockRing;
use crate::{ACCELERATION_TICKS_PER_SECOND, MINIMUM_PLANNER_SPEED, N_AXIS};

/// Machine limits the planner plans against.
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    /// Steps per millimetre, per axis.
    pub steps_per_mm: [f32; N_AXIS],
    /// Maximum acceleration per axis, mm/min².
    pub acceleration: [f32; N_AXIS],
    /// Junction deviation in mm; bounds cornering speed by chord error.
    pub junction_deviation: f32,
}

/// Result of a successful `plan_buffer_line` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// A block was appended to the ring.
    Enqueued,
    /// The move rounded to zero steps and was silently dropped.
    Dropped,
}

/// Planner state carried between moves.
#[derive(Debug, Clone)]
pub struct Planner {
    /// Step position at the far end of the last enqueued block.
    position: [i32; N_AXIS],
    /// Unit vector of the last enqueued move, for junction angles.
    previous_unit_vec: [f32; N_AXIS],
    /// Nominal speed of the last enqueued move, squared.
    previous_nominal_speed_sqr: f32,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            position: [0; N_AXIS],
            previous_unit_vec: [0.0; N_AXIS],
            previous_nominal_speed_sqr: 0.0,
        }
    }

    /// Drop all planning state. The caller re-syncs the position afterwards.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Step position the planner believes the queue ends at.
    pub fn position(&self) -> [i32; N_AXIS] {
        self.position
    }

    /// Align the planner with the machine's actual step position. Called
    /// after reset and after homing, with the ring empty.
    pub fn sync_position(&mut self, machine_position: &[i32; N_AXIS]) {
        self.position = *machine_position;
        self.previous_unit_vec = [0.0; N_AXIS];
        self.previous_nominal_speed_sqr = 0.0;
    }

    /// Convert a millimetre target into a planned block and append it.
    ///
    /// Returns [`PlanOutcome::Dropped`] (without touching the ring) when the
    /// target rounds onto the current position. Fails with
    /// [`PlannerError::RingFull`] when there is no free slot; the caller
    /// retries once the stepper has discarded a block.
    pub fn plan_buffer_line(
        &mut self,
        ring: &mut BlockRing,
        config: &PlannerConfig,
        target_mm: &[f32; N_AXIS],
        feed_rate: f32,
        invert_feed: bool,
    ) -> Result<PlanOutcome, PlannerError> {
        let Some(mv) = convert_target(target_mm, &self.position, &config.steps_per_mm) else {
            return Ok(PlanOutcome::Dropped);
        };
        if ring.is_full() {
            return Err(PlannerError::RingFull);
        }

        let speed = nominal_speed(mv.millimeters, feed_rate, invert_feed);
        let nominal_speed_sqr = speed * speed;
        let acceleration = limit_acceleration_by_axis(&mv.unit_vec, &config.acceleration);
        let max_entry_speed_sqr =
            self.junction_speed_sqr(ring, &mv, nominal_speed_sqr, acceleration, config);

        let floor_sqr = MINIMUM_PLANNER_SPEED * MINIMUM_PLANNER_SPEED;
        let reachable_sqr = max_reachable_speed_sqr(acceleration, floor_sqr, mv.millimeters);

        let slot = ring.prepare_head().expect("ring checked non-full");
        *slot = Block {
            steps: mv.steps,
            step_event_count: mv.step_event_count,
            direction_bits: mv.direction_bits,
            millimeters: mv.millimeters,
            entry_speed_sqr: max_entry_speed_sqr.min(reachable_sqr),
            max_entry_speed_sqr,
            nominal_speed_sqr,
            acceleration,
            nominal_rate: 0,
            initial_rate: 0,
            final_rate: 0,
            rate_delta: 0,
            accelerate_until: 0,
            decelerate_after: 0,
            recalculate: true,
            nominal_length: nominal_speed_sqr <= reachable_sqr,
        };
        ring.commit_head();

        self.position = mv.target_steps;
        self.previous_unit_vec = mv.unit_vec;
        self.previous_nominal_speed_sqr = nominal_speed_sqr;

        self.recalculate(ring, false);
        Ok(PlanOutcome::Enqueued)
    }

    /// Re-plan the partially executed tail block after a feed hold, from a
    /// standstill over its remaining step events.
    ///
    /// Only legal while the step timer is idle: this rewrites the claimed
    /// tail slot. Per-axis step counts are left untouched so the stepper's
    /// Bresenham accumulators stay valid and the path resumes exactly.
    pub fn cycle_reinitialize(&mut self, ring: &mut BlockRing, step_events_remaining: u32) {
        let Some(block) = ring.tail_mut() else {
            return;
        };
        if step_events_remaining == 0 || block.step_event_count == 0 {
            return;
        }
        block.millimeters =
            block.millimeters * step_events_remaining as f32 / block.step_event_count as f32;
        block.step_event_count = step_events_remaining;
        block.entry_speed_sqr = 0.0;
        block.max_entry_speed_sqr = 0.0;
        block.nominal_length = false;
        block.recalculate = true;
        self.recalculate(ring, true);
    }

    /// Junction speed limit (squared) between the previous move and `mv`.
    fn junction_speed_sqr(
        &self,
        ring: &BlockRing,
        mv: &MoveVector,
        nominal_speed_sqr: f32,
        acceleration: f32,
        config: &PlannerConfig,
    ) -> f32 {
        let mut vmax_sqr = MINIMUM_PLANNER_SPEED * MINIMUM_PLANNER_SPEED;
        if ring.is_empty() || self.previous_nominal_speed_sqr <= 0.0 {
            // Starting from rest; the junction floor is all that is allowed.
            return vmax_sqr;
        }
        // Angle test via the negated dot product: -1.0 for a straight-through
        // junction, +1.0 for a full reversal.
        let cos_theta = -self.previous_unit_vec[0] * mv.unit_vec[0]
            - self.previous_unit_vec[1] * mv.unit_vec[1]
            - self.previous_unit_vec[2] * mv.unit_vec[2];
        if cos_theta < 0.95 {
            vmax_sqr = self.previous_nominal_speed_sqr.min(nominal_speed_sqr);
            if cos_theta > -0.95 {
                // Meaningful corner: bound by the centripetal limit of the
                // deviation-radius arc, v² = a · δ·sin(θ/2)/(1−sin(θ/2)).
                let sin_theta_d2 = sqrtf(0.5 * (1.0 - cos_theta));
                let centripetal_sqr =
                    acceleration * config.junction_deviation * sin_theta_d2 / (1.0 - sin_theta_d2);
                vmax_sqr = vmax_sqr.min(centripetal_sqr);
            }
        }
        vmax_sqr
    }

    /// Re-plan the queue after an append or a feed-hold re-initialization.
    fn recalculate(&mut self, ring: &mut BlockRing, include_claimed_tail: bool) {
        let Some(first) = first_plannable(ring, include_claimed_tail) else {
            return;
        };
        reverse_pass(ring, first);
        if first != ring.tail_index() {
            // The executing tail's exit is frozen; its successor cannot
            // enter faster than the tail was planned to leave.
            clamp_entry_to_claimed_tail_exit(ring, first);
        }
        // The forward pass reads the tail as predecessor even while the
        // stepper owns it: it constrains successors without rewriting it.
        forward_pass(ring, ring.tail_index());
        recalculate_trapezoids(ring, first);
    }
}

/// Index of the oldest block re-planning may rewrite, or `None` when there
/// is nothing to plan.
fn first_plannable(ring: &BlockRing, include_claimed_tail: bool) -> Option<usize> {
    let newest = ring.newest_index()?;
    let tail = ring.tail_index();
    if ring.tail_claimed() && !include_claimed_tail {
        if tail == newest {
            return None;
        }
        Some(ring.next_index(tail))
    } else {
        Some(tail)
    }
}

/// Cap the first re-plannable block's entry at the claimed tail's frozen
/// exit speed, recovered from its integer profile.
fn clamp_entry_to_claimed_tail_exit(ring: &mut BlockRing, first: usize) {
    let tail = ring.block(ring.tail_index());
    let exit_speed = tail.final_rate as f32 * tail.millimeters / tail.step_event_count as f32;
    let exit_speed_sqr = exit_speed * exit_speed;
    let block = ring.block_mut(first);
    if block.entry_speed_sqr > exit_speed_sqr {
        block.entry_speed_sqr = exit_speed_sqr;
        block.recalculate = true;
    }
}

/// Lower entry speeds so every block can decelerate to its successor.
fn reverse_pass(ring: &mut BlockRing, first: usize) {
    let newest = match ring.newest_index() {
        Some(i) => i,
        None => return,
    };
    let mut next_index = newest;
    while next_index != first {
        let current_index = ring.prev_index(next_index);
        let next_entry_sqr = ring.block(next_index).entry_speed_sqr;
        let current = ring.block_mut(current_index);
        if current.entry_speed_sqr != current.max_entry_speed_sqr {
            let new_entry_sqr = if !current.nominal_length
                && current.max_entry_speed_sqr > next_entry_sqr
            {
                current.max_entry_speed_sqr.min(max_reachable_speed_sqr(
                    current.acceleration,
                    next_entry_sqr,
                    current.millimeters,
                ))
            } else {
                // Long enough to shed any speed; the junction cap stands.
                current.max_entry_speed_sqr
            };
            if new_entry_sqr != current.entry_speed_sqr {
                current.entry_speed_sqr = new_entry_sqr;
                current.recalculate = true;
            }
        }
        next_index = current_index;
    }
}

/// Lower entry speeds the predecessor cannot accelerate to.
fn forward_pass(ring: &mut BlockRing, first: usize) {
    let newest = match ring.newest_index() {
        Some(i) => i,
        None => return,
    };
    let mut previous_index = first;
    while previous_index != newest {
        let current_index = ring.next_index(previous_index);
        let previous = ring.block(previous_index);
        let constrained = !previous.nominal_length;
        let prev_entry_sqr = previous.entry_speed_sqr;
        let reachable_sqr =
            max_reachable_speed_sqr(previous.acceleration, prev_entry_sqr, previous.millimeters);
        let current = ring.block_mut(current_index);
        if constrained
            && prev_entry_sqr < current.entry_speed_sqr
            && reachable_sqr < current.entry_speed_sqr
        {
            current.entry_speed_sqr = reachable_sqr;
            current.recalculate = true;
        }
        previous_index = current_index;
    }
}

/// Refreeze the step-rate profile of every block whose entry or exit moved.
fn recalculate_trapezoids(ring: &mut BlockRing, first: usize) {
    let newest = match ring.newest_index() {
        Some(i) => i,
        None => return,
    };
    let mut index = first;
    while index != newest {
        let next_index = ring.next_index(index);
        let next_entry_sqr = ring.block(next_index).entry_speed_sqr;
        let next_recalculate = ring.block(next_index).recalculate;
        let current = ring.block_mut(index);
        if current.recalculate || next_recalculate {
            let entry_sqr = current.entry_speed_sqr;
            calculate_trapezoid(current, entry_sqr, next_entry_sqr);
            current.recalculate = false;
        }
        index = next_index;
    }
    // The newest block always replans against the junction floor; its exit
    // is raised when a successor arrives.
    let last = ring.block_mut(newest);
    let entry_sqr = last.entry_speed_sqr;
    calculate_trapezoid(
        last,
        entry_sqr,
        MINIMUM_PLANNER_SPEED * MINIMUM_PLANNER_SPEED,
    );
    last.recalculate = false;
}

/// Freeze a block's integer step-rate profile from its entry/exit speeds.
///
/// All profile arithmetic happens in the step-rate domain so the interrupt
/// side runs on integers only. `accelerate_until` rounds up and the
/// deceleration distance rounds down, keeping both ramps inside the block:
/// `accelerate_until ≤ decelerate_after ≤ step_event_count`.
pub(crate) fn calculate_trapezoid(block: &mut Block, entry_speed_sqr: f32, exit_speed_sqr: f32) {
    let steps_per_mm = block.step_event_count as f32 / block.millimeters;
    block.nominal_rate = ceilf(sqrtf(block.nominal_speed_sqr) * steps_per_mm) as u32;
    block.initial_rate = ceilf(sqrtf(entry_speed_sqr) * steps_per_mm) as u32;
    block.final_rate = ceilf(sqrtf(exit_speed_sqr) * steps_per_mm) as u32;

    // Step-domain acceleration, steps/min².
    let acceleration = block.acceleration * steps_per_mm;
    block.rate_delta =
        ceilf(acceleration / (60.0 * ACCELERATION_TICKS_PER_SECOND as f32)) as u32;

    let initial = block.initial_rate as f32;
    let final_rate = block.final_rate as f32;
    let nominal = block.nominal_rate as f32;
    let event_count = block.step_event_count as f32;

    let mut accelerate_steps = ceilf((nominal * nominal - initial * initial) / (2.0 * acceleration));
    let decelerate_steps =
        floorf((nominal * nominal - final_rate * final_rate) / (2.0 * acceleration));
    let mut plateau_steps = event_count - accelerate_steps - decelerate_steps;

    if plateau_steps < 0.0 {
        // Too short to cruise: the ramps intersect below nominal speed.
        accelerate_steps = ceilf(
            (2.0 * acceleration * event_count - initial * initial + final_rate * final_rate)
                / (4.0 * acceleration),
        );
        accelerate_steps = accelerate_steps.max(0.0).min(event_count);
        plateau_steps = 0.0;
    }

    block.accelerate_until = accelerate_steps as u32;
    block.decelerate_after = (accelerate_steps + plateau_steps) as u32;
}

/// Speed (squared) reachable from `initial_speed_sqr` over `distance` mm at
/// the given acceleration: v² = v₀² + 2·a·d.
fn max_reachable_speed_sqr(acceleration: f32, initial_speed_sqr: f32, distance: f32) -> f32 {
    initial_speed_sqr + 2.0 * acceleration * distance
}

/// Block acceleration limited by the most demanding axis component.
fn limit_acceleration_by_axis(unit_vec: &[f32; N_AXIS], axis_acceleration: &[f32; N_AXIS]) -> f32 {
    let mut acceleration = f32::INFINITY;
    for axis in 0..N_AXIS {
        let component = fabsf(unit_vec[axis]);
        if component > 0.0 {
            acceleration = acceleration.min(axis_acceleration[axis] / component);
        }
    }
    acceleration
}
