//! Trapezoid rate controller.
//!
//! Iterates the adjusted step rate of the executing block once per virtual
//! acceleration tick. The tick is emulated from the step timer: every step
//! event adds `cycles_per_step_event` to a cycle counter, and the tick fires
//! each time the counter crosses `cycles_per_acceleration_tick`
//! (`cpu_hz / ACCELERATION_TICKS_PER_SECOND`). The acceleration slope is
//! therefore `rate_delta` per tick regardless of the current step rate.
//!
//! Everything here is integer arithmetic on steps/min — this runs inside the
//! step interrupt, where float use is forbidden.

use crate::block::Block;
use crate::N_AXIS;

/// Runtime owned exclusively by the step interrupt.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct StepperRuntime {
    /// Signed Bresenham accumulators, one per axis.
    pub counters: [i32; N_AXIS],
    /// Dominant-axis event count the accumulators were seeded against.
    pub event_count: u32,
    /// Step events completed in the current block.
    pub step_events_completed: u32,
    /// Machine cycles between step events at the current rate.
    pub cycles_per_step_event: u32,
    /// Cycles accumulated since the last acceleration tick.
    pub trapezoid_tick_cycle_counter: u32,
    /// Current step rate in steps/min.
    pub trapezoid_adjusted_rate: u32,
    /// Below this rate the deceleration tail halves instead of subtracting.
    pub min_safe_rate: u32,
}

impl StepperRuntime {
    /// Seed the Bresenham accumulators and trapezoid bookkeeping for a
    /// freshly popped block. Deliberately does not touch
    /// `trapezoid_adjusted_rate` or the tick counter: during a feed hold
    /// the deceleration slope continues across block boundaries.
    pub fn load_block(&mut self, block: &Block) {
        // Midpoint seeding: the dominant axis steps near the block start
        // instead of on the very first event.
        let seed = -((block.step_event_count >> 1) as i32);
        self.counters = [seed; N_AXIS];
        self.event_count = block.step_event_count;
        self.step_events_completed = 0;
        self.min_safe_rate = block.rate_delta + (block.rate_delta >> 1);
    }
}

/// Outcome of one [`rate_tick`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateChange {
    /// No acceleration tick fired, or the rate is already where it should be.
    Unchanged,
    /// The step timer must be reprogrammed to this rate (steps/min).
    Adjusted(u32),
    /// Feed-hold deceleration has reached standstill; the shell goes idle
    /// and flags cycle stop, leaving the Bresenham state intact.
    HoldComplete,
}

/// Advance the emulated acceleration tick counter; true when a tick fires.
#[inline]
fn iterate_tick_counter(rt: &mut StepperRuntime, cycles_per_acceleration_tick: u32) -> bool {
    rt.trapezoid_tick_cycle_counter = rt
        .trapezoid_tick_cycle_counter
        .wrapping_add(rt.cycles_per_step_event);
    if rt.trapezoid_tick_cycle_counter > cycles_per_acceleration_tick {
        rt.trapezoid_tick_cycle_counter -= cycles_per_acceleration_tick;
        true
    } else {
        false
    }
}

/// Run the trapezoid generator for one step event of the current block.
///
/// Call after the Bresenham event, while
/// `step_events_completed < step_event_count`. With `feed_hold` set the
/// accel/decel boundaries are ignored and the rate ramps straight down by
/// `rate_delta` per tick; the tick counter is intentionally not reseeded so
/// the slope is continuous no matter when the hold was triggered.
pub fn rate_tick(
    rt: &mut StepperRuntime,
    block: &Block,
    cycles_per_acceleration_tick: u32,
    feed_hold: bool,
) -> RateChange {
    if feed_hold {
        if iterate_tick_counter(rt, cycles_per_acceleration_tick) {
            if rt.trapezoid_adjusted_rate <= block.rate_delta {
                return RateChange::HoldComplete;
            }
            rt.trapezoid_adjusted_rate -= block.rate_delta;
            return RateChange::Adjusted(rt.trapezoid_adjusted_rate);
        }
        return RateChange::Unchanged;
    }

    if rt.step_events_completed < block.accelerate_until {
        if iterate_tick_counter(rt, cycles_per_acceleration_tick) {
            rt.trapezoid_adjusted_rate += block.rate_delta;
            if rt.trapezoid_adjusted_rate >= block.nominal_rate {
                // Reached nominal a little early; cruise from here.
                rt.trapezoid_adjusted_rate = block.nominal_rate;
            }
            return RateChange::Adjusted(rt.trapezoid_adjusted_rate);
        }
        RateChange::Unchanged
    } else if rt.step_events_completed >= block.decelerate_after {
        if rt.step_events_completed == block.decelerate_after {
            // Reseed the tick counter on the boundary so deceleration is
            // identical every run: midpoint rule for a trapezoid, counter
            // complement for a triangle (no cruise phase happened).
            if rt.trapezoid_adjusted_rate == block.nominal_rate {
                rt.trapezoid_tick_cycle_counter = cycles_per_acceleration_tick / 2;
            } else {
                rt.trapezoid_tick_cycle_counter =
                    cycles_per_acceleration_tick - rt.trapezoid_tick_cycle_counter;
            }
            RateChange::Unchanged
        } else if iterate_tick_counter(rt, cycles_per_acceleration_tick) {
            // Full reductions only above min_safe_rate; below it, halve.
            // The halved step is never larger than rate_delta, which keeps
            // the tail inside the acceleration limit while avoiding a crawl
            // of leftover steps at the very end.
            if rt.trapezoid_adjusted_rate > rt.min_safe_rate {
                rt.trapezoid_adjusted_rate -= block.rate_delta;
            } else {
                rt.trapezoid_adjusted_rate >>= 1;
            }
            if rt.trapezoid_adjusted_rate < block.final_rate {
                rt.trapezoid_adjusted_rate = block.final_rate;
            }
            RateChange::Adjusted(rt.trapezoid_adjusted_rate)
        } else {
            RateChange::Unchanged
        }
    } else {
        // Cruise phase: pin to the nominal rate exactly.
        if rt.trapezoid_adjusted_rate != block.nominal_rate {
            rt.trapezoid_adjusted_rate = block.nominal_rate;
            return RateChange::Adjusted(rt.trapezoid_adjusted_rate);
        }
        RateChange::Unchanged
    }
}
