//! Bresenham step tracer.
//!
//! At each step event every axis accumulator gains that axis's step count;
//! an accumulator going positive emits a step pulse and loses the dominant
//! event count. Interleaved this way, the composite motion stays within
//! half a step of the ideal line on every axis. Integer-only — this runs
//! inside the step interrupt.

use crate::block::{direction_bit, step_bit, Block};
use crate::profile::StepperRuntime;
use crate::N_AXIS;

/// Execute one step event of the current block.
///
/// Returns the step-bit mask to pulse for this event (direction bits are
/// the block's, applied by the shell) and advances
/// `step_events_completed`. The caller checks completion against the
/// block's `step_event_count`.
pub fn step_event(rt: &mut StepperRuntime, block: &Block) -> u8 {
    let mut step_bits = 0u8;
    for axis in 0..N_AXIS {
        rt.counters[axis] += block.steps[axis] as i32;
        if rt.counters[axis] > 0 {
            step_bits |= step_bit(axis);
            rt.counters[axis] -= rt.event_count as i32;
        }
    }
    rt.step_events_completed += 1;
    step_bits
}

/// Per-axis position change for a pulse, from its step and direction bits.
/// A set direction bit means the axis moves negative.
pub fn position_delta(step_bits: u8, direction_bits: u8) -> [i32; N_AXIS] {
    let mut delta = [0i32; N_AXIS];
    for axis in 0..N_AXIS {
        if step_bits & step_bit(axis) != 0 {
            delta[axis] = if direction_bits & direction_bit(axis) != 0 {
                -1
            } else {
                1
            };
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{X_DIRECTION_BIT, X_STEP_BIT, Y_STEP_BIT};

    fn traced_block(steps: [u32; N_AXIS]) -> (Block, StepperRuntime) {
        let block = Block {
            steps,
            step_event_count: *steps.iter().max().unwrap(),
            ..Block::default()
        };
        let mut rt = StepperRuntime::default();
        rt.load_block(&block);
        (block, rt)
    }

    #[test]
    fn dominant_axis_steps_every_event() {
        let (block, mut rt) = traced_block([100, 0, 0]);
        for _ in 0..block.step_event_count {
            let bits = step_event(&mut rt, &block);
            assert_eq!(bits, X_STEP_BIT);
        }
        assert_eq!(rt.step_events_completed, block.step_event_count);
    }

    #[test]
    fn all_axes_reach_their_step_counts() {
        let (block, mut rt) = traced_block([100, 73, 31]);
        let mut totals = [0u32; N_AXIS];
        for _ in 0..block.step_event_count {
            let bits = step_event(&mut rt, &block);
            for axis in 0..N_AXIS {
                if bits & crate::block::step_bit(axis) != 0 {
                    totals[axis] += 1;
                }
            }
        }
        assert_eq!(totals, block.steps);
    }

    #[test]
    fn minor_axis_stays_within_one_step_of_ideal() {
        let (block, mut rt) = traced_block([1000, 333, 0]);
        let mut y_steps = 0u32;
        for event in 1..=block.step_event_count {
            let bits = step_event(&mut rt, &block);
            if bits & Y_STEP_BIT != 0 {
                y_steps += 1;
            }
            let ideal = block.steps[1] as f64 * event as f64 / block.step_event_count as f64;
            assert!(
                (y_steps as f64 - ideal).abs() <= 1.0,
                "y deviated past one step at event {event}"
            );
        }
    }

    #[test]
    fn direction_bits_sign_the_position_delta() {
        let delta = position_delta(X_STEP_BIT | Y_STEP_BIT, X_DIRECTION_BIT);
        assert_eq!(delta, [-1, 1, 0]);
    }
}
