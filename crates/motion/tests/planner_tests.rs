//! Planner behavior against known machine setups.

use float_cmp::assert_approx_eq;
use motion::{
    BlockRing, PlanOutcome, Planner, PlannerConfig, MINIMUM_PLANNER_SPEED, N_AXIS,
};

/// 250 steps/mm, 10 mm/s² (36000 mm/min²), 0.05 mm junction deviation.
fn test_config() -> PlannerConfig {
    PlannerConfig {
        steps_per_mm: [250.0; N_AXIS],
        acceleration: [36_000.0; N_AXIS],
        junction_deviation: 0.05,
    }
}

fn plan(
    planner: &mut Planner,
    ring: &mut BlockRing,
    config: &PlannerConfig,
    target: [f32; N_AXIS],
    feed: f32,
) -> PlanOutcome {
    planner
        .plan_buffer_line(ring, config, &target, feed, false)
        .expect("ring has room")
}

#[test]
fn single_axis_move_plans_expected_block() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    let outcome = plan(&mut planner, &mut ring, &config, [10.0, 0.0, 0.0], 300.0);
    assert_eq!(outcome, PlanOutcome::Enqueued);
    assert_eq!(ring.len(), 1);

    let block = ring.tail().unwrap();
    assert_eq!(block.steps, [2500, 0, 0]);
    assert_eq!(block.step_event_count, 2500);
    assert_eq!(block.direction_bits, 0);
    assert_eq!(block.nominal_rate, 75_000); // 300 mm/min × 250 steps/mm
    assert_eq!(block.rate_delta, 1500); // 9e6 steps/min² over 6000 ticks/min
    assert_eq!(block.accelerate_until, 313);
    assert_eq!(block.decelerate_after, 2188);
    assert_eq!(block.initial_rate, block.final_rate); // from and to the floor
    assert_eq!(planner.position(), [2500, 0, 0]);
}

#[test]
fn zero_length_move_is_dropped_silently() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    let outcome = plan(&mut planner, &mut ring, &config, [0.001, 0.0, 0.0], 300.0);
    assert_eq!(outcome, PlanOutcome::Dropped);
    assert!(ring.is_empty());
    assert_eq!(planner.position(), [0, 0, 0]);
}

#[test]
fn ring_full_is_reported() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    let mut x = 1.0f32;
    while planner
        .plan_buffer_line(&mut ring, &config, &[x, 0.0, 0.0], 300.0, false)
        .is_ok()
    {
        x += 1.0;
    }
    assert!(ring.is_full());
    // Position must not advance for the rejected move.
    let held = planner.position();
    let err = planner
        .plan_buffer_line(&mut ring, &config, &[x, 0.0, 0.0], 300.0, false)
        .unwrap_err();
    assert_eq!(err, motion::PlannerError::RingFull);
    assert_eq!(planner.position(), held);
}

#[test]
fn colinear_moves_carry_speed_through_the_junction() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    plan(&mut planner, &mut ring, &config, [5.0, 0.0, 0.0], 600.0);
    plan(&mut planner, &mut ring, &config, [10.0, 0.0, 0.0], 600.0);

    let first = *ring.block(ring.tail_index());
    let second = *ring.block(ring.next_index(ring.tail_index()));

    // Straight-through junction: unbounded corner limit, so the second
    // block enters at full nominal speed.
    assert_approx_eq!(
        f32,
        second.entry_speed_sqr,
        second.nominal_speed_sqr,
        epsilon = 1.0
    );
    // The rate chain is continuous across the junction.
    assert_eq!(first.final_rate, second.initial_rate);
    assert!(second.initial_rate >= 150_000); // 600 mm/min × 250 steps/mm
}

#[test]
fn right_angle_corner_is_limited_by_junction_deviation() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    plan(&mut planner, &mut ring, &config, [10.0, 0.0, 0.0], 600.0);
    plan(&mut planner, &mut ring, &config, [10.0, 10.0, 0.0], 600.0);

    let first = *ring.block(ring.tail_index());
    let second = *ring.block(ring.next_index(ring.tail_index()));

    // v² = a · δ·sin(θ/2)/(1−sin(θ/2)) with θ = 90°.
    let sin_half = (0.5f32).sqrt();
    let expected_sqr = 36_000.0 * 0.05 * sin_half / (1.0 - sin_half);
    assert_approx_eq!(f32, second.entry_speed_sqr, expected_sqr, epsilon = 0.5);
    assert!(second.entry_speed_sqr < second.nominal_speed_sqr);
    // Exit of the first block meets the entry of the second exactly.
    assert_eq!(first.final_rate, second.initial_rate);
}

#[test]
fn short_move_gets_triangle_profile() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    // 1 mm at 1800 mm/min cannot reach nominal speed at 10 mm/s².
    plan(&mut planner, &mut ring, &config, [1.0, 0.0, 0.0], 1800.0);
    let block = ring.tail().unwrap();
    assert_eq!(block.accelerate_until, block.decelerate_after);
    assert!(block.accelerate_until > 0);
    assert!(block.decelerate_after <= block.step_event_count);
}

#[test]
fn reversal_junction_drops_to_the_planner_floor() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    plan(&mut planner, &mut ring, &config, [10.0, 0.0, 0.0], 600.0);
    plan(&mut planner, &mut ring, &config, [0.0, 0.0, 0.0], 600.0);

    let second = *ring.block(ring.next_index(ring.tail_index()));
    assert_approx_eq!(
        f32,
        second.entry_speed_sqr,
        MINIMUM_PLANNER_SPEED * MINIMUM_PLANNER_SPEED,
        epsilon = 1e-4
    );
}

#[test]
fn claimed_tail_is_never_replanned() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    plan(&mut planner, &mut ring, &config, [5.0, 0.0, 0.0], 600.0);
    let frozen = *ring.claim_tail().unwrap();

    // A colinear successor would normally raise the tail's exit speed.
    plan(&mut planner, &mut ring, &config, [10.0, 0.0, 0.0], 600.0);
    assert_eq!(*ring.tail().unwrap(), frozen);
}

#[test]
fn feed_hold_reinitialize_replans_remaining_steps() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();

    plan(&mut planner, &mut ring, &config, [100.0, 0.0, 0.0], 600.0);
    ring.claim_tail();

    // Halted halfway: 12500 of 25000 events remain.
    planner.cycle_reinitialize(&mut ring, 12_500);
    let block = ring.tail().unwrap();
    assert_eq!(block.step_event_count, 12_500);
    assert_approx_eq!(f32, block.millimeters, 50.0, epsilon = 1e-3);
    // Resumes from rest.
    assert!(block.initial_rate <= block.rate_delta);
    // Step counts are untouched so the Bresenham accumulators stay valid.
    assert_eq!(block.steps, [25_000, 0, 0]);
}

/// Small deterministic generator for the property checks; avoids pulling a
/// full RNG into this crate's dev-deps.
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as f32) / (u32::MAX >> 1) as f32
    }
}

#[test]
fn junction_chain_stays_feasible_over_random_programs() {
    let config = test_config();
    let mut planner = Planner::new();
    let mut ring = BlockRing::new();
    let mut lcg = Lcg(0x5DEECE66D);

    let mut target = [0.0f32; N_AXIS];
    for _ in 0..12 {
        for t in target.iter_mut() {
            *t += lcg.next_f32() * 20.0 - 10.0;
        }
        let feed = 120.0 + lcg.next_f32() * 1200.0;
        let _ = planner.plan_buffer_line(&mut ring, &config, &target, feed, false);

        // Every queued pair must satisfy the junction and ramp feasibility
        // invariants after each replan.
        let mut index = ring.tail_index();
        while let Some(newest) = ring.newest_index() {
            let block = ring.block(index);
            assert!(
                block.entry_speed_sqr <= block.max_entry_speed_sqr + 1.0,
                "entry exceeds junction cap"
            );
            assert!(
                block.entry_speed_sqr <= block.nominal_speed_sqr + 1.0,
                "entry exceeds nominal"
            );
            assert!(block.accelerate_until <= block.decelerate_after);
            assert!(block.decelerate_after <= block.step_event_count);

            if index == newest {
                break;
            }
            let next = ring.block(ring.next_index(index));
            let budget_sqr = 2.0 * block.acceleration * block.millimeters + 1.0;
            assert!(
                next.entry_speed_sqr - block.entry_speed_sqr <= budget_sqr,
                "successor entry unreachable by acceleration"
            );
            assert!(
                block.entry_speed_sqr - next.entry_speed_sqr <= budget_sqr,
                "block cannot shed speed to its successor"
            );
            index = ring.next_index(index);
        }
    }
}
