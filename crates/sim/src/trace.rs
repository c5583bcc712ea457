//! Pulse trace capture.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One recorded step-pulse assertion.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEdge {
    /// Virtual time of the rising edge, machine cycles.
    pub t_cycles: u64,
    /// Asserted step bits (`*_STEP_BIT` layout).
    pub step_bits: u8,
    /// Direction bits at the time of the pulse.
    pub direction_bits: u8,
}

/// All pulses emitted during a simulation run.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StepTrace {
    pub edges: Vec<PulseEdge>,
}

impl StepTrace {
    pub fn record(&mut self, edge: PulseEdge) {
        self.edges.push(edge);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Pulses that stepped the given axis.
    pub fn axis_pulses(&self, axis: usize) -> usize {
        let bit = motion::block::step_bit(axis);
        self.edges.iter().filter(|e| e.step_bits & bit != 0).count()
    }

    /// Dump the recorded trace to a pretty-printed JSON file.
    pub fn dump_json(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        let json = serde_json::to_string_pretty(self)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
