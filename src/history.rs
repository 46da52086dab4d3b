//! Bounded turning-point history stacks.
//!
//! Each device owns two stacks: ascending (lower turning points) and
//! descending (upper turning points). Index 0 holds the outer saturation
//! bound found at initialization and is never popped; everything above it
//! is nested minor-loop memory. Depth is bounded by a configurable
//! capacity; a push at capacity is reported as a fault and the point is
//! dropped, leaving the stack unchanged.

use crate::error::Fault;
use crate::scaling::BranchPoint;

/// A bounded stack of remembered turning points.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    /// Stack name used in faults and diagnostics ("ascending"/"descending")
    label: &'static str,
    points: Vec<BranchPoint>,
    capacity: usize,
}

impl HistoryStack {
    /// Create a stack holding only its outer saturation bound.
    pub fn new(label: &'static str, capacity: usize, base: BranchPoint) -> Self {
        debug_assert!(capacity >= 1);
        let mut points = Vec::with_capacity(capacity.min(64));
        points.push(base);
        Self {
            label,
            points,
            capacity,
        }
    }

    /// Stack name for diagnostics.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Current depth, always >= 1.
    pub fn depth(&self) -> usize {
        self.points.len()
    }

    /// The innermost remembered turning point.
    pub fn top(&self) -> BranchPoint {
        // Invariant: never empty, index 0 is the saturation bound
        self.points[self.points.len() - 1]
    }

    /// Push a turning point.
    ///
    /// Returns a [`Fault::Capacity`] and drops the point if the stack is
    /// full.
    pub fn push(&mut self, point: BranchPoint) -> Option<Fault> {
        if self.points.len() >= self.capacity {
            return Some(Fault::Capacity {
                stack: self.label,
                capacity: self.capacity,
            });
        }
        self.points.push(point);
        None
    }

    /// Pop one nesting level. The saturation bound at index 0 is never
    /// removed; returns whether a point was actually popped.
    pub fn pop(&mut self) -> bool {
        if self.points.len() > 1 {
            self.points.pop();
            true
        } else {
            false
        }
    }

    /// All remembered points, outermost first. Used for diagnostic dumps.
    pub fn entries(&self) -> &[BranchPoint] {
        &self.points
    }
}
