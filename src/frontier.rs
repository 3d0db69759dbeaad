//! The open set of the search: a binary heap of cell indices ordered by estimated total cost.
//!
//! There is no decrease-key. An improved cost is pushed as a new entry and the outdated one stays
//! in the heap until it is popped, at which point the engine recognizes it as stale and drops it.
use fxhash::FxBuildHasher;
use indexmap::IndexSet;
use num_traits::Float;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

use crate::error::{Result, SearchError};
use crate::terrain_grid::CellIndex;

pub type FxIndexSet<K> = IndexSet<K, FxBuildHasher>;

/// A cell together with the costs it had when it was pushed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrontierEntry<C> {
    pub cell: CellIndex,
    pub f_cost: C,
    pub h_cost: C,
    /// Insertion counter, used as the last tie-breaker so that equal keys pop in FIFO order.
    pub sequence: u64,
}

impl<C: Float> FrontierEntry<C> {
    pub fn g_cost(&self) -> C {
        self.f_cost - self.h_cost
    }
}

/// Ordering policy of a [Frontier]. [Ordering::Less] means `a` is popped before `b`.
pub trait FrontierOrder<C> {
    fn compare(a: &FrontierEntry<C>, b: &FrontierEntry<C>) -> Ordering;
}

fn compare_cost<C: Float>(a: C, b: C) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Lowest `f` first, ties broken by lowest `h`, favoring cells that are estimated to be closer
/// to the goal.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByFThenH;

impl<C: Float> FrontierOrder<C> for ByFThenH {
    fn compare(a: &FrontierEntry<C>, b: &FrontierEntry<C>) -> Ordering {
        compare_cost(a.f_cost, b.f_cost)
            .then_with(|| compare_cost(a.h_cost, b.h_cost))
            .then_with(|| a.sequence.cmp(&b.sequence))
    }
}

/// Lowest `f` first, ties broken by lowest `g`. This gives the opposite tie-breaking effect of
/// [ByFThenH] and explores more broadly around the start.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByFThenG;

impl<C: Float> FrontierOrder<C> for ByFThenG {
    fn compare(a: &FrontierEntry<C>, b: &FrontierEntry<C>) -> Ordering {
        compare_cost(a.f_cost, b.f_cost)
            .then_with(|| compare_cost(a.g_cost(), b.g_cost()))
            .then_with(|| a.sequence.cmp(&b.sequence))
    }
}

struct Ranked<C, O> {
    entry: FrontierEntry<C>,
    order: PhantomData<O>,
}

impl<C: Copy, O> Clone for Ranked<C, O> {
    fn clone(&self) -> Self {
        Ranked {
            entry: self.entry,
            order: PhantomData,
        }
    }
}

impl<C: Float, O: FrontierOrder<C>> Eq for Ranked<C, O> {}

impl<C: Float, O: FrontierOrder<C>> PartialEq for Ranked<C, O> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C: Float, O: FrontierOrder<C>> PartialOrd for Ranked<C, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: Float, O: FrontierOrder<C>> Ord for Ranked<C, O> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed, as BinaryHeap is a max-heap
        O::compare(&other.entry, &self.entry)
    }
}

/// Min-priority queue of [FrontierEntry] values. The ordering policy `O` is fixed when the
/// frontier is created.
pub struct Frontier<C, O = ByFThenH> {
    heap: BinaryHeap<Ranked<C, O>>,
    next_sequence: u64,
}

impl<C: Copy, O> Clone for Frontier<C, O> {
    fn clone(&self) -> Self {
        Frontier {
            heap: self.heap.clone(),
            next_sequence: self.next_sequence,
        }
    }
}

impl<C: Float, O: FrontierOrder<C>> Default for Frontier<C, O> {
    fn default() -> Self {
        Frontier::new()
    }
}

impl<C: Float, O: FrontierOrder<C>> Frontier<C, O> {
    pub fn new() -> Frontier<C, O> {
        Frontier {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Frontier<C, O> {
        Frontier {
            heap: BinaryHeap::with_capacity(capacity),
            next_sequence: 0,
        }
    }

    /// Number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops all entries and restarts the insertion counter.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_sequence = 0;
    }

    pub fn push(&mut self, cell: CellIndex, f_cost: C, h_cost: C) {
        let entry = FrontierEntry {
            cell,
            f_cost,
            h_cost,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.heap.push(Ranked {
            entry,
            order: PhantomData,
        });
    }

    pub fn pop_min(&mut self) -> Result<FrontierEntry<C>> {
        self.heap
            .pop()
            .map(|ranked| ranked.entry)
            .ok_or(SearchError::EmptyFrontier)
    }

    pub fn peek_min(&self) -> Option<&FrontierEntry<C>> {
        self.heap.peek().map(|ranked| &ranked.entry)
    }

    /// All entries in pop order. Works on a copy of the heap, so the frontier itself is left
    /// untouched.
    pub fn sorted_entries(&self) -> Vec<FrontierEntry<C>> {
        let mut copy = self.heap.clone();
        std::iter::from_fn(|| copy.pop().map(|ranked| ranked.entry)).collect()
    }

    /// The distinct cells currently on the frontier, in pop order of their best entry.
    pub fn members(&self) -> FxIndexSet<CellIndex> {
        self.sorted_entries()
            .into_iter()
            .map(|entry| entry.cell)
            .collect()
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        self.heap.iter().any(|ranked| ranked.entry.cell == cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pop_cells<O: FrontierOrder<f32>>(frontier: &mut Frontier<f32, O>) -> Vec<CellIndex> {
        std::iter::from_fn(|| frontier.pop_min().ok())
            .map(|entry| entry.cell)
            .collect()
    }

    #[test]
    fn pops_lowest_f_first() {
        let mut frontier: Frontier<f32> = Frontier::new();
        frontier.push(0, 5.0, 1.0);
        frontier.push(1, 2.0, 1.0);
        frontier.push(2, 3.5, 0.0);
        assert_eq!(pop_cells(&mut frontier), vec![1, 2, 0]);
    }

    #[test]
    fn ties_prefer_lower_h_then_insertion_order() {
        let mut frontier: Frontier<f32> = Frontier::new();
        frontier.push(0, 4.0, 3.0);
        frontier.push(1, 4.0, 1.0);
        frontier.push(2, 4.0, 3.0);
        frontier.push(3, 4.0, 1.0);
        assert_eq!(pop_cells(&mut frontier), vec![1, 3, 0, 2]);
    }

    #[test]
    fn g_tie_break_prefers_lower_g() {
        let mut frontier: Frontier<f32, ByFThenG> = Frontier::new();
        // g = 1 and g = 3 respectively
        frontier.push(0, 4.0, 3.0);
        frontier.push(1, 4.0, 1.0);
        assert_eq!(pop_cells(&mut frontier), vec![0, 1]);
    }

    #[test]
    fn empty_pop_is_an_error() {
        let mut frontier: Frontier<f32> = Frontier::default();
        assert_eq!(frontier.pop_min(), Err(SearchError::EmptyFrontier));
        frontier.push(7, 1.0, 0.0);
        assert!(frontier.pop_min().is_ok());
        assert_eq!(frontier.pop_min(), Err(SearchError::EmptyFrontier));
    }

    #[test]
    fn snapshots_do_not_consume_entries() {
        let mut frontier: Frontier<f32> = Frontier::with_capacity(4);
        frontier.push(3, 2.0, 1.0);
        frontier.push(9, 1.0, 1.0);
        frontier.push(3, 1.5, 1.0);
        let sorted: Vec<CellIndex> = frontier.sorted_entries().iter().map(|e| e.cell).collect();
        assert_eq!(sorted, vec![9, 3, 3]);
        // Duplicates collapse onto the position of their best entry
        let members: Vec<CellIndex> = frontier.members().into_iter().collect();
        assert_eq!(members, vec![9, 3]);
        assert_eq!(frontier.len(), 3);
        assert_eq!(frontier.peek_min().map(|e| e.cell), Some(9));
        assert!(frontier.contains(3));
        assert!(!frontier.contains(4));
    }

    #[test]
    fn clear_restarts_sequence() {
        let mut frontier: Frontier<f32> = Frontier::new();
        frontier.push(0, 1.0, 0.0);
        frontier.push(1, 1.0, 0.0);
        frontier.clear();
        assert!(frontier.is_empty());
        frontier.push(5, 1.0, 0.0);
        assert_eq!(frontier.peek_min().map(|e| e.sequence), Some(0));
    }
}
