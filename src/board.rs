//! Dense position ordering for board columns.
//!
//! Siblings sharing a (container, bucket) partition carry positions
//! `0..n`. Moving one item is expressed as a [`MovePlan`]: at most two range
//! [`Shift`]s over the other items plus the moved item's new placement. The
//! database executes the same plan inside one transaction, and [`Board`]
//! executes it in memory.

use std::collections::BTreeMap;
use std::hash::Hash;

pub type Position = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement<B> {
    pub bucket: B,
    pub position: Position,
}

impl<B> Placement<B> {
    pub fn new(bucket: B, position: Position) -> Self {
        Self { bucket, position }
    }
}

/// Adds `delta` to every other item of `bucket` whose position lies in
/// `from..=to` (`to = None` means unbounded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift<B> {
    pub bucket: B,
    pub delta: i64,
    pub from: Position,
    pub to: Option<Position>,
}

impl<B: PartialEq> Shift<B> {
    pub fn covers(&self, bucket: &B, position: Position) -> bool {
        &self.bucket == bucket && position >= self.from && self.to.map_or(true, |to| position <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan<B> {
    pub shifts: Vec<Shift<B>>,
    pub target: Placement<B>,
}

impl<B> MovePlan<B> {
    pub fn is_noop(&self) -> bool {
        self.shifts.is_empty()
    }
}

/// Clamps a requested slot into `0..=len`, where `len` counts the destination
/// partition without the moved item. Anything else would open a gap.
pub fn clamp_position(requested: Position, len: usize) -> Position {
    requested.clamp(0, len as Position)
}

/// Plans moving an item from `from` to `to`.
///
/// `to.position` must already be clamped with [`clamp_position`].
pub fn plan_move<B: Clone + PartialEq>(from: &Placement<B>, to: &Placement<B>) -> MovePlan<B> {
    let mut shifts = Vec::new();

    if from.bucket != to.bucket {
        // close the gap left behind, then open a slot in the new bucket
        shifts.push(Shift {
            bucket: from.bucket.clone(),
            delta: -1,
            from: from.position + 1,
            to: None,
        });
        shifts.push(Shift {
            bucket: to.bucket.clone(),
            delta: 1,
            from: to.position,
            to: None,
        });
    } else if to.position > from.position {
        shifts.push(Shift {
            bucket: from.bucket.clone(),
            delta: -1,
            from: from.position + 1,
            to: Some(to.position),
        });
    } else if to.position < from.position {
        shifts.push(Shift {
            bucket: from.bucket.clone(),
            delta: 1,
            from: to.position,
            to: Some(from.position - 1),
        });
    }

    MovePlan {
        shifts,
        target: to.clone(),
    }
}

/// True when `positions` is a permutation of `0..positions.len()`.
pub fn is_dense(positions: &[Position]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, p)| *p == i as Position)
}

/// In-memory board for one container.
#[derive(Debug, Clone, Default)]
pub struct Board<K, B> {
    items: BTreeMap<K, Placement<B>>,
}

impl<K, B> Board<K, B>
where
    K: Ord + Clone,
    B: Clone + Eq + Hash + Ord,
{
    pub fn new() -> Self {
        Self { items: BTreeMap::new() }
    }

    /// Appends an item at the end of `bucket`.
    pub fn push(&mut self, id: K, bucket: B) {
        let position = self.len_of(&bucket) as Position;
        self.items.insert(id, Placement::new(bucket, position));
    }

    pub fn placement(&self, id: &K) -> Option<&Placement<B>> {
        self.items.get(id)
    }

    pub fn len_of(&self, bucket: &B) -> usize {
        self.items.values().filter(|p| &p.bucket == bucket).count()
    }

    pub fn positions(&self, bucket: &B) -> Vec<Position> {
        let mut positions: Vec<_> = self
            .items
            .values()
            .filter(|p| &p.bucket == bucket)
            .map(|p| p.position)
            .collect();
        positions.sort_unstable();
        positions
    }

    pub fn buckets(&self) -> Vec<B> {
        let mut buckets: Vec<B> = self.items.values().map(|p| p.bucket.clone()).collect();
        buckets.sort();
        buckets.dedup();
        buckets
    }

    pub fn is_dense(&self) -> bool {
        self.buckets().iter().all(|b| is_dense(&self.positions(b)))
    }

    /// Moves `id` to `requested` in `bucket`, clamping the position. Returns
    /// the plan that was applied, or `None` for an unknown id.
    pub fn move_item(&mut self, id: &K, bucket: B, requested: Position) -> Option<MovePlan<B>> {
        let from = self.items.get(id)?.clone();
        let len = if from.bucket == bucket {
            self.len_of(&bucket) - 1
        } else {
            self.len_of(&bucket)
        };
        let to = Placement::new(bucket, clamp_position(requested, len));
        let plan = plan_move(&from, &to);
        self.apply(id, &plan);
        Some(plan)
    }

    pub fn apply(&mut self, id: &K, plan: &MovePlan<B>) {
        for (key, placement) in self.items.iter_mut() {
            if key == id {
                continue;
            }
            for shift in &plan.shifts {
                if shift.covers(&placement.bucket, placement.position) {
                    placement.position += shift.delta;
                    break;
                }
            }
        }
        if let Some(placement) = self.items.get_mut(id) {
            *placement = plan.target.clone();
        }
    }
}
