//! ## axon-core::queue
//! **Circular delay queue for spike delivery**
//!
//! `slots[(offset + d) % len]` holds the items due `d` steps from now. The
//! ring grows on demand when a push needs a longer delay than it can hold,
//! and is remapped when the step size changes between runs.
//!
//! ### Invariants:
//! - `offset < len` and `len >= 1`
//! - `len` only shrinks through a step-size remap
//! - without a step-size change, queued + delivered == pushed
//!
//! Items are identified by their global index into the delay/source arrays
//! handed to [`DelayQueue::prepare`].

use std::ops::Range;

use tracing::{debug, trace};

use crate::error::QueueError;

#[derive(Debug, Clone)]
pub struct DelayQueue {
    slots: Vec<Vec<usize>>,
    offset: usize,
    /// Step size of the last `prepare`, `None` before the first one.
    dt: Option<f64>,
    /// Integer step delay per item, indexed by `item - first_item`.
    delays: Vec<usize>,
    first_item: usize,
    source_start: usize,
    source_stop: usize,
    /// Items triggered by each source, indexed by `source - source_start`.
    partition: Vec<Vec<usize>>,
}

impl DelayQueue {
    /// Creates an empty queue serving sources in `[source_start, source_stop)`.
    pub fn new(source_start: usize, source_stop: usize) -> Self {
        let sources = source_stop.saturating_sub(source_start);
        Self {
            slots: vec![Vec::new()],
            offset: 0,
            dt: None,
            delays: Vec::new(),
            first_item: 0,
            source_start,
            source_stop,
            partition: vec![Vec::new(); sources],
        }
    }

    /// Number of slots in the ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; the ring holds at least the "now" slot.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn dt(&self) -> Option<f64> {
        self.dt
    }

    pub fn source_range(&self) -> Range<usize> {
        self.source_start..self.source_stop
    }

    /// Items currently waiting in any slot.
    pub fn pending(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    /// Integer step delay of a prepared item.
    pub fn delay_of(&self, item: usize) -> Option<usize> {
        item.checked_sub(self.first_item)
            .and_then(|local| self.delays.get(local))
            .copied()
    }

    /// Items of this queue triggered by `source`.
    pub fn targets_of(&self, source: usize) -> &[usize] {
        source
            .checked_sub(self.source_start)
            .and_then(|local| self.partition.get(local))
            .map_or(&[], Vec::as_slice)
    }

    /// (Re)computes integer delays and the source partition.
    ///
    /// `delays[i]` and `sources[i]` describe item `first_item + i`. When the
    /// step size differs from the previous call, items already in flight are
    /// moved to the slot matching their remaining delay at the new step size.
    /// On error the queue is left untouched.
    pub fn prepare(
        &mut self,
        delays: &[f64],
        sources: &[usize],
        first_item: usize,
        dt: f64,
    ) -> Result<(), QueueError> {
        check_inputs(delays, sources, first_item, dt, self.source_range())?;

        let mut steps = Vec::with_capacity(delays.len());
        let mut partition = vec![Vec::new(); self.partition.len()];
        for (i, (&delay, &source)) in delays.iter().zip(sources).enumerate() {
            steps.push((delay / dt).round() as usize);
            partition[source - self.source_start].push(first_item + i);
        }

        if let Some(old_dt) = self.dt {
            if old_dt != dt {
                self.remap(old_dt, dt)?;
            }
        }

        debug!(
            items = steps.len(),
            first_item,
            dt,
            max_delay = steps.iter().max().copied().unwrap_or(0),
            "prepared delay queue"
        );

        self.delays = steps;
        self.partition = partition;
        self.first_item = first_item;
        self.dt = Some(dt);
        Ok(())
    }

    /// Rebuilds the ring for a new step size, keeping every in-flight item.
    fn remap(&mut self, old_dt: f64, new_dt: f64) -> Result<(), QueueError> {
        let factor = old_dt / new_dt;
        let old_len = self.slots.len();
        let mut old = std::mem::take(&mut self.slots);
        old.rotate_left(self.offset);

        // For factors below one half the last slot can round past
        // `floor(old_len * factor)`, so the ring is sized to hold it.
        let last_target = remapped_slot(old_len - 1, factor);
        let new_len = ((old_len as f64 * factor).floor() as usize + 1).max(last_target + 1);

        let mut slots = match allocate_slots(new_len) {
            Ok(slots) => slots,
            Err(e) => {
                old.rotate_right(self.offset);
                self.slots = old;
                return Err(e);
            }
        };
        for (i, items) in old.into_iter().enumerate() {
            if items.is_empty() {
                continue;
            }
            // Several old slots may collapse onto one new slot.
            slots[remapped_slot(i, factor)].extend(items);
        }

        debug!(old_dt, new_dt, old_len, new_len, "remapped in-flight spikes");
        self.slots = slots;
        self.offset = 0;
        Ok(())
    }

    /// Grows the ring to `new_len` slots, rotating so that `offset` becomes 0.
    /// No-op when the ring is already at least that long.
    pub fn expand(&mut self, new_len: usize) -> Result<(), QueueError> {
        let len = self.slots.len();
        if new_len <= len {
            return Ok(());
        }
        self.slots
            .try_reserve_exact(new_len - len)
            .map_err(|_| QueueError::CapacityExhausted { requested: new_len })?;
        self.slots.rotate_left(self.offset);
        self.offset = 0;
        self.slots.resize_with(new_len, Vec::new);
        trace!(from = len, to = new_len, "expanded delay queue");
        Ok(())
    }

    #[inline]
    pub fn ensure_capacity(&mut self, len: usize) -> Result<(), QueueError> {
        if len > self.slots.len() {
            self.expand(len)?;
        }
        Ok(())
    }

    /// Queues the items of every spiking source in this queue's source range.
    ///
    /// `spikes` must be sorted ascending. Returns the number of items queued.
    pub fn push(&mut self, spikes: &[usize]) -> Result<usize, QueueError> {
        debug_assert!(
            spikes.windows(2).all(|w| w[0] <= w[1]),
            "spike indices must be sorted"
        );
        let start = spikes.partition_point(|&s| s < self.source_start);
        let stop = spikes.partition_point(|&s| s < self.source_stop).max(start);

        let mut queued = 0;
        for &source in &spikes[start..stop] {
            let local = source - self.source_start;
            for k in 0..self.partition[local].len() {
                let item = self.partition[local][k];
                let delay = self.delays[item - self.first_item];
                let needed = delay
                    .checked_add(1)
                    .ok_or(QueueError::CapacityExhausted { requested: usize::MAX })?;
                self.ensure_capacity(needed)?;
                let len = self.slots.len();
                self.slots[(self.offset + delay) % len].push(item);
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Items due now. Invalidated by the next [`advance`](Self::advance).
    #[inline]
    pub fn peek(&self) -> &[usize] {
        &self.slots[self.offset]
    }

    /// Drops the items due now and moves to the next step.
    #[inline]
    pub fn advance(&mut self) {
        // `clear` keeps the slot's allocation for reuse.
        self.slots[self.offset].clear();
        self.offset = (self.offset + 1) % self.slots.len();
    }
}

/// New position of old slot `i` (relative to the offset) after a step change.
///
/// Slot 0 has already been delivered in the current tick; anything still
/// pending stays at least one slot ahead of it.
fn remapped_slot(i: usize, factor: f64) -> usize {
    if i == 0 {
        0
    } else {
        ((i as f64 * factor).round() as usize).max(1)
    }
}

/// Validates the arrays handed to `prepare` without touching any queue.
pub(crate) fn check_inputs(
    delays: &[f64],
    sources: &[usize],
    first_item: usize,
    dt: f64,
    range: Range<usize>,
) -> Result<(), QueueError> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(QueueError::InvalidStep(dt));
    }
    if delays.len() != sources.len() {
        return Err(QueueError::LengthMismatch {
            delays: delays.len(),
            sources: sources.len(),
        });
    }
    for (i, (&delay, &source)) in delays.iter().zip(sources).enumerate() {
        let item = first_item + i;
        if !(delay.is_finite() && delay >= 0.0) {
            return Err(QueueError::InvalidDelay { item, delay });
        }
        if !range.contains(&source) {
            return Err(QueueError::SourceOutOfRange {
                item,
                index: source,
                start: range.start,
                stop: range.end,
            });
        }
    }
    Ok(())
}

fn allocate_slots(len: usize) -> Result<Vec<Vec<usize>>, QueueError> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(len)
        .map_err(|_| QueueError::CapacityExhausted { requested: len })?;
    slots.resize_with(len, Vec::new);
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Advances until `item` shows up and returns the step, scanning at most `limit` steps.
    fn delivery_steps(queue: &mut DelayQueue, item: usize, limit: usize) -> Vec<usize> {
        let mut seen = Vec::new();
        for step in 0..limit {
            seen.extend(queue.peek().iter().filter(|&&i| i == item).map(|_| step));
            queue.advance();
        }
        seen
    }

    #[test]
    fn starts_with_single_slot() {
        let queue = DelayQueue::new(0, 4);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.offset(), 0);
        assert!(queue.peek().is_empty());
        assert_eq!(queue.dt(), None);
    }

    #[test]
    fn delivers_after_delay() {
        let mut queue = DelayQueue::new(0, 2);
        queue
            .prepare(&[0.0, 2.0, 3.0], &[0, 0, 1], 0, 1.0)
            .unwrap();
        assert_eq!(queue.push(&[0]).unwrap(), 2);
        assert_eq!(queue.peek(), &[0]);
        queue.advance();
        assert!(queue.peek().is_empty());
        queue.advance();
        assert_eq!(queue.peek(), &[1]);
        queue.advance();
        assert!(queue.peek().is_empty());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn rounds_continuous_delays() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[0.24, 0.26, 1.0], &[0, 0, 0], 10, 0.1).unwrap();
        assert_eq!(queue.delay_of(10), Some(2));
        assert_eq!(queue.delay_of(11), Some(3));
        assert_eq!(queue.delay_of(12), Some(10));
        assert_eq!(queue.delay_of(9), None);
        assert_eq!(queue.targets_of(0), &[10, 11, 12]);
    }

    #[test]
    fn push_only_processes_sources_in_range() {
        let mut queue = DelayQueue::new(5, 10);
        queue.prepare(&[1.0, 1.0, 1.0], &[5, 7, 9], 0, 1.0).unwrap();
        let queued = queue.push(&[2, 5, 9, 20]).unwrap();
        assert_eq!(queued, 2);
        queue.advance();
        assert_eq!(queue.peek(), &[0, 2]);
    }

    #[test]
    fn push_without_matches_is_empty() {
        let mut queue = DelayQueue::new(5, 10);
        queue.prepare(&[1.0], &[5], 0, 1.0).unwrap();
        assert_eq!(queue.push(&[]).unwrap(), 0);
        assert_eq!(queue.push(&[0, 1, 2]).unwrap(), 0);
        assert_eq!(queue.push(&[10, 11]).unwrap(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn ring_rotation_returns_to_start() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[4.0, 2.0], &[0, 0], 0, 1.0).unwrap();
        queue.push(&[0]).unwrap();
        queue.advance();
        queue.push(&[0]).unwrap();
        let len = queue.len();
        let offset = queue.offset();
        for _ in 0..len {
            queue.advance();
        }
        assert_eq!(queue.offset(), offset);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn expand_is_noop_when_not_growing() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[3.0, 1.0], &[0, 0], 0, 1.0).unwrap();
        queue.push(&[0]).unwrap();
        queue.advance();
        let before = queue.clone();
        queue.expand(2).unwrap();
        queue.expand(before.len()).unwrap();
        assert_eq!(queue.offset(), before.offset());
        assert_eq!(queue.slots, before.slots);
    }

    #[test]
    fn expand_preserves_relative_positions() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[2.0], &[0], 0, 1.0).unwrap();
        queue.push(&[0]).unwrap();
        queue.advance();
        assert_eq!(queue.offset(), 1);
        queue.expand(8).unwrap();
        assert_eq!(queue.offset(), 0);
        assert_eq!(queue.len(), 8);
        queue.advance();
        assert_eq!(queue.peek(), &[0]);
    }

    #[test]
    fn step_size_change_keeps_absolute_delivery_time() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[10.0], &[0], 0, 1.0).unwrap();
        queue.push(&[0]).unwrap();
        queue.prepare(&[10.0], &[0], 0, 0.5).unwrap();
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.delay_of(0), Some(20));

        let steps = delivery_steps(&mut queue, 0, 40);
        assert_eq!(steps.len(), 1, "delivered exactly once");
        assert!((19..=20).contains(&steps[0]), "delivered at {}", steps[0]);
    }

    #[test]
    fn step_size_change_after_partial_progress() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[6.0], &[0], 0, 1.0).unwrap();
        queue.push(&[0]).unwrap();
        for _ in 0..2 {
            queue.advance();
        }
        // Four old steps remain, i.e. eight steps at half the step size.
        queue.prepare(&[6.0], &[0], 0, 0.5).unwrap();
        assert_eq!(queue.offset(), 0);
        let steps = delivery_steps(&mut queue, 0, 30);
        assert_eq!(steps, vec![8]);
    }

    #[test]
    fn coarser_step_merges_slots_without_loss() {
        let mut queue = DelayQueue::new(0, 4);
        queue
            .prepare(&[1.0, 2.0, 3.0, 4.0], &[0, 1, 2, 3], 0, 1.0)
            .unwrap();
        queue.push(&[0, 1, 2, 3]).unwrap();
        queue.prepare(&[1.0, 2.0, 3.0, 4.0], &[0, 1, 2, 3], 0, 2.0).unwrap();
        assert_eq!(queue.pending(), 4);

        let mut delivered = Vec::new();
        for _ in 0..queue.len() {
            delivered.extend_from_slice(queue.peek());
            queue.advance();
        }
        delivered.sort_unstable();
        assert_eq!(delivered, vec![0, 1, 2, 3]);
    }

    #[test]
    fn strongly_coarser_step_stays_in_bounds() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[18.0], &[0], 0, 1.0).unwrap();
        queue.push(&[0]).unwrap();
        assert_eq!(queue.len(), 19);
        queue.prepare(&[18.0], &[0], 0, 10.0).unwrap();
        assert_eq!(queue.pending(), 1);
        let steps = delivery_steps(&mut queue, 0, 5);
        assert_eq!(steps, vec![2]);
    }

    #[test]
    fn coarser_step_never_folds_into_the_due_slot() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[1.0], &[0], 0, 1.0).unwrap();
        queue.push(&[0]).unwrap();
        queue.prepare(&[1.0], &[0], 0, 4.0).unwrap();
        assert!(queue.peek().is_empty());
        assert_eq!(delivery_steps(&mut queue, 0, 4), vec![1]);
    }

    #[test]
    fn huge_delay_is_capacity_error() {
        let mut queue = DelayQueue::new(0, 1);
        queue.prepare(&[1e300], &[0], 0, 1.0).unwrap();
        assert_eq!(queue.delay_of(0), Some(usize::MAX));
        assert!(matches!(
            queue.push(&[0]),
            Err(QueueError::CapacityExhausted { .. })
        ));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn invalid_prepare_leaves_queue_untouched() {
        let mut queue = DelayQueue::new(2, 4);
        queue.prepare(&[1.0], &[2], 0, 1.0).unwrap();
        queue.push(&[2]).unwrap();

        assert_eq!(
            queue.prepare(&[1.0], &[2], 0, 0.0),
            Err(QueueError::InvalidStep(0.0))
        );
        assert!(matches!(
            queue.prepare(&[1.0, 2.0], &[2], 0, 1.0),
            Err(QueueError::LengthMismatch { delays: 2, sources: 1 })
        ));
        assert!(matches!(
            queue.prepare(&[-1.0], &[2], 0, 0.5),
            Err(QueueError::InvalidDelay { item: 0, .. })
        ));
        assert!(matches!(
            queue.prepare(&[1.0], &[4], 0, 0.5),
            Err(QueueError::SourceOutOfRange { index: 4, .. })
        ));

        assert_eq!(queue.dt(), Some(1.0));
        assert_eq!(queue.pending(), 1);
        queue.advance();
        assert_eq!(queue.peek(), &[0]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(Vec<usize>),
        Advance,
    }

    fn op_strategy(sources: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::btree_set(0..sources, 0..sources)
                .prop_map(|set| Op::Push(set.into_iter().collect())),
            Just(Op::Advance),
        ]
    }

    proptest! {
        #[test]
        fn conserves_items(
            synapses in prop::collection::vec((0usize..6, 0.0f64..12.0), 1..40),
            ops in prop::collection::vec(op_strategy(8), 0..60),
        ) {
            let (sources, delays): (Vec<usize>, Vec<f64>) = synapses.iter().copied().unzip();
            let mut queue = DelayQueue::new(0, 6);
            queue.prepare(&delays, &sources, 0, 1.0).unwrap();

            let mut pushed = 0;
            let mut delivered = 0;
            for op in ops {
                match op {
                    Op::Push(spikes) => pushed += queue.push(&spikes).unwrap(),
                    Op::Advance => {
                        delivered += queue.peek().len();
                        queue.advance();
                    }
                }
                prop_assert!(queue.offset() < queue.len());
                prop_assert_eq!(pushed, delivered + queue.pending());
            }
            for _ in 0..queue.len() {
                delivered += queue.peek().len();
                queue.advance();
            }
            prop_assert_eq!(pushed, delivered);
        }

        #[test]
        fn remap_conserves_in_flight_items(
            synapses in prop::collection::vec((0usize..4, 0.0f64..8.0), 1..20),
            advances in 0usize..6,
            new_dt in prop_oneof![Just(0.25f64), Just(0.5), Just(2.0), Just(3.0), Just(0.3)],
        ) {
            let (sources, delays): (Vec<usize>, Vec<f64>) = synapses.iter().copied().unzip();
            let mut queue = DelayQueue::new(0, 4);
            queue.prepare(&delays, &sources, 0, 1.0).unwrap();
            queue.push(&[0, 1, 2, 3]).unwrap();
            for _ in 0..advances {
                queue.advance();
            }
            let in_flight = queue.pending();
            queue.prepare(&delays, &sources, 0, new_dt).unwrap();
            prop_assert_eq!(queue.pending(), in_flight);
            prop_assert_eq!(queue.offset(), 0);
        }
    }
}
