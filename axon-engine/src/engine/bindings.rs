//! Spike propagation bindings built on [`Pathway`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use axon_core::pathway::Pathway;
use axon_core::sync::TickContext;

use super::binding::Binding;
use super::error::BindingError;

/// Indices of the neurons of one population that spiked in the current tick.
///
/// Written once per tick by the population's own binding (on the designated
/// worker) and read by bindings that run after it in the same tick.
#[derive(Debug)]
pub struct SpikeSpace {
    size: usize,
    spikes: RwLock<Vec<usize>>,
}

impl SpikeSpace {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            spikes: RwLock::new(Vec::new()),
        }
    }

    /// Population size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Replaces the spike list. Indices are sorted before publishing.
    pub fn publish(&self, mut spikes: Vec<usize>) {
        spikes.sort_unstable();
        *self.spikes.write() = spikes;
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<usize>> {
        self.spikes.read()
    }
}

/// Advances every worker's queue, then queues the items of current spikes.
///
/// Advancing first puts a zero-step delay in the slot delivered this tick.
pub struct PushSpikes {
    name: String,
    pathway: Arc<Pathway>,
    spikes: Arc<SpikeSpace>,
    pushed: AtomicU64,
}

impl PushSpikes {
    pub fn new(pathway: Arc<Pathway>, spikes: Arc<SpikeSpace>) -> Self {
        Self {
            name: format!("{}_push", pathway.name()),
            pathway,
            spikes,
            pushed: AtomicU64::new(0),
        }
    }

    /// Items queued so far, over all workers.
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }
}

impl Binding for PushSpikes {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &TickContext<'_>) -> Result<(), BindingError> {
        self.pathway.ensure_workers(ctx.workers)?;
        self.pathway.advance(ctx.worker)?;
        let queued = self.pathway.push(ctx.worker, &self.spikes.read())?;
        self.pushed.fetch_add(queued as u64, Ordering::Relaxed);
        Ok(())
    }
}

/// Hands every item due this tick to `on_item`, each worker taking a
/// contiguous chunk of the merged list.
pub struct DeliverSpikes<F> {
    name: String,
    pathway: Arc<Pathway>,
    on_item: F,
    delivered: AtomicU64,
}

impl<F> DeliverSpikes<F>
where
    F: Fn(usize, &TickContext<'_>) -> Result<(), BindingError> + Send + Sync,
{
    pub fn new(pathway: Arc<Pathway>, on_item: F) -> Self {
        Self {
            name: format!("{}_deliver", pathway.name()),
            pathway,
            on_item,
            delivered: AtomicU64::new(0),
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl<F> Binding for DeliverSpikes<F>
where
    F: Fn(usize, &TickContext<'_>) -> Result<(), BindingError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &TickContext<'_>) -> Result<(), BindingError> {
        let items = self.pathway.synchronized_peek(ctx)?;
        let chunk = ctx.chunk(items.len());
        let count = chunk.len() as u64;
        for &item in &items[chunk] {
            (self.on_item)(item, ctx)?;
        }
        self.delivered.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::binding::FnBinding;
    use crate::engine::error::SimulationError;
    use crate::engine::network::Network;
    use axon_core::pathway::RemainderPolicy;
    use axon_core::time::Clock;
    use parking_lot::Mutex;

    /// Source 0 fires at step 0 only; items 0..6 from source 0 with delays
    /// of 0..6 steps.
    fn delivery_log(workers: usize) -> Vec<(usize, u64)> {
        let dt = 0.5;
        let spikes = Arc::new(SpikeSpace::new(2));
        let pathway = Arc::new(
            Pathway::new("syn", 0..2, workers, RemainderPolicy::LastWorker).unwrap(),
        );
        let delays: Vec<f64> = (0..6).map(|d| d as f64 * dt).collect();
        pathway.prepare(&delays, &[0; 6], dt).unwrap();

        let log: Arc<Mutex<Vec<(usize, u64)>>> = Arc::default();
        let mut network = Network::new(workers);
        let clock = network.add_clock(Clock::new("main", dt).unwrap());

        let source = Arc::clone(&spikes);
        network
            .add(
                clock,
                Arc::new(FnBinding::new("source", move |ctx| {
                    if ctx.is_designated() {
                        source.publish(if ctx.step == 0 { vec![0] } else { vec![] });
                    }
                    Ok(())
                })),
            )
            .unwrap();
        network
            .add(
                clock,
                Arc::new(PushSpikes::new(Arc::clone(&pathway), Arc::clone(&spikes))),
            )
            .unwrap();
        let sink = Arc::clone(&log);
        network
            .add(
                clock,
                Arc::new(DeliverSpikes::new(Arc::clone(&pathway), move |item, ctx| {
                    sink.lock().push((item, ctx.step));
                    Ok(())
                })),
            )
            .unwrap();

        network.run(10.0 * dt).unwrap();
        let mut log = log.lock().clone();
        log.sort_unstable();
        log
    }

    #[test]
    fn items_arrive_after_their_delay() {
        let expected: Vec<(usize, u64)> = (0..6).map(|i| (i, i as u64)).collect();
        assert_eq!(delivery_log(1), expected);
    }

    #[test]
    fn delivery_does_not_depend_on_worker_count() {
        let reference = delivery_log(1);
        for workers in [2, 4, 6] {
            assert_eq!(delivery_log(workers), reference, "workers = {workers}");
        }
    }

    #[test]
    fn failing_delivery_stops_the_pool() {
        let workers = 8;
        let dt = 0.5;
        let spikes = Arc::new(SpikeSpace::new(1));
        spikes.publish(vec![0]);
        let pathway = Arc::new(
            Pathway::new("syn", 0..1, workers, RemainderPolicy::LastWorker).unwrap(),
        );
        pathway.prepare(&[0.0; 16], &[0; 16], dt).unwrap();

        let mut network = Network::new(workers);
        let clock = network.add_clock(Clock::new("main", dt).unwrap());
        network
            .add(
                clock,
                Arc::new(PushSpikes::new(Arc::clone(&pathway), Arc::clone(&spikes))),
            )
            .unwrap();
        let deliver = Arc::new(DeliverSpikes::new(Arc::clone(&pathway), |item, ctx| {
            if ctx.step == 4 && item == 15 {
                return Err(BindingError::Failed(format!("cannot deliver {item}")));
            }
            Ok(())
        }));
        network.add(clock, deliver.clone()).unwrap();
        network
            .add(clock, Arc::new(DeliverSpikes::new(pathway, |_, _| Ok(()))))
            .unwrap();

        let (done, outcome) = crossbeam::channel::bounded(1);
        std::thread::spawn(move || {
            let _ = done.send(network.run(100.0 * dt));
        });
        let result = outcome
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("worker pool is stuck");
        match result {
            Err(SimulationError::Binding { binding, t, .. }) => {
                assert_eq!(binding, "syn_deliver");
                assert_eq!(t, 4.0 * dt);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // Four full ticks of 16 items, plus the chunks of the failing tick
        // that did not fail.
        assert_eq!(deliver.delivered(), 4 * 16 + 14);
    }

    #[test]
    fn mismatched_pool_is_an_error() {
        let pathway = Arc::new(Pathway::new("syn", 0..1, 2, RemainderPolicy::Drop).unwrap());
        pathway.prepare(&[0.0], &[0], 1.0).unwrap();
        let push = PushSpikes::new(pathway, Arc::new(SpikeSpace::new(1)));
        let ctx = TickContext::solo(0.0, 1.0, 0);
        assert!(matches!(
            push.execute(&ctx),
            Err(BindingError::Pathway(
                axon_core::PathwayError::WorkerCountMismatch { .. }
            ))
        ));
    }

    #[test]
    fn spike_space_publishes_sorted() {
        let space = SpikeSpace::new(10);
        space.publish(vec![7, 2, 5]);
        assert_eq!(*space.read(), vec![2, 5, 7]);
        assert_eq!(space.size(), 10);
    }
}
