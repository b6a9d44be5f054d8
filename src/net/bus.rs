//! The tick-driven event queue itself. Single-threaded and synchronous:
//! `tick()` is the only way time advances, and all handler invocations
//! happen inline within it.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::envelope::{Endpoint, Envelope, MessageId};

/// A registered message handler. Takes the delivered envelope and a
/// mutable handle back onto the bus so it can `send` in response during
/// delivery.
pub type Handler = Box<dyn FnMut(Envelope, &mut NetworkSim)>;

fn canonical_pair(a: &Endpoint, b: &Endpoint) -> (Endpoint, Endpoint) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// The deterministic network simulator. All randomness (drop sampling,
/// latency sampling) is drawn from a `StdRng` seeded once at construction;
/// a fixed seed plus a fixed call sequence of `send`/`tick`/`disconnect`
/// reproduces an identical handler-invocation trace.
pub struct NetworkSim {
    seed: u64,
    rng: StdRng,
    current_tick: u64,
    next_id: MessageId,
    pending: Vec<Envelope>,
    handlers: std::collections::HashMap<Endpoint, Handler>,
    partitions: HashSet<(Endpoint, Endpoint)>,
    min_latency: u64,
    max_latency: u64,
    drop_rate: f64,
}

impl NetworkSim {
    /// A fresh simulator at `seed` with immediate (0..0) default latency
    /// and no drops.
    pub fn new(seed: u64) -> Self {
        NetworkSim {
            seed,
            rng: StdRng::seed_from_u64(seed),
            current_tick: 0,
            next_id: 0,
            pending: Vec::new(),
            handlers: std::collections::HashMap::new(),
            partitions: HashSet::new(),
            min_latency: 0,
            max_latency: 0,
            drop_rate: 0.0,
        }
    }

    pub fn with_latency(mut self, min_ticks: u64, max_ticks: u64) -> Self {
        self.min_latency = min_ticks;
        self.max_latency = max_ticks;
        self
    }

    pub fn with_drop_rate(mut self, drop_rate: f64) -> Self {
        self.drop_rate = drop_rate;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn register_handler(&mut self, endpoint: Endpoint, handler: Handler) {
        self.handlers.insert(endpoint, handler);
    }

    fn is_partitioned(&self, a: &Endpoint, b: &Endpoint) -> bool {
        self.partitions.contains(&canonical_pair(a, b))
    }

    /// Sever `a <-> b` bidirectionally. Topology mutations belong between
    /// ticks, not inside handler execution; callers drive this from
    /// outside `tick()`.
    pub fn disconnect(&mut self, a: &Endpoint, b: &Endpoint) {
        self.partitions.insert(canonical_pair(a, b));
    }

    /// Clear every partition, restoring full connectivity.
    pub fn reconnect_all(&mut self) {
        self.partitions.clear();
    }

    /// Clear the pending queue, tick/id counters, and partitions. The seed
    /// is retained, re-seeded fresh so the post-reset stream replays the
    /// same sequence a brand-new simulator at this seed would produce.
    pub fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.current_tick = 0;
        self.next_id = 0;
        self.pending.clear();
        self.partitions.clear();
    }

    /// Send `payload` from `src` to `dst`. Returns `false` (dropped
    /// silently) if the pair is partitioned or drop-rate sampling says to
    /// drop; otherwise samples a delivery latency uniformly from
    /// `[min_latency, max_latency]` and enqueues the envelope. Sampling
    /// order is fixed (drop check, then latency) so the determinism
    /// contract holds.
    pub fn send(&mut self, payload: Vec<u8>, src: Endpoint, dst: Endpoint) -> bool {
        if self.is_partitioned(&src, &dst) {
            return false;
        }
        if self.drop_rate > 0.0 && self.rng.gen::<f64>() < self.drop_rate {
            return false;
        }
        let latency = if self.min_latency == self.max_latency {
            self.min_latency
        } else {
            self.rng.gen_range(self.min_latency..=self.max_latency)
        };
        let id = self.next_id;
        self.next_id += 1;
        let envelope = Envelope {
            id,
            payload,
            source: src,
            destination: dst,
            delivery_tick: self.current_tick + latency,
        };
        self.pending.push(envelope);
        true
    }

    /// Index of the queue-order-earliest envelope due for delivery at or
    /// before `current_tick`, i.e. minimal by `(delivery_tick, id)`.
    fn next_due_index(&self) -> Option<usize> {
        self.pending
            .iter()
            .enumerate()
            .filter(|(_, e)| e.delivery_tick <= self.current_tick)
            .min_by_key(|(_, e)| (e.delivery_tick, e.id))
            .map(|(i, _)| i)
    }

    /// Advance the logical clock by one unit and deliver every envelope
    /// due at or before the new `current_tick`, in `(delivery_tick, id)`
    /// order. A handler invoked during this loop may itself call `send`;
    /// this implementation re-scans the queue head after every delivery,
    /// so a zero-latency send issued mid-tick is delivered within this
    /// **same** `tick()` call rather than deferred to the next one.
    /// Handler effects are visible to subsequent deliveries in the same
    /// tick.
    pub fn tick(&mut self) {
        self.current_tick += 1;
        log::trace!("tick {}: {} envelope(s) pending", self.current_tick, self.pending.len());
        while let Some(idx) = self.next_due_index() {
            let envelope = self.pending.remove(idx);
            if let Some(mut handler) = self.handlers.remove(&envelope.destination) {
                log::debug!(
                    "tick {}: delivering message {} {} -> {}",
                    self.current_tick,
                    envelope.id,
                    envelope.source,
                    envelope.destination
                );
                let destination = envelope.destination.clone();
                handler(envelope, self);
                self.handlers.insert(destination, handler);
            } else {
                log::debug!(
                    "tick {}: dropping message {} for unreachable endpoint {}",
                    self.current_tick,
                    envelope.id,
                    envelope.destination
                );
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ep(name: &str) -> Endpoint {
        Endpoint::new(name)
    }

    #[test]
    fn immediate_latency_delivers_on_next_tick() {
        let mut sim = NetworkSim::new(1);
        let received: Rc<RefCell<Vec<Vec<u8>>>> = Rc::new(RefCell::new(Vec::new()));
        let received_clone = received.clone();
        sim.register_handler(
            ep("b"),
            Box::new(move |env, _sim| received_clone.borrow_mut().push(env.payload)),
        );
        assert!(sim.send(b"hello".to_vec(), ep("a"), ep("b")));
        assert!(received.borrow().is_empty());
        sim.tick();
        assert_eq!(received.borrow().as_slice(), &[b"hello".to_vec()]);
    }

    #[test]
    fn partitioned_pair_drops_silently() {
        let mut sim = NetworkSim::new(1);
        sim.disconnect(&ep("a"), &ep("b"));
        assert!(!sim.send(b"x".to_vec(), ep("a"), ep("b")));
        assert!(!sim.send(b"x".to_vec(), ep("b"), ep("a")));
        assert_eq!(sim.pending_count(), 0);
    }

    #[test]
    fn reconnect_all_restores_delivery() {
        let mut sim = NetworkSim::new(1);
        sim.disconnect(&ep("a"), &ep("b"));
        sim.reconnect_all();
        assert!(sim.send(b"x".to_vec(), ep("a"), ep("b")));
    }

    #[test]
    fn fixed_seed_reproduces_identical_delivery_ticks() {
        // seed=42, latency [1,3], two sends at tick 0.
        let run = || {
            let mut sim = NetworkSim::new(42).with_latency(1, 3);
            let ticks: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
            let ticks_clone = ticks.clone();
            sim.register_handler(
                ep("b"),
                Box::new(move |env, sim| ticks_clone.borrow_mut().push(sim.current_tick().min(env.delivery_tick))),
            );
            sim.send(b"m1".to_vec(), ep("a"), ep("b"));
            sim.send(b"m2".to_vec(), ep("a"), ep("b"));
            for _ in 0..5 {
                sim.tick();
            }
            ticks.borrow().clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn handler_send_during_delivery_is_delivered_same_tick_at_zero_latency() {
        let mut sim = NetworkSim::new(7);
        let hops: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let hops_b = hops.clone();
        sim.register_handler(
            ep("b"),
            Box::new(move |_env, sim| {
                hops_b.borrow_mut().push("b");
                sim.send(b"reply".to_vec(), ep("b"), ep("c"));
            }),
        );
        let hops_c = hops.clone();
        sim.register_handler(ep("c"), Box::new(move |_env, _sim| hops_c.borrow_mut().push("c")));

        sim.send(b"req".to_vec(), ep("a"), ep("b"));
        sim.tick();
        assert_eq!(hops.borrow().as_slice(), &["b", "c"]);
    }

    #[test]
    fn reset_clears_queue_and_partitions_but_keeps_seed() {
        let mut sim = NetworkSim::new(99);
        sim.disconnect(&ep("a"), &ep("b"));
        sim.send(b"x".to_vec(), ep("a"), ep("c"));
        sim.reset();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.pending_count(), 0);
        assert!(sim.send(b"x".to_vec(), ep("a"), ep("b")));
        assert_eq!(sim.seed(), 99);
    }
}
