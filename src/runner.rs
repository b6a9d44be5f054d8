//! Drives the network simulator until a caller-supplied predicate holds or
//! a wall-clock deadline elapses. The only wall-clock read permitted
//! anywhere in this crate; the simulator itself never touches real time.

use std::time::{Duration, Instant};

use crate::net::bus::NetworkSim;
use crate::net::NetError;

/// Default safety deadline for [`run_until`]'s convenience overload.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tick `bus` until `predicate` returns true, or fail with
/// [`NetError::Timeout`] once `timeout` has elapsed. This is a wall-clock
/// safety net for test harnesses, not a semantic timeout inside the
/// simulator.
pub fn run_until<F>(bus: &mut NetworkSim, mut predicate: F, timeout: Duration) -> Result<(), NetError>
where
    F: FnMut(&NetworkSim) -> bool,
{
    let start = Instant::now();
    loop {
        if predicate(bus) {
            return Ok(());
        }
        bus.tick();
        if start.elapsed() > timeout {
            return Err(NetError::Timeout(timeout));
        }
    }
}

/// `run_until` with the default 30-second safety deadline.
pub fn run_until_default<F>(bus: &mut NetworkSim, predicate: F) -> Result<(), NetError>
where
    F: FnMut(&NetworkSim) -> bool,
{
    run_until(bus, predicate, DEFAULT_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Endpoint;

    #[test]
    fn run_until_returns_once_predicate_holds() {
        let mut sim = NetworkSim::new(1);
        sim.register_handler(Endpoint::new("b"), Box::new(|_env, _sim| {}));
        sim.send(b"x".to_vec(), Endpoint::new("a"), Endpoint::new("b"));

        let mut ticked = 0u64;
        run_until(
            &mut sim,
            |s| {
                ticked = s.current_tick();
                s.pending_count() == 0 && s.current_tick() > 0
            },
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(ticked >= 1);
    }

    #[test]
    fn run_until_times_out_when_predicate_never_holds() {
        let mut sim = NetworkSim::new(1);
        let err = run_until(&mut sim, |_| false, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, NetError::Timeout(_)));
    }
}
