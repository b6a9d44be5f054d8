//! Object store client: issues PUT/GET/DELETE/LIST/SIZE/RANGE RPCs over
//! the network simulator and resolves a [`Completion`] token when the
//! matching response is delivered. No language-level async runtime is
//! needed; the caller drives resolution by ticking the bus, directly or
//! via the Tick Runner.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use crate::net::bus::NetworkSim;
use crate::net::{Endpoint, NetError, Result};
use crate::objectstore::hashring::HashRing;
use crate::objectstore::message::{self, Op, Request, Response};
use crate::runner;

/// A one-shot completion token resolved by the client's own message
/// handler when the matching response envelope is delivered during a
/// `tick()`.
pub struct Completion<T> {
    slot: Rc<RefCell<Option<T>>>,
}

impl<T> Completion<T> {
    pub fn is_ready(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn take(&mut self) -> Option<T> {
        self.slot.borrow_mut().take()
    }
}

type PendingMap = Rc<RefCell<HashMap<u64, Rc<RefCell<Option<Response>>>>>>;

pub struct ObjectStoreClient {
    endpoint: Endpoint,
    ring: Rc<RefCell<HashRing>>,
    next_request_id: u64,
    pending: PendingMap,
}

impl ObjectStoreClient {
    /// Register this client's response handler on `bus` and return a
    /// client bound to `endpoint`, routing through the shared `ring`.
    pub fn new(endpoint: Endpoint, ring: Rc<RefCell<HashRing>>, bus: &mut NetworkSim) -> Self {
        let pending: PendingMap = Rc::new(RefCell::new(HashMap::new()));
        let pending_for_handler = pending.clone();
        bus.register_handler(
            endpoint.clone(),
            Box::new(move |env, _sim| {
                if let Ok(resp) = message::decode_response(&env.payload) {
                    if let Some(slot) = pending_for_handler.borrow_mut().remove(&resp.request_id) {
                        *slot.borrow_mut() = Some(resp);
                    }
                }
            }),
        );
        ObjectStoreClient {
            endpoint,
            ring,
            next_request_id: 0,
            pending,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn resolve_target(&self, key: &[u8]) -> Option<Endpoint> {
        self.ring.borrow().get_server_for_key(key)
    }

    fn dispatch(&mut self, bus: &mut NetworkSim, target: Endpoint, req: Request) -> Completion<Response> {
        let slot = Rc::new(RefCell::new(None));
        self.pending.borrow_mut().insert(req.request_id, slot.clone());
        let bytes = message::encode_request(&req);
        bus.send(bytes, self.endpoint.clone(), target);
        Completion { slot }
    }

    /// Resolve `req.key` through the ring, stamp a fresh request id, and
    /// send. `None` iff the ring currently has no servers to route to.
    fn request(&mut self, bus: &mut NetworkSim, mut req: Request) -> Option<Completion<Response>> {
        let target = self.resolve_target(&req.key)?;
        req.request_id = self.next_id();
        Some(self.dispatch(bus, target, req))
    }

    pub fn put(&mut self, bus: &mut NetworkSim, key: &[u8], bytes: &[u8]) -> Option<Completion<Response>> {
        self.request(
            bus,
            Request {
                request_id: 0,
                op: Op::Put,
                key: key.to_vec(),
                payload: Some(bytes.to_vec()),
                range: None,
            },
        )
    }

    pub fn get(&mut self, bus: &mut NetworkSim, key: &[u8]) -> Option<Completion<Response>> {
        self.request(
            bus,
            Request {
                request_id: 0,
                op: Op::Get,
                key: key.to_vec(),
                payload: None,
                range: None,
            },
        )
    }

    pub fn delete(&mut self, bus: &mut NetworkSim, key: &[u8]) -> Option<Completion<Response>> {
        self.request(
            bus,
            Request {
                request_id: 0,
                op: Op::Delete,
                key: key.to_vec(),
                payload: None,
                range: None,
            },
        )
    }

    pub fn list(&mut self, bus: &mut NetworkSim, prefix: &[u8]) -> Option<Completion<Response>> {
        self.request(
            bus,
            Request {
                request_id: 0,
                op: Op::List,
                key: prefix.to_vec(),
                payload: None,
                range: None,
            },
        )
    }

    pub fn size(&mut self, bus: &mut NetworkSim, key: &[u8]) -> Option<Completion<Response>> {
        self.request(
            bus,
            Request {
                request_id: 0,
                op: Op::Size,
                key: key.to_vec(),
                payload: None,
                range: None,
            },
        )
    }

    pub fn range(&mut self, bus: &mut NetworkSim, key: &[u8], start: u64, end_inclusive: u64) -> Option<Completion<Response>> {
        self.request(
            bus,
            Request {
                request_id: 0,
                op: Op::Range,
                key: key.to_vec(),
                payload: None,
                range: Some((start, end_inclusive)),
            },
        )
    }

    /// Synchronous wrapper: ticks `bus` until `completion` resolves or
    /// `timeout` elapses.
    pub fn wait(
        &self,
        bus: &mut NetworkSim,
        mut completion: Completion<Response>,
        timeout: Duration,
    ) -> Result<Response> {
        runner::run_until(bus, |_sim| completion.is_ready(), timeout)?;
        completion.take().ok_or(NetError::Timeout(timeout))
    }
}
