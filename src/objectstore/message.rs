//! Object store wire messages: request/response framing for the
//! PUT/GET/DELETE/LIST/SIZE/RANGE RPCs, travelling as raw bytes inside a
//! network [`Envelope`](crate::net::Envelope) payload. Follows the same
//! big-endian, length-prefixed style as the value serializer
//! (`crate::value`).

use crate::net::{NetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Put,
    Get,
    Delete,
    List,
    Size,
    Range,
}

impl Op {
    fn tag(self) -> u8 {
        match self {
            Op::Put => 0,
            Op::Get => 1,
            Op::Delete => 2,
            Op::List => 3,
            Op::Size => 4,
            Op::Range => 5,
        }
    }

    fn from_tag(tag: u8) -> Result<Op> {
        Ok(match tag {
            0 => Op::Put,
            1 => Op::Get,
            2 => Op::Delete,
            3 => Op::List,
            4 => Op::Size,
            5 => Op::Range,
            other => return Err(NetError::CorruptMessage(format!("unknown op tag {other}"))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    Error,
}

impl Status {
    fn tag(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::NotFound => 1,
            Status::Error => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Status> {
        Ok(match tag {
            0 => Status::Ok,
            1 => Status::NotFound,
            2 => Status::Error,
            other => return Err(NetError::CorruptMessage(format!("unknown status tag {other}"))),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub request_id: u64,
    pub op: Op,
    pub key: Vec<u8>,
    pub payload: Option<Vec<u8>>,
    pub range: Option<(u64, u64)>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub request_id: u64,
    pub op: Op,
    pub status: Status,
    pub payload: Option<Vec<u8>>,
    pub size: Option<u64>,
    pub keys: Option<Vec<Vec<u8>>>,
}

struct Writer(Vec<u8>);

impl Writer {
    fn new() -> Self {
        Writer(Vec::new())
    }
    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }
    fn u64(&mut self, v: u64) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }
    fn bytes(&mut self, b: &[u8]) {
        self.u64(b.len() as u64);
        self.0.extend_from_slice(b);
    }
    fn option_bytes(&mut self, b: &Option<Vec<u8>>) {
        match b {
            None => self.u8(0),
            Some(v) => {
                self.u8(1);
                self.bytes(v);
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.bytes.len() {
            return Err(NetError::CorruptMessage("truncated message".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u64()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn option_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(match self.u8()? {
            0 => None,
            _ => Some(self.bytes()?),
        })
    }
}

pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut w = Writer::new();
    w.u64(req.request_id);
    w.u8(req.op.tag());
    w.bytes(&req.key);
    w.option_bytes(&req.payload);
    match req.range {
        None => w.u8(0),
        Some((start, end)) => {
            w.u8(1);
            w.u64(start);
            w.u64(end);
        }
    }
    w.0
}

pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let mut r = Reader::new(bytes);
    let request_id = r.u64()?;
    let op = Op::from_tag(r.u8()?)?;
    let key = r.bytes()?;
    let payload = r.option_bytes()?;
    let range = match r.u8()? {
        0 => None,
        _ => Some((r.u64()?, r.u64()?)),
    };
    Ok(Request { request_id, op, key, payload, range })
}

pub fn encode_response(resp: &Response) -> Vec<u8> {
    let mut w = Writer::new();
    w.u64(resp.request_id);
    w.u8(resp.op.tag());
    w.u8(resp.status.tag());
    w.option_bytes(&resp.payload);
    match resp.size {
        None => w.u8(0),
        Some(s) => {
            w.u8(1);
            w.u64(s);
        }
    }
    match &resp.keys {
        None => w.u8(0),
        Some(keys) => {
            w.u8(1);
            w.u64(keys.len() as u64);
            for k in keys {
                w.bytes(k);
            }
        }
    }
    w.0
}

pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let mut r = Reader::new(bytes);
    let request_id = r.u64()?;
    let op = Op::from_tag(r.u8()?)?;
    let status = Status::from_tag(r.u8()?)?;
    let payload = r.option_bytes()?;
    let size = match r.u8()? {
        0 => None,
        _ => Some(r.u64()?),
    };
    let keys = match r.u8()? {
        0 => None,
        _ => {
            let count = r.u64()?;
            let mut out = Vec::with_capacity(count as usize);
            for _ in 0..count {
                out.push(r.bytes()?);
            }
            Some(out)
        }
    };
    Ok(Response { request_id, op, status, payload, size, keys })
}
