//! A flat main-memory model behind packet access.
//!
//! All reads and writes go through [`Packet`]s carrying a [`Request`], the
//! way abstract memories consume accesses in a full simulator.  A
//! read-modify-write of a single byte is two packets sharing one request
//! identity; [`SimMemory::access`] services both kinds.

use thiserror::Error;

/// An inclusive address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRange {
    pub start: u64,
    pub end: u64,
}

impl AddrRange {
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start <= end, "inverted address range");
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, addr: u64) -> bool {
        (self.start..=self.end).contains(&addr)
    }

    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Memory command carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemCmd {
    ReadReq,
    WriteReq,
}

/// The identity of an access: address and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub addr: u64,
    pub size: usize,
}

impl Request {
    pub fn new(addr: u64, size: usize) -> Self {
        Self { addr, size }
    }
}

/// One memory access in flight.
#[derive(Debug, Clone)]
pub struct Packet {
    cmd: MemCmd,
    req: Request,
    data: Vec<u8>,
}

impl Packet {
    /// A read packet; data is filled in by the memory.
    pub fn read_req(req: Request) -> Self {
        Self {
            cmd: MemCmd::ReadReq,
            req,
            data: vec![0; req.size],
        }
    }

    /// A write packet carrying `data`.
    pub fn write_req(req: Request, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), req.size, "payload does not match request size");
        Self {
            cmd: MemCmd::WriteReq,
            req,
            data,
        }
    }

    #[inline]
    pub fn cmd(&self) -> MemCmd {
        self.cmd
    }

    #[inline]
    pub fn req(&self) -> Request {
        self.req
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Access failures raised by the memory.
#[derive(Debug, Error)]
pub enum MemError {
    #[error("access at {addr:#x}+{size} outside memory range")]
    OutOfRange { addr: u64, size: usize },
}

/// A simulated flat memory.
#[derive(Debug)]
pub struct SimMemory {
    range: AddrRange,
    bytes: Vec<u8>,
}

impl SimMemory {
    /// Create a zero-filled memory covering `[start, start + size)`.
    pub fn new(start: u64, size: u64) -> Self {
        assert!(size > 0, "memory must be non-empty");
        Self {
            range: AddrRange::new(start, start + size - 1),
            bytes: vec![0; size as usize],
        }
    }

    #[inline]
    pub fn range(&self) -> AddrRange {
        self.range
    }

    /// Service one packet, filling read data or applying write data.
    pub fn access(&mut self, pkt: &mut Packet) -> Result<(), MemError> {
        let Request { addr, size } = pkt.req;
        let last = addr
            .checked_add(size as u64)
            .and_then(|e| e.checked_sub(1))
            .ok_or(MemError::OutOfRange { addr, size })?;
        if size == 0 || !self.range.contains(addr) || !self.range.contains(last) {
            return Err(MemError::OutOfRange { addr, size });
        }
        let offset = (addr - self.range.start) as usize;
        match pkt.cmd {
            MemCmd::ReadReq => pkt.data.copy_from_slice(&self.bytes[offset..offset + size]),
            MemCmd::WriteReq => self.bytes[offset..offset + size].copy_from_slice(&pkt.data),
        }
        Ok(())
    }

    /// Convenience byte read used by tests and the demo driver.
    pub fn read_byte(&mut self, addr: u64) -> Result<u8, MemError> {
        let mut pkt = Packet::read_req(Request::new(addr, 1));
        self.access(&mut pkt)?;
        Ok(pkt.data[0])
    }

    /// Convenience byte write used by tests and the demo driver.
    pub fn write_byte(&mut self, addr: u64, value: u8) -> Result<(), MemError> {
        let mut pkt = Packet::write_req(Request::new(addr, 1), vec![value]);
        self.access(&mut pkt)
    }
}
