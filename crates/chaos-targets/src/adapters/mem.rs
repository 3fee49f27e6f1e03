//! Main-memory target adapter.
//!
//! One firing corrupts a single uniformly chosen byte in a configured
//! address window.  The read and the write travel as two packets sharing
//! one request identity, the way a device would read-modify-write through
//! an abstract memory port.  Windows are clamped to the memory's extents
//! at construction, with a warning.

use std::cell::RefCell;
use std::rc::Rc;

use chaos_fault::target::{Selection, TargetAdapter};
use log::warn;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::memory::{AddrRange, MemError, Packet, Request, SimMemory};

/// Memory-engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemConfig {
    /// First injectable address.
    pub addr_start: u64,
    /// Last injectable address (inclusive); `0` means the end of memory.
    pub addr_end: u64,
}

/// A selected byte, carrying the request identity used for both packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemLoc {
    pub req: Request,
}

/// Adapter over a [`SimMemory`] range.
pub struct MemTarget {
    mem: Rc<RefCell<SimMemory>>,
    window: AddrRange,
}

impl MemTarget {
    /// Bind to a memory, clamping the configured window to its extents.
    pub fn new(mem: Rc<RefCell<SimMemory>>, cfg: &MemConfig) -> Self {
        let extents = mem.borrow().range();
        let mut start = cfg.addr_start;
        let mut end = if cfg.addr_end == 0 {
            extents.end
        } else {
            cfg.addr_end
        };
        if start < extents.start || end > extents.end || start > end {
            warn!(
                "injection window [{:#x}, {:#x}] outside memory [{:#x}, {:#x}], clamping",
                start, end, extents.start, extents.end
            );
            start = start.clamp(extents.start, extents.end);
            end = end.clamp(start, extents.end);
        }

        Self {
            mem,
            window: AddrRange::new(start, end),
        }
    }

    /// The clamped injection window.
    pub fn window(&self) -> AddrRange {
        self.window
    }
}

impl TargetAdapter for MemTarget {
    type Location = MemLoc;
    type Key = u64;
    type Error = MemError;
    const MASK_BITS: u32 = 8;
    const LOG_FILE: &'static str = "main_mem_injections.log";

    fn select(&mut self, rng: &mut ChaCha20Rng) -> Result<Selection<MemLoc>, MemError> {
        let addr = rng.gen_range(self.window.start..=self.window.end);
        Ok(Selection::Chosen(vec![MemLoc {
            req: Request::new(addr, 1),
        }]))
    }

    fn read(&self, loc: &MemLoc) -> Result<u64, MemError> {
        let mut pkt = Packet::read_req(loc.req);
        self.mem.borrow_mut().access(&mut pkt)?;
        Ok(u64::from(pkt.data()[0]))
    }

    fn write(&mut self, loc: &MemLoc, value: u64) -> Result<(), MemError> {
        let mut pkt = Packet::write_req(loc.req, vec![value as u8]);
        self.mem.borrow_mut().access(&mut pkt)
    }

    fn key(&self, loc: &MemLoc) -> u64 {
        loc.req.addr
    }

    fn describe(&self, loc: &MemLoc) -> String {
        format!("target addr: {:#x}", loc.req.addr)
    }

    fn locate(&self, key: &u64) -> Option<MemLoc> {
        self.mem.borrow().range().contains(*key).then(|| MemLoc {
            req: Request::new(*key, 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(13)
    }

    fn memory() -> Rc<RefCell<SimMemory>> {
        Rc::new(RefCell::new(SimMemory::new(0x1000, 0x100)))
    }

    #[test]
    fn zero_end_means_end_of_memory() {
        let target = MemTarget::new(
            memory(),
            &MemConfig {
                addr_start: 0x1000,
                addr_end: 0,
            },
        );
        assert_eq!(target.window(), AddrRange::new(0x1000, 0x10FF));
    }

    #[test]
    fn window_clamped_to_extents() {
        let target = MemTarget::new(
            memory(),
            &MemConfig {
                addr_start: 0x0,
                addr_end: 0xFFFF,
            },
        );
        assert_eq!(target.window(), AddrRange::new(0x1000, 0x10FF));
    }

    #[test]
    fn selection_stays_in_window() {
        let mut target = MemTarget::new(
            memory(),
            &MemConfig {
                addr_start: 0x1010,
                addr_end: 0x101F,
            },
        );
        let mut rng = rng();
        for _ in 0..64 {
            match target.select(&mut rng).unwrap() {
                Selection::Chosen(locs) => {
                    assert_eq!(locs.len(), 1);
                    assert!((0x1010..=0x101F).contains(&locs[0].req.addr));
                }
                other => panic!("unexpected selection {other:?}"),
            }
        }
    }

    #[test]
    fn read_and_write_share_request_identity() {
        let mem = memory();
        let mut target = MemTarget::new(Rc::clone(&mem), &MemConfig::default());
        let loc = MemLoc {
            req: Request::new(0x1042, 1),
        };
        target.write(&loc, 0x5A).unwrap();
        assert_eq!(target.read(&loc).unwrap(), 0x5A);
        assert_eq!(mem.borrow_mut().read_byte(0x1042).unwrap(), 0x5A);
    }

    #[test]
    fn locate_rejects_unmapped_addresses() {
        let target = MemTarget::new(memory(), &MemConfig::default());
        assert!(target.locate(&0x1042).is_some());
        assert!(target.locate(&0x0).is_none());
    }
}
