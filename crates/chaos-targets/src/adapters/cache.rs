//! Cache-block target adapter.
//!
//! One firing corrupts one uniformly chosen valid block at
//! `corruption_size` independent byte offsets, then marks the block dirty
//! in its coherence state so a later writeback carries the corruption
//! outward.  Blocks are enumerated through the cache's visitor interface;
//! the adapter holds no tag-store internals.

use std::cell::RefCell;
use std::rc::Rc;

use chaos_fault::target::{Selection, TargetAdapter};
use log::debug;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheError, SimCache};

/// Cache-engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Independent byte mutations per firing.
    pub corruption_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { corruption_size: 1 }
    }
}

/// A selected byte within a valid block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLoc {
    pub block_addr: u64,
    pub byte_offset: usize,
}

/// Adapter over a [`SimCache`]'s block storage.
pub struct CacheTarget {
    cache: Rc<RefCell<SimCache>>,
    corruption_size: usize,
}

impl CacheTarget {
    pub fn new(cache: Rc<RefCell<SimCache>>, cfg: CacheConfig) -> Self {
        Self {
            cache,
            corruption_size: cfg.corruption_size.max(1),
        }
    }
}

impl TargetAdapter for CacheTarget {
    type Location = CacheLoc;
    type Key = (u64, usize);
    type Error = CacheError;
    const MASK_BITS: u32 = 8;
    const LOG_FILE: &'static str = "cache_injections.log";

    fn select(&mut self, rng: &mut ChaCha20Rng) -> Result<Selection<CacheLoc>, CacheError> {
        let cache = self.cache.borrow();

        let mut valid_blocks = Vec::new();
        cache.for_each_block(|blk| {
            if blk.is_valid() {
                valid_blocks.push(blk.addr());
            }
        });
        if valid_blocks.is_empty() {
            return Ok(Selection::NoValidTarget);
        }

        let block_addr = valid_blocks[rng.gen_range(0..valid_blocks.len())];
        let block_size = cache.block_size();
        let locs = (0..self.corruption_size)
            .map(|_| CacheLoc {
                block_addr,
                byte_offset: rng.gen_range(0..block_size),
            })
            .collect();
        Ok(Selection::Chosen(locs))
    }

    fn read(&self, loc: &CacheLoc) -> Result<u64, CacheError> {
        self.cache
            .borrow()
            .read_byte(loc.block_addr, loc.byte_offset)
            .map(u64::from)
    }

    fn write(&mut self, loc: &CacheLoc, value: u64) -> Result<(), CacheError> {
        self.cache
            .borrow_mut()
            .write_byte(loc.block_addr, loc.byte_offset, value as u8)
    }

    fn key(&self, loc: &CacheLoc) -> (u64, usize) {
        (loc.block_addr, loc.byte_offset)
    }

    fn describe(&self, loc: &CacheLoc) -> String {
        format!(
            "Cache Block Addr: {:#x}, Byte Offset: {}",
            loc.block_addr, loc.byte_offset
        )
    }

    fn locate(&self, key: &(u64, usize)) -> Option<CacheLoc> {
        let (block_addr, byte_offset) = *key;
        let cache = self.cache.borrow();
        if cache.block(block_addr).is_none() || byte_offset >= cache.block_size() {
            return None;
        }
        Some(CacheLoc {
            block_addr,
            byte_offset,
        })
    }

    fn firing_complete(&mut self, locs: &[CacheLoc]) {
        let Some(first) = locs.first() else { return };
        if let Err(e) = self.cache.borrow_mut().mark_dirty(first.block_addr) {
            debug!("could not mark corrupted block dirty: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(11)
    }

    fn cache_with_blocks(addrs: &[u64]) -> Rc<RefCell<SimCache>> {
        let mut cache = SimCache::new("l1d", 64, addrs.len().max(1));
        for &a in addrs {
            cache.fill(a, &[0; 64]);
        }
        Rc::new(RefCell::new(cache))
    }

    #[test]
    fn empty_cache_is_no_valid_target() {
        let mut target = CacheTarget::new(cache_with_blocks(&[]), CacheConfig::default());
        assert_eq!(target.select(&mut rng()).unwrap(), Selection::NoValidTarget);
    }

    #[test]
    fn corruption_size_offsets_in_one_block() {
        let mut target = CacheTarget::new(
            cache_with_blocks(&[0x000, 0x100, 0x200]),
            CacheConfig { corruption_size: 5 },
        );
        match target.select(&mut rng()).unwrap() {
            Selection::Chosen(locs) => {
                assert_eq!(locs.len(), 5);
                let block = locs[0].block_addr;
                assert!(locs.iter().all(|l| l.block_addr == block));
                assert!(locs.iter().all(|l| l.byte_offset < 64));
            }
            other => panic!("unexpected selection {other:?}"),
        }
    }

    #[test]
    fn firing_complete_dirties_the_block() {
        let cache = cache_with_blocks(&[0x40]);
        let mut target = CacheTarget::new(Rc::clone(&cache), CacheConfig::default());
        let loc = CacheLoc {
            block_addr: 0x40,
            byte_offset: 3,
        };
        target.write(&loc, 0xFF).unwrap();
        assert!(!cache.borrow().block(0x40).unwrap().is_dirty());

        target.firing_complete(&[loc]);
        assert!(cache.borrow().block(0x40).unwrap().is_dirty());
    }

    #[test]
    fn locate_fails_after_eviction() {
        let cache = cache_with_blocks(&[0x40]);
        let target = CacheTarget::new(Rc::clone(&cache), CacheConfig::default());
        assert!(target.locate(&(0x40, 0)).is_some());

        cache.borrow_mut().invalidate(0x40);
        assert!(target.locate(&(0x40, 0)).is_none());
    }

    #[test]
    fn read_of_invalidated_block_errors() {
        let cache = cache_with_blocks(&[0x40]);
        let target = CacheTarget::new(Rc::clone(&cache), CacheConfig::default());
        let loc = CacheLoc {
            block_addr: 0x40,
            byte_offset: 0,
        };
        assert!(target.read(&loc).is_ok());

        cache.borrow_mut().invalidate(0x40);
        assert!(matches!(
            target.read(&loc),
            Err(CacheError::BlockNotPresent { .. })
        ));
    }
}
