//! Register-file target adapter.
//!
//! Selects one register of one eligible thread per firing.  Eligibility
//! is gated three ways: the thread must be live, its PC must match
//! `pc_target` when one is configured, and its last retired instruction
//! must match `inst_target`.  A configured PC gate implies the engine
//! should poll every cycle — wirings read
//! [`requires_polling`](RegTarget::requires_polling) and set the config's
//! `poll_every_cycle` accordingly.

use std::cell::RefCell;
use std::rc::Rc;

use chaos_fault::target::{Selection, TargetAdapter};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::cpu::{CpuError, InstKind, RegClass, RegId, SimCpu, ThreadId, ThreadStatus};

/// Which register files are in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegTargetClass {
    /// Pick uniformly between the classes a thread actually has.
    #[default]
    Both,
    Integer,
    FloatingPoint,
}

/// Instruction-kind gate for register injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstTarget {
    #[default]
    All,
    Nop,
    Load,
    Store,
    Atomic,
    Integer,
    Floating,
    Control,
    Call,
    Return,
    Syscall,
}

impl InstTarget {
    /// Whether a retired instruction of `kind` opens the gate.
    pub fn matches(self, kind: InstKind) -> bool {
        match self {
            InstTarget::All => true,
            InstTarget::Nop => kind == InstKind::Nop,
            InstTarget::Load => kind == InstKind::Load,
            InstTarget::Store => kind == InstKind::Store,
            InstTarget::Atomic => kind == InstKind::Atomic,
            InstTarget::Integer => kind == InstKind::Integer,
            InstTarget::Floating => kind == InstKind::Floating,
            InstTarget::Control => kind == InstKind::Control,
            InstTarget::Call => kind == InstKind::Call,
            InstTarget::Return => kind == InstKind::Return,
            InstTarget::Syscall => kind == InstKind::Syscall,
        }
    }
}

/// Register-engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegConfig {
    pub reg_target_class: RegTargetClass,
    /// Inject only on threads whose PC equals this address; `0` = don't
    /// care.  Non-zero implies poll-every-cycle scheduling.
    pub pc_target: u64,
    pub inst_target: InstTarget,
}

/// A selected register site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegLoc {
    pub tid: ThreadId,
    pub reg: RegId,
}

/// Adapter over a [`SimCpu`]'s register files.
pub struct RegTarget {
    cpu: Rc<RefCell<SimCpu>>,
    cfg: RegConfig,
}

impl RegTarget {
    pub fn new(cpu: Rc<RefCell<SimCpu>>, cfg: RegConfig) -> Self {
        Self { cpu, cfg }
    }

    /// Whether the wiring must set `poll_every_cycle` on the engine
    /// config: a PC gate only works if it is checked on every cycle.
    pub fn requires_polling(&self) -> bool {
        self.cfg.pc_target != 0
    }

    /// The classes in scope for one thread, restricted to non-empty files.
    fn scoped_classes(&self, int_regs: usize, float_regs: usize) -> Vec<RegClass> {
        let mut classes = Vec::with_capacity(2);
        match self.cfg.reg_target_class {
            RegTargetClass::Integer => {
                if int_regs > 0 {
                    classes.push(RegClass::Integer);
                }
            }
            RegTargetClass::FloatingPoint => {
                if float_regs > 0 {
                    classes.push(RegClass::FloatingPoint);
                }
            }
            RegTargetClass::Both => {
                if int_regs > 0 {
                    classes.push(RegClass::Integer);
                }
                if float_regs > 0 {
                    classes.push(RegClass::FloatingPoint);
                }
            }
        }
        classes
    }
}

impl TargetAdapter for RegTarget {
    type Location = RegLoc;
    type Key = (ThreadId, RegId);
    type Error = CpuError;
    const MASK_BITS: u32 = 32;
    const LOG_FILE: &'static str = "fault_injections.log";

    fn select(&mut self, rng: &mut ChaCha20Rng) -> Result<Selection<RegLoc>, CpuError> {
        let cpu = self.cpu.borrow();

        let live: Vec<ThreadId> = (0..cpu.num_threads())
            .filter(|&tid| {
                cpu.thread(tid)
                    .map(|t| t.status() == ThreadStatus::Active)
                    .unwrap_or(false)
            })
            .collect();
        if live.is_empty() {
            return Ok(Selection::NoValidTarget);
        }

        // Threads past the PC and instruction gates, with their in-scope
        // non-empty register classes.  Threads with no such class are
        // skipped.
        let candidates: Vec<(ThreadId, Vec<RegClass>)> = live
            .iter()
            .filter_map(|&tid| {
                let thread = cpu.thread(tid).ok()?;
                if self.cfg.pc_target != 0 && thread.pc() != self.cfg.pc_target {
                    return None;
                }
                if !self.cfg.inst_target.matches(thread.last_inst()) {
                    return None;
                }
                let classes = self.scoped_classes(
                    thread.num_regs(RegClass::Integer),
                    thread.num_regs(RegClass::FloatingPoint),
                );
                (!classes.is_empty()).then_some((tid, classes))
            })
            .collect();

        if candidates.is_empty() {
            // Live threads exist but none passed the gates this cycle.
            return Ok(if self.cfg.pc_target != 0 || self.cfg.inst_target != InstTarget::All {
                Selection::Gated
            } else {
                Selection::NoValidTarget
            });
        }

        let (tid, classes) = &candidates[rng.gen_range(0..candidates.len())];
        let class = classes[rng.gen_range(0..classes.len())];
        let index = rng.gen_range(0..cpu.thread(*tid)?.num_regs(class));
        Ok(Selection::Chosen(vec![RegLoc {
            tid: *tid,
            reg: RegId { class, index },
        }]))
    }

    fn read(&self, loc: &RegLoc) -> Result<u64, CpuError> {
        self.cpu.borrow().reg(loc.tid, loc.reg)
    }

    fn write(&mut self, loc: &RegLoc, value: u64) -> Result<(), CpuError> {
        self.cpu.borrow_mut().set_reg(loc.tid, loc.reg, value)
    }

    fn key(&self, loc: &RegLoc) -> (ThreadId, RegId) {
        (loc.tid, loc.reg)
    }

    fn describe(&self, loc: &RegLoc) -> String {
        format!(
            "CPU: {}, Thread: {}, Register: {}[{}]",
            self.cpu.borrow().name(),
            loc.tid,
            loc.reg.class,
            loc.reg.index
        )
    }

    fn locate(&self, key: &(ThreadId, RegId)) -> Option<RegLoc> {
        let (tid, reg) = *key;
        let cpu = self.cpu.borrow();
        let thread = cpu.thread(tid).ok()?;
        if thread.status() == ThreadStatus::Halted || reg.index >= thread.num_regs(reg.class) {
            return None;
        }
        Some(RegLoc { tid, reg })
    }
}
