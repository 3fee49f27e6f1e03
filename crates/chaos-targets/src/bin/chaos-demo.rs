//! Demo driver: all three engines against toy hardware.
//!
//! Builds a two-thread CPU, a small cache and a 64 KiB memory, wires one
//! injector to each, then runs a synthetic workload for a configurable
//! number of cycles.  Injection logs land in the output directory; the
//! counter groups are dumped to stdout at the end.

use std::cell::RefCell;
use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;

use chaos_fault::config::{FaultType, InjectorConfig};
use chaos_fault::FaultInjector;
use chaos_sim::event::EventQueue;
use chaos_sim::output::OutputDirectory;
use chaos_sim::stats::StatGroup;
use chaos_targets::cache::SimCache;
use chaos_targets::cpu::{InstKind, SimCpu};
use chaos_targets::memory::SimMemory;
use chaos_targets::{
    CacheConfig, CacheTarget, MemConfig, MemTarget, RegConfig, RegTarget,
};

#[derive(Parser, Debug)]
#[command(about = "Run the CHAOS fault injectors against toy hardware")]
struct Args {
    /// Cycles to simulate.
    #[arg(long, default_value_t = 10_000)]
    cycles: u64,

    /// Per-cycle injection probability for each engine.
    #[arg(long, default_value_t = 0.01)]
    probability: f64,

    /// RNG seed shared by the three engines.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Simulator ticks per clock cycle.
    #[arg(long, default_value_t = 1000)]
    ratio: u64,

    /// Directory for the injection logs.
    #[arg(long, default_value = "chaos-out")]
    out_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut queue = EventQueue::new();
    let out = OutputDirectory::disk(&args.out_dir)?;

    let cpu = Rc::new(RefCell::new(SimCpu::new("cpu0", 2, 32, 32)));
    let cache = Rc::new(RefCell::new(SimCache::new("l1d", 64, 128)));
    let mem = Rc::new(RefCell::new(SimMemory::new(0, 64 * 1024)));

    let cfg = InjectorConfig {
        probability: args.probability,
        fault_type: FaultType::Random,
        last_clock: args.cycles,
        tick_to_clock_ratio: args.ratio,
        cycles_permanent_fault_check: 100,
        seed: Some(args.seed),
        ..Default::default()
    };

    let mut reg_engine = FaultInjector::new(
        "chaos_reg",
        &cfg,
        RegTarget::new(Rc::clone(&cpu), RegConfig::default()),
        &mut queue,
        &out,
    )?;
    let mut cache_engine = FaultInjector::new(
        "chaos_cache",
        &InjectorConfig {
            seed: Some(args.seed.wrapping_add(1)),
            ..cfg.clone()
        },
        CacheTarget::new(Rc::clone(&cache), CacheConfig { corruption_size: 2 }),
        &mut queue,
        &out,
    )?;
    let mut mem_engine = FaultInjector::new(
        "chaos_mem",
        &InjectorConfig {
            seed: Some(args.seed.wrapping_add(2)),
            ..cfg.clone()
        },
        MemTarget::new(Rc::clone(&mem), &MemConfig::default()),
        &mut queue,
        &out,
    )?;

    let inst_pattern = [
        InstKind::Load,
        InstKind::Integer,
        InstKind::Store,
        InstKind::Control,
    ];

    for cycle in 1..=args.cycles {
        // Synthetic workload: retire an instruction per thread, touch the
        // cache and memory so the targets stay populated.
        {
            let mut cpu = cpu.borrow_mut();
            for tid in 0..cpu.num_threads() {
                let kind = inst_pattern[(cycle as usize + tid) % inst_pattern.len()];
                let pc = 0x40_0000 + (cycle % 64) * 4;
                cpu.thread_mut(tid)?.retire(kind, pc);
            }
        }
        if cycle % 16 == 0 {
            let addr = (cycle * 64) % (64 * 1024);
            cache.borrow_mut().fill(addr, &[cycle as u8; 64]);
        }
        mem.borrow_mut()
            .write_byte((cycle * 7) % (64 * 1024), cycle as u8)?;

        let tick_limit = cycle * args.ratio;
        while queue.peek().is_some_and(|t| t <= tick_limit) {
            let firing = queue.pop().expect("peeked firing");
            let handled = reg_engine.handle(firing.event, &mut queue)
                || cache_engine.handle(firing.event, &mut queue)
                || mem_engine.handle(firing.event, &mut queue);
            debug_assert!(handled, "firing belongs to no engine");
        }
    }

    print!("{}", reg_engine.stats().dump());
    print!("{}", cache_engine.stats().dump());
    print!("{}", mem_engine.stats().dump());
    println!(
        "ledgers: reg={} cache={} mem={}",
        reg_engine.ledger().len(),
        cache_engine.ledger().len(),
        mem_engine.ledger().len()
    );
    println!("logs written to {}", args.out_dir.display());
    Ok(())
}
