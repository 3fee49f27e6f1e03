//! The discrete event queue.
//!
//! A deliberately small model of a simulator event queue: components
//! allocate [`EventId`]s once, then schedule and squash them as simulated
//! time advances.  The driver loop pops [`Firing`]s in `(tick, insertion)`
//! order and dispatches them to whichever component owns the event.
//!
//! # Ordering guarantees
//!
//! - Time never moves backwards: `pop` advances [`now`](EventQueue::now)
//!   to the firing's tick.
//! - Two events scheduled at the same tick fire in scheduling order.
//! - Scheduling an event in the past is a silent no-op; stale times are
//!   rejected rather than reordered.
//! - Scheduling an already-pending event is a no-op; an event is pending
//!   at most once.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::debug;

/// Simulated time in the simulator's finest unit.
pub type Tick = u64;

/// Handle to an event registered with an [`EventQueue`].
///
/// Cheap to copy; remains valid for the lifetime of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(usize);

/// One event coming due, as returned by [`EventQueue::pop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firing {
    /// The tick at which the event fires (now equal to `queue.now()`).
    pub when: Tick,
    /// The event that fired.
    pub event: EventId,
}

#[derive(Debug)]
struct EventSlot {
    name: String,
    /// Pending fire time, `None` when the event is idle.
    when: Option<Tick>,
    /// Bumped on every schedule/squash/fire so entries left behind in the
    /// heap by a squash can be recognised and skipped.
    generation: u64,
}

/// A monotonic discrete event queue.
#[derive(Debug, Default)]
pub struct EventQueue {
    now: Tick,
    slots: Vec<EventSlot>,
    /// Min-heap of `(when, seq, slot, generation)`. `seq` breaks same-tick
    /// ties in scheduling order.
    heap: BinaryHeap<Reverse<(Tick, u64, usize, u64)>>,
    seq: u64,
}

impl EventQueue {
    /// Create an empty queue at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new event. The name is used for diagnostics only.
    pub fn new_event(&mut self, name: impl Into<String>) -> EventId {
        self.slots.push(EventSlot {
            name: name.into(),
            when: None,
            generation: 0,
        });
        EventId(self.slots.len() - 1)
    }

    /// Current simulated time.
    #[inline]
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Schedule `event` to fire at `when`.
    ///
    /// No-ops if `when` is in the past or the event is already pending.
    pub fn schedule(&mut self, event: EventId, when: Tick) {
        if when < self.now {
            debug!(
                "event {} scheduled at stale tick {} (now {}), ignoring",
                self.slots[event.0].name, when, self.now
            );
            return;
        }
        let slot = &mut self.slots[event.0];
        if slot.when.is_some() {
            debug!("event {} already pending, ignoring reschedule", slot.name);
            return;
        }
        slot.when = Some(when);
        slot.generation += 1;
        self.seq += 1;
        self.heap
            .push(Reverse((when, self.seq, event.0, slot.generation)));
    }

    /// Cancel a pending event. No-op if the event is idle.
    pub fn squash(&mut self, event: EventId) {
        let slot = &mut self.slots[event.0];
        if slot.when.take().is_some() {
            slot.generation += 1;
        }
    }

    /// Whether `event` is currently pending.
    #[inline]
    pub fn scheduled(&self, event: EventId) -> bool {
        self.slots[event.0].when.is_some()
    }

    /// The tick a pending event will fire at.
    pub fn when(&self, event: EventId) -> Option<Tick> {
        self.slots[event.0].when
    }

    /// Diagnostic name of an event.
    pub fn name(&self, event: EventId) -> &str {
        &self.slots[event.0].name
    }

    /// Number of pending events.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.when.is_some()).count()
    }

    /// Tick of the next firing without consuming it.
    pub fn peek(&mut self) -> Option<Tick> {
        while let Some(&Reverse((when, _, idx, gen))) = self.heap.peek() {
            let slot = &self.slots[idx];
            if slot.generation != gen || slot.when != Some(when) {
                self.heap.pop();
                continue;
            }
            return Some(when);
        }
        None
    }

    /// Pop the next firing, advancing simulated time to its tick.
    ///
    /// Returns `None` when no events are pending.
    pub fn pop(&mut self) -> Option<Firing> {
        while let Some(Reverse((when, _, idx, gen))) = self.heap.pop() {
            let slot = &mut self.slots[idx];
            if slot.generation != gen || slot.when != Some(when) {
                continue; // squashed or rescheduled since insertion
            }
            slot.when = None;
            slot.generation += 1;
            debug_assert!(when >= self.now, "event queue time went backwards");
            self.now = when;
            return Some(Firing {
                when,
                event: EventId(idx),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_time_order() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        let b = q.new_event("b");
        q.schedule(a, 200);
        q.schedule(b, 100);

        assert_eq!(q.pop().unwrap().event, b);
        assert_eq!(q.now(), 100);
        assert_eq!(q.pop().unwrap().event, a);
        assert_eq!(q.now(), 200);
        assert!(q.pop().is_none());
    }

    #[test]
    fn same_tick_fires_in_schedule_order() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        let b = q.new_event("b");
        q.schedule(b, 50);
        q.schedule(a, 50);

        assert_eq!(q.pop().unwrap().event, b);
        assert_eq!(q.pop().unwrap().event, a);
    }

    #[test]
    fn stale_schedule_is_ignored() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        let b = q.new_event("b");
        q.schedule(a, 100);
        q.pop();

        q.schedule(b, 50); // now == 100, stale
        assert!(!q.scheduled(b));
        assert!(q.pop().is_none());
    }

    #[test]
    fn double_schedule_keeps_first_time() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        q.schedule(a, 100);
        q.schedule(a, 10);

        assert_eq!(q.when(a), Some(100));
        let firing = q.pop().unwrap();
        assert_eq!(firing.when, 100);
        assert!(q.pop().is_none());
    }

    #[test]
    fn squash_cancels_pending_event() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        q.schedule(a, 100);
        assert!(q.scheduled(a));

        q.squash(a);
        assert!(!q.scheduled(a));
        assert!(q.pop().is_none());
    }

    #[test]
    fn squash_then_reschedule_fires_once() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        q.schedule(a, 100);
        q.squash(a);
        q.schedule(a, 300);

        let firing = q.pop().unwrap();
        assert_eq!(firing.when, 300);
        assert!(q.pop().is_none());
    }

    #[test]
    fn event_can_be_rescheduled_after_firing() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        q.schedule(a, 10);

        let mut ticks = Vec::new();
        while let Some(f) = q.pop() {
            ticks.push(f.when);
            if f.when < 40 {
                q.schedule(a, f.when + 10);
            }
        }
        assert_eq!(ticks, vec![10, 20, 30, 40]);
    }

    #[test]
    fn peek_skips_squashed_entries() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        let b = q.new_event("b");
        q.schedule(a, 10);
        q.schedule(b, 20);
        q.squash(a);

        assert_eq!(q.peek(), Some(20));
        assert_eq!(q.pop().unwrap().event, b);
    }

    #[test]
    fn pending_counts_only_live_events() {
        let mut q = EventQueue::new();
        let a = q.new_event("a");
        let b = q.new_event("b");
        q.schedule(a, 10);
        q.schedule(b, 20);
        assert_eq!(q.pending(), 2);

        q.squash(a);
        assert_eq!(q.pending(), 1);
        q.pop();
        assert_eq!(q.pending(), 0);
    }
}
