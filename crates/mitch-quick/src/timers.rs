use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use crate::notify::ToastId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerKind {
    /// Recurring KPI poll; reschedules itself.
    RefreshTick,
    ToastHide(ToastId),
    SubmitReset { form: String },
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    due: Duration,
    seq: u64,
    kind: TimerKind,
}

/// Timers on a virtual clock measured from page load. Equal due times fire
/// in scheduling order. Nothing is ever cancelled.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    seq: u64,
    heap: BinaryHeap<Reverse<Entry>>,
}

impl TimerQueue {
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, kind: TimerKind) {
        self.seq += 1;
        self.heap.push(Reverse(Entry {
            due: self.now + delay,
            seq: self.seq,
            kind,
        }));
    }

    /// Pops the next timer due at or before `until` and moves the clock to
    /// its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerKind> {
        let due = self.heap.peek().map(|Reverse(e)| e.due)?;
        if due > until {
            return None;
        }
        let Reverse(entry) = self.heap.pop()?;
        self.now = self.now.max(entry.due);
        Some(entry.kind)
    }

    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    pub fn is_pending(&self, kind: &TimerKind) -> bool {
        self.heap.iter().any(|Reverse(e)| &e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_then_schedule_order() {
        let mut q = TimerQueue::default();
        q.schedule(Duration::from_millis(300), TimerKind::Reload);
        q.schedule(Duration::from_millis(100), TimerKind::ToastHide(2));
        q.schedule(Duration::from_millis(100), TimerKind::ToastHide(1));

        let until = Duration::from_millis(200);
        assert_eq!(q.pop_due(until), Some(TimerKind::ToastHide(2)));
        assert_eq!(q.pop_due(until), Some(TimerKind::ToastHide(1)));
        assert_eq!(q.pop_due(until), None);
        assert_eq!(q.now(), Duration::from_millis(100));
        assert!(q.is_pending(&TimerKind::Reload));

        assert_eq!(q.pop_due(Duration::from_secs(1)), Some(TimerKind::Reload));
        assert_eq!(q.pending(), 0);
    }
}
