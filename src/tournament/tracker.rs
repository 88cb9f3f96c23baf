use std::cell::Cell;
use std::rc::Rc;

use crate::{Contender, ProgressSink};

struct TrackerInner {
    total: Cell<u64>,
    sink: Option<Box<dyn ProgressSink>>,
}

/// Counts every comparison made during one selection run and optionally
/// forwards each one to a progress sink.
///
/// A tracker belongs to a single run: create it, `wrap` the items, run the
/// tournament, `unwrap` the result. Clones are cheap handles onto the same
/// counter; the tracker is never shared across runs.
#[derive(Clone)]
pub struct ComparisonTracker {
    inner: Rc<TrackerInner>,
}

impl ComparisonTracker {
    pub fn new(sink: Option<Box<dyn ProgressSink>>) -> Self {
        Self {
            inner: Rc::new(TrackerInner {
                total: Cell::new(0),
                sink,
            }),
        }
    }

    /// Comparisons observed so far.
    pub fn total(&self) -> u64 {
        self.inner.total.get()
    }

    /// Wrap items in counting handles that share this tracker.
    pub fn wrap<T>(&self, items: Vec<T>) -> Vec<Counted<T>> {
        items
            .into_iter()
            .map(|value| Counted {
                value,
                tracker: self.clone(),
            })
            .collect()
    }

    /// Strip the counting handles, preserving order.
    pub fn unwrap<T>(wrapped: Vec<Counted<T>>) -> Vec<T> {
        wrapped.into_iter().map(|c| c.value).collect()
    }

    fn record(&self) {
        self.inner.total.set(self.inner.total.get() + 1);
        if let Some(sink) = &self.inner.sink {
            sink.on_comparison();
        }
    }
}

/// An item wrapped with a shared [`ComparisonTracker`].
///
/// Delegates the comparison unchanged, so wrapping is invisible to the
/// selection algorithm and can never alter its outcome.
pub struct Counted<T> {
    value: T,
    tracker: ComparisonTracker,
}

impl<T> Counted<T> {
    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Contender> Contender for Counted<T> {
    type Error = T::Error;

    fn loses_to(&self, other: &Self) -> Result<bool, T::Error> {
        self.tracker.record();
        self.value.loses_to(&other.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CellSink(Rc<Cell<u64>>);

    impl ProgressSink for CellSink {
        fn on_comparison(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Num(u32);

    impl Contender for Num {
        type Error = String;

        fn loses_to(&self, other: &Self) -> Result<bool, String> {
            Ok(self.0 < other.0)
        }
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let tracker = ComparisonTracker::new(None);
        let items = vec![Num(3), Num(1), Num(2)];
        let wrapped = tracker.wrap(items.clone());
        assert_eq!(ComparisonTracker::unwrap(wrapped), items);
        assert_eq!(tracker.total(), 0);
    }

    #[test]
    fn test_counts_each_delegated_comparison() {
        let tracker = ComparisonTracker::new(None);
        let wrapped = tracker.wrap(vec![Num(1), Num(2)]);
        assert!(wrapped[0].loses_to(&wrapped[1]).unwrap());
        assert!(!wrapped[1].loses_to(&wrapped[0]).unwrap());
        assert_eq!(tracker.total(), 2);
    }

    #[test]
    fn test_sink_notified_once_per_comparison() {
        let pings = Rc::new(Cell::new(0));
        let tracker = ComparisonTracker::new(Some(Box::new(CellSink(Rc::clone(&pings)))));
        let wrapped = tracker.wrap(vec![Num(1), Num(2), Num(3)]);
        let top = crate::tournament::tournament(2, wrapped).unwrap();
        let top = ComparisonTracker::unwrap(top);
        assert_eq!(top, vec![Num(3), Num(2)]);
        assert_eq!(pings.get(), tracker.total());
        assert!(tracker.total() >= 2);
    }
}
