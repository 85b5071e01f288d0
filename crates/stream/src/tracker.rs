use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use crate::storage::Tracked;

/// Change in the visible set between two refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDiff<T> {
    /// In the new set only.
    pub entered: Vec<T>,
    /// In the previous set only.
    pub exited: Vec<T>,
    /// In both sets.
    pub still_present: Vec<T>,
}

impl<T> RegionDiff<T> {
    /// A diff in which nothing changed.
    pub fn empty() -> Self {
        Self {
            entered: Vec::new(),
            exited: Vec::new(),
            still_present: Vec::new(),
        }
    }

    /// True when nothing entered or exited.
    pub fn is_unchanged(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// Statistics from the last refresh.
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    pub entered: usize,
    pub exited: usize,
    pub still_present: usize,
    pub refreshes: u64,
    pub refresh_time: Duration,
}

/// Remembers the visible set of one storage and diffs each new set against it.
///
/// Items are compared by [`Tracked::key`] only. Before the first refresh there
/// is no region at all, so the first refresh reports everything as entered.
#[derive(Debug)]
pub struct RegionTracker<T: Tracked> {
    current: BTreeMap<T::Key, T>,
    stats: TrackerStats,
}

impl<T: Tracked> Default for RegionTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tracked> RegionTracker<T> {
    /// A tracker with no region yet.
    pub fn new() -> Self {
        Self {
            current: BTreeMap::new(),
            stats: TrackerStats::default(),
        }
    }

    /// Replace the visible set with `next` and report what changed.
    pub fn refresh(&mut self, next: Vec<T>) -> RegionDiff<T> {
        let _span = tracing::info_span!("region_refresh").entered();
        let start = Instant::now();

        let mut next: BTreeMap<T::Key, T> = next.into_iter().map(|t| (t.key(), t)).collect();
        let mut diff = RegionDiff::empty();
        for (key, item) in &next {
            if self.current.contains_key(key) {
                diff.still_present.push(item.clone());
            } else {
                diff.entered.push(item.clone());
            }
        }
        for (key, item) in std::mem::take(&mut self.current) {
            if !next.contains_key(&key) {
                diff.exited.push(item);
            }
        }
        std::mem::swap(&mut self.current, &mut next);

        self.stats = TrackerStats {
            entered: diff.entered.len(),
            exited: diff.exited.len(),
            still_present: diff.still_present.len(),
            refreshes: self.stats.refreshes + 1,
            refresh_time: start.elapsed(),
        };
        if !diff.is_unchanged() {
            tracing::debug!(
                entered = diff.entered.len(),
                exited = diff.exited.len(),
                "visible region changed"
            );
        }
        tracing::trace!(total = self.current.len(), "region refresh complete");
        diff
    }

    /// Forget the visible set, reporting all of it as exited.
    pub fn clear(&mut self) -> Vec<T> {
        std::mem::take(&mut self.current).into_values().collect()
    }

    /// Items in the visible set, ordered by key.
    pub fn current(&self) -> impl Iterator<Item = &T> {
        self.current.values()
    }

    /// Size of the visible set.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether the visible set is empty.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Counts and timing from the last refresh.
    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }
}

/// Decides on which ticks a tracker recomputes its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: u64,
}

impl Cadence {
    pub const EVERY_TICK: Cadence = Cadence { every: 1 };

    /// Recompute once every `every` ticks. Zero is treated as one.
    pub fn every(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }

    /// Ticks between refreshes.
    pub fn period(&self) -> u64 {
        self.every
    }

    /// Whether tick number `tick` (starting at 1) refreshes.
    pub fn is_due(&self, tick: u64) -> bool {
        tick.saturating_sub(1) % self.every == 0
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::EVERY_TICK
    }
}

/// Rolling window of tick durations.
#[derive(Debug, Clone)]
pub struct TickTimer {
    window: VecDeque<Duration>,
    capacity: usize,
}

impl TickTimer {
    /// Keep the last `capacity` durations; zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a duration, dropping the oldest when full.
    pub fn record(&mut self, dt: Duration) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(dt);
    }

    /// Durations currently in the window.
    pub fn count(&self) -> usize {
        self.window.len()
    }

    /// Mean over the window, zero when empty.
    pub fn average(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        self.window.iter().sum::<Duration>() / self.window.len() as u32
    }

    /// Longest duration in the window, zero when empty.
    pub fn max(&self) -> Duration {
        self.window.iter().copied().max().unwrap_or(Duration::ZERO)
    }

    /// Shortest duration in the window, zero when empty.
    pub fn min(&self) -> Duration {
        self.window.iter().copied().min().unwrap_or(Duration::ZERO)
    }
}
