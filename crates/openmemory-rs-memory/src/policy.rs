//! Capture, sequencing and abstract policies.

use std::time::Duration;

/// Default number of distinct sequence values per timestamp.
pub const DEFAULT_SEQUENCE_CAP: u32 = 1000;
/// Maximum rows returned by a single message query.
pub const MESSAGE_QUERY_LIMIT: usize = 1000;

/// Policy for deciding which messages are worth storing.
#[derive(Debug, Clone)]
pub struct CapturePolicy {
    /// Normalized messages with this many characters or fewer are skipped.
    pub min_message_chars: usize,
}

impl Default for CapturePolicy {
    /// Default capture policy settings.
    fn default() -> Self {
        Self {
            min_message_chars: 2,
        }
    }
}

/// Policy for per-timestamp sequence allocation.
#[derive(Debug, Clone)]
pub struct SequencePolicy {
    /// Counters idle for longer than this are evicted.
    pub eviction_window: Duration,
    /// Sequence numbers wrap to zero at this value.
    pub cap: u32,
}

impl Default for SequencePolicy {
    /// Default sequence policy settings.
    fn default() -> Self {
        Self {
            eviction_window: Duration::from_secs(10),
            cap: DEFAULT_SEQUENCE_CAP,
        }
    }
}

/// Which slice of formatted message lines reaches the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineWindow {
    /// The chronologically earliest `n` lines.
    First(usize),
    /// The chronologically latest `n` lines.
    Last(usize),
}

impl LineWindow {
    /// Select the window from chronologically ordered lines.
    pub fn apply<'a, T>(&self, lines: &'a [T]) -> &'a [T] {
        match *self {
            LineWindow::First(n) => &lines[..n.min(lines.len())],
            LineWindow::Last(n) => &lines[lines.len().saturating_sub(n)..],
        }
    }
}

/// Policy for building and merging the running abstract.
#[derive(Debug, Clone)]
pub struct AbstractPolicy {
    /// Lines of new activity folded into an existing abstract.
    pub incremental_window: LineWindow,
    /// Lines of activity shown in a rebuilt abstract.
    pub rebuild_window: LineWindow,
    /// Days of history considered by a full rebuild.
    pub lookback_days: u32,
}

impl Default for AbstractPolicy {
    /// Default abstract policy settings.
    fn default() -> Self {
        Self {
            incremental_window: LineWindow::First(10),
            rebuild_window: LineWindow::Last(5),
            lookback_days: 14,
        }
    }
}

/// Policy for the recent-memories projection.
#[derive(Debug, Clone)]
pub struct RecentPolicy {
    /// Days looked back when the caller does not say.
    pub default_max_days: u32,
}

impl Default for RecentPolicy {
    /// Default recent-memories settings.
    fn default() -> Self {
        Self {
            default_max_days: 3,
        }
    }
}
