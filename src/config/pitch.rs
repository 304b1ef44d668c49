//! Pitch tables and the operator's feed selection.
//!
//! Four fixed tables cover metric/imperial threading and feeding. Imperial
//! threads are stored as threads per inch and imperial feeds in thou per
//! revolution; [`FeedSelector::pitch`] converts everything to millimetres.

use serde::Deserialize;

use super::units::Millimeters;

/// Metric thread pitches in mm per revolution.
pub const METRIC_THREAD_PITCHES: [f32; 20] = [
    0.35, 0.40, 0.45, 0.50, 0.60, 0.70, 0.80, 1.00, 1.25, 1.50, 1.75, 2.00, 2.50, 3.00, 3.50, 4.00,
    4.50, 5.00, 5.50, 6.00,
];

/// Metric feeds in mm per revolution.
pub const METRIC_FEEDS: [f32; 20] = [
    0.05, 0.08, 0.10, 0.12, 0.15, 0.18, 0.20, 0.23, 0.25, 0.28, 0.30, 0.35, 0.40, 0.45, 0.50, 0.55,
    0.60, 0.65, 0.70, 0.75,
];

/// Imperial threads in threads per inch.
pub const IMPERIAL_THREADS_PER_INCH: [f32; 20] = [
    80.0, 72.0, 64.0, 56.0, 48.0, 44.0, 40.0, 36.0, 32.0, 28.0, 24.0, 20.0, 18.0, 16.0, 14.0, 13.0,
    12.0, 11.0, 10.0, 9.0,
];

/// Imperial feeds in thou per revolution.
pub const IMPERIAL_FEEDS_THOU: [f32; 20] = [
    2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0, 24.0,
    26.0, 28.0, 30.0,
];

/// Default index into [`METRIC_THREAD_PITCHES`] (1.25 mm).
pub const DEFAULT_METRIC_THREAD_INDEX: usize = 8;
/// Default index into [`METRIC_FEEDS`] (0.25 mm/rev).
pub const DEFAULT_METRIC_FEED_INDEX: usize = 8;
/// Default index into [`IMPERIAL_THREADS_PER_INCH`] (32 TPI).
pub const DEFAULT_IMPERIAL_THREAD_INDEX: usize = 8;
/// Default index into [`IMPERIAL_FEEDS_THOU`] (0.010"/rev).
pub const DEFAULT_IMPERIAL_FEED_INDEX: usize = 8;

const _: () = assert!(DEFAULT_METRIC_THREAD_INDEX < METRIC_THREAD_PITCHES.len());
const _: () = assert!(DEFAULT_METRIC_FEED_INDEX < METRIC_FEEDS.len());
const _: () = assert!(DEFAULT_IMPERIAL_THREAD_INDEX < IMPERIAL_THREADS_PER_INCH.len());
const _: () = assert!(DEFAULT_IMPERIAL_FEED_INDEX < IMPERIAL_FEEDS_THOU.len());

/// Whether the carriage is feeding (turning) or cutting a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Plain feed per revolution
    #[default]
    Feed,
    /// Thread cutting
    Thread,
}

impl FeedMode {
    /// The other mode.
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            FeedMode::Feed => FeedMode::Thread,
            FeedMode::Thread => FeedMode::Feed,
        }
    }
}

/// Unit system of the pitch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum UnitMode {
    /// Millimetres
    #[default]
    Metric,
    /// Inches (TPI for threads, thou for feeds)
    Imperial,
}

impl UnitMode {
    /// The other unit system.
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            UnitMode::Metric => UnitMode::Imperial,
            UnitMode::Imperial => UnitMode::Metric,
        }
    }
}

/// Current position in the pitch tables.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedSelector {
    feed_mode: FeedMode,
    unit_mode: UnitMode,
    index: usize,
}

impl FeedSelector {
    /// Selector at the default entry of the given table.
    pub const fn new(feed_mode: FeedMode, unit_mode: UnitMode) -> Self {
        Self {
            feed_mode,
            unit_mode,
            index: default_index(feed_mode, unit_mode),
        }
    }

    /// Current feed mode.
    #[inline]
    pub const fn feed_mode(&self) -> FeedMode {
        self.feed_mode
    }

    /// Current unit mode.
    #[inline]
    pub const fn unit_mode(&self) -> UnitMode {
        self.unit_mode
    }

    /// Index into the active table.
    #[inline]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Switch feed mode; the index returns to the new table's default.
    pub fn set_feed_mode(&mut self, feed_mode: FeedMode) {
        self.feed_mode = feed_mode;
        self.index = default_index(self.feed_mode, self.unit_mode);
    }

    /// Switch unit mode; the index returns to the new table's default.
    pub fn set_unit_mode(&mut self, unit_mode: UnitMode) {
        self.unit_mode = unit_mode;
        self.index = default_index(self.feed_mode, self.unit_mode);
    }

    /// Select an entry. Out-of-range indexes select the table default.
    pub fn set_index(&mut self, index: usize) {
        self.index = if index < self.table().len() {
            index
        } else {
            default_index(self.feed_mode, self.unit_mode)
        };
    }

    /// Step to the next entry, saturating at the end of the table.
    pub fn next(&mut self) {
        if self.index + 1 < self.table().len() {
            self.index += 1;
        }
    }

    /// Step to the previous entry, saturating at the start of the table.
    pub fn prev(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    /// Raw table value in the table's own unit (mm, TPI or thou).
    pub fn raw_value(&self) -> f32 {
        self.table()[self.index]
    }

    /// Selected pitch in millimetres of carriage travel per spindle revolution.
    pub fn pitch(&self) -> Millimeters {
        let raw = self.raw_value();
        match (self.feed_mode, self.unit_mode) {
            (_, UnitMode::Metric) => Millimeters(raw),
            (FeedMode::Thread, UnitMode::Imperial) => Millimeters::from_threads_per_inch(raw),
            (FeedMode::Feed, UnitMode::Imperial) => Millimeters::from_thou(raw),
        }
    }

    fn table(&self) -> &'static [f32] {
        match (self.feed_mode, self.unit_mode) {
            (FeedMode::Thread, UnitMode::Metric) => &METRIC_THREAD_PITCHES,
            (FeedMode::Feed, UnitMode::Metric) => &METRIC_FEEDS,
            (FeedMode::Thread, UnitMode::Imperial) => &IMPERIAL_THREADS_PER_INCH,
            (FeedMode::Feed, UnitMode::Imperial) => &IMPERIAL_FEEDS_THOU,
        }
    }
}

impl Default for FeedSelector {
    fn default() -> Self {
        Self::new(FeedMode::default(), UnitMode::default())
    }
}

const fn default_index(feed_mode: FeedMode, unit_mode: UnitMode) -> usize {
    match (feed_mode, unit_mode) {
        (FeedMode::Thread, UnitMode::Metric) => DEFAULT_METRIC_THREAD_INDEX,
        (FeedMode::Feed, UnitMode::Metric) => DEFAULT_METRIC_FEED_INDEX,
        (FeedMode::Thread, UnitMode::Imperial) => DEFAULT_IMPERIAL_THREAD_INDEX,
        (FeedMode::Feed, UnitMode::Imperial) => DEFAULT_IMPERIAL_FEED_INDEX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metric_thread() {
        let selector = FeedSelector::new(FeedMode::Thread, UnitMode::Metric);
        assert_eq!(selector.index(), 8);
        assert_eq!(selector.pitch(), Millimeters(1.25));
    }

    #[test]
    fn test_next_saturates_at_end() {
        let mut selector = FeedSelector::new(FeedMode::Feed, UnitMode::Metric);
        for _ in 0..50 {
            selector.next();
        }
        assert_eq!(selector.index(), METRIC_FEEDS.len() - 1);
        assert_eq!(selector.pitch(), Millimeters(0.75));
    }

    #[test]
    fn test_prev_saturates_at_start() {
        let mut selector = FeedSelector::new(FeedMode::Thread, UnitMode::Imperial);
        for _ in 0..50 {
            selector.prev();
        }
        assert_eq!(selector.index(), 0);
        assert_eq!(selector.raw_value(), 80.0);
    }

    #[test]
    fn test_mode_change_resets_index() {
        let mut selector = FeedSelector::new(FeedMode::Thread, UnitMode::Metric);
        selector.next();
        selector.next();
        selector.set_unit_mode(UnitMode::Imperial);
        assert_eq!(selector.index(), DEFAULT_IMPERIAL_THREAD_INDEX);
        selector.next();
        selector.set_feed_mode(FeedMode::Feed);
        assert_eq!(selector.index(), DEFAULT_IMPERIAL_FEED_INDEX);
    }

    #[test]
    fn test_out_of_range_index_falls_back_to_default() {
        let mut selector = FeedSelector::new(FeedMode::Feed, UnitMode::Imperial);
        selector.set_index(3);
        assert_eq!(selector.index(), 3);
        selector.set_index(20);
        assert_eq!(selector.index(), DEFAULT_IMPERIAL_FEED_INDEX);
    }

    #[test]
    fn test_imperial_conversions() {
        let thread = FeedSelector::new(FeedMode::Thread, UnitMode::Imperial);
        assert!((thread.pitch().value() - 25.4 / 32.0).abs() < 1e-6);

        let feed = FeedSelector::new(FeedMode::Feed, UnitMode::Imperial);
        assert!((feed.pitch().value() - 0.254).abs() < 1e-6);
    }
}
