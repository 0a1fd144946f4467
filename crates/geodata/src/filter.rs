use serde::{Deserialize, Serialize};

use crate::observation::Observation;
use crate::timestamp::{Timestamp, day_start};

/// Closed interval of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn instant(t: Timestamp) -> Self {
        Self { start: t, end: t }
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Slider selection: one instant, or a closed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliderRange {
    Single(Timestamp),
    Span(Timestamp, Timestamp),
}

impl SliderRange {
    /// From the one- or two-element value list a slider reports.
    pub fn from_values(values: &[Timestamp]) -> Option<Self> {
        match values {
            [] => None,
            [t] => Some(SliderRange::Single(*t)),
            [t1, t2, ..] => Some(SliderRange::Span(*t1, *t2)),
        }
    }

    /// Selection of the latest instant in `timestamps`.
    pub fn latest(timestamps: &[Timestamp]) -> Option<Self> {
        timestamps.last().map(|t| SliderRange::Single(*t))
    }

    pub fn values(&self) -> Vec<Timestamp> {
        match self {
            SliderRange::Single(t) => vec![*t],
            SliderRange::Span(t1, t2) => vec![*t1, *t2],
        }
    }
}

impl From<SliderRange> for TimeRange {
    fn from(slider: SliderRange) -> Self {
        match slider {
            SliderRange::Single(t) => TimeRange::instant(t),
            SliderRange::Span(t1, t2) => TimeRange::new(t1, t2),
        }
    }
}

/// Bar selected in the chart, indexing the date-time filtered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartSelection {
    #[default]
    None,
    Index(usize),
}

impl ChartSelection {
    /// Wire form: `-1` (or any negative) is no selection.
    pub fn from_index(index: i64) -> Self {
        usize::try_from(index)
            .map(ChartSelection::Index)
            .unwrap_or(ChartSelection::None)
    }

    pub fn as_index(&self) -> i64 {
        match self {
            ChartSelection::None => -1,
            ChartSelection::Index(k) => {
                i64::try_from(*k).unwrap_or(i64::MAX)
            }
        }
    }

    /// Selecting the current bar again clears the selection.
    pub fn toggle(self, index: usize) -> Self {
        match self {
            ChartSelection::Index(k) if k == index => ChartSelection::None,
            _ => ChartSelection::Index(index),
        }
    }
}

/// Observations with `start <= startDateTime <= end`, sorted ascending.
/// Ties keep their input order.
pub fn filter_by_range(
    observations: &[Observation],
    start: Timestamp,
    end: Timestamp,
) -> Vec<Observation> {
    let mut filtered: Vec<Observation> = observations
        .iter()
        .filter(|o| start <= o.start_date_time && o.start_date_time <= end)
        .cloned()
        .collect();
    filtered.sort_by_key(|o| o.start_date_time);
    filtered
}

pub fn filter_by_time_range(
    observations: &[Observation],
    range: &TimeRange,
) -> Vec<Observation> {
    filter_by_range(observations, range.start, range.end)
}

/// Sorted distinct instants, the value list of the time slider.
pub fn distinct_timestamps(observations: &[Observation]) -> Vec<Timestamp> {
    let mut timestamps: Vec<Timestamp> =
        observations.iter().map(|o| o.start_date_time).collect();
    timestamps.sort();
    timestamps.dedup();
    timestamps
}

/// Sorted distinct days (UTC midnight) with at least one observation.
pub fn included_days(observations: &[Observation]) -> Vec<Timestamp> {
    let mut days: Vec<Timestamp> = observations
        .iter()
        .map(|o| day_start(o.start_date_time))
        .collect();
    days.sort();
    days.dedup();
    days
}

/// Earliest and latest instant in the set.
pub fn time_extent(observations: &[Observation]) -> Option<TimeRange> {
    let min = observations.iter().map(|o| o.start_date_time).min()?;
    let max = observations.iter().map(|o| o.start_date_time).max()?;
    Some(TimeRange::new(min, max))
}

/// Map input: the selected observation only, or the whole sequence when
/// nothing (or nothing in bounds) is selected.
pub fn narrow_to_selection(
    filtered: Vec<Observation>,
    selection: ChartSelection,
) -> Vec<Observation> {
    match selection {
        ChartSelection::Index(k) if k < filtered.len() => {
            filtered.into_iter().nth(k).into_iter().collect()
        }
        _ => filtered,
    }
}
