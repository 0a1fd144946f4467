use geodata::{
    Aggregation, BoundingBox, ChartSelection, Observation, SliderRange,
    TimeRange, Timestamp, day_end, day_start, distinct_timestamps,
    filter_by_bounding_box, filter_by_range, filter_by_time_range,
    narrow_to_selection, time_extent,
};

/// Selections made through the dashboard widgets.
///
/// `None` ranges are unconstrained. The three time filters form a chain:
/// the date range bounds the slider's value list, the slider sets the
/// date-time range, and the chart selection indexes the date-time
/// filtered sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionState {
    pub date_range: Option<TimeRange>,
    pub slider_range: Option<SliderRange>,
    pub date_time_range: Option<TimeRange>,
    pub chart_selection: ChartSelection,
}

impl InteractionState {
    /// State after a fresh data set: the date range spans every day with
    /// data and the slider sits on the latest instant.
    pub fn reset_for(observations: &[Observation]) -> Self {
        let Some(extent) = time_extent(observations) else {
            return Self::default();
        };

        let slider_range =
            SliderRange::latest(&distinct_timestamps(observations));
        Self {
            date_range: Some(TimeRange::new(
                day_start(extent.start),
                day_end(extent.end),
            )),
            slider_range,
            date_time_range: slider_range.map(TimeRange::from),
            chart_selection: ChartSelection::None,
        }
    }

    /// A new date range moves the slider to the latest instant inside it.
    ///
    /// When the range holds no data the date-time range falls back to the
    /// date range itself, which selects nothing.
    pub fn select_date_range(
        &mut self,
        range: TimeRange,
        observations: &[Observation],
    ) {
        let in_range = filter_by_time_range(observations, &range);
        let slider_range = SliderRange::latest(&distinct_timestamps(&in_range));

        self.chart_selection = ChartSelection::None;
        self.date_range = Some(range);
        self.slider_range = slider_range;
        self.date_time_range =
            Some(slider_range.map_or(range, TimeRange::from));
    }

    pub fn select_slider_range(&mut self, slider_range: SliderRange) {
        self.chart_selection = ChartSelection::None;
        self.slider_range = Some(slider_range);
        self.date_time_range = Some(slider_range.into());
    }

    pub fn toggle_chart_bar(&mut self, index: usize) {
        self.chart_selection = self.chart_selection.toggle(index);
    }
}

/// Chart widget settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSettings {
    pub aggregation: Aggregation,
    /// Custom attribute aggregated; empty until the user picks one.
    pub field: String,
}

// ------------------------------------------------------------------
// Derived views
// ------------------------------------------------------------------

fn sorted(observations: &[Observation]) -> Vec<Observation> {
    let mut all = observations.to_vec();
    all.sort_by_key(|o| o.start_date_time);
    all
}

fn within(
    observations: &[Observation],
    range: Option<&TimeRange>,
) -> Vec<Observation> {
    match range {
        Some(range) => filter_by_range(observations, range.start, range.end),
        None => sorted(observations),
    }
}

/// Value list of the time slider.
pub fn slider_timestamps(
    observations: &[Observation],
    state: &InteractionState,
) -> Vec<Timestamp> {
    distinct_timestamps(&within(observations, state.date_range.as_ref()))
}

/// Observations charted: the date-time filtered sequence.
pub fn chart_observations(
    observations: &[Observation],
    state: &InteractionState,
) -> Vec<Observation> {
    within(observations, state.date_time_range.as_ref())
}

/// Observations drawn on the map.
pub fn map_observations(
    observations: &[Observation],
    state: &InteractionState,
) -> Vec<Observation> {
    narrow_to_selection(
        chart_observations(observations, state),
        state.chart_selection,
    )
}

/// Observations exported: the date-time filtered sequence, clipped to
/// the map viewport when one is known.
pub fn export_observations(
    observations: &[Observation],
    state: &InteractionState,
    viewport: Option<&BoundingBox>,
) -> Vec<Observation> {
    let filtered = chart_observations(observations, state);
    match viewport {
        Some(bbox) => filter_by_bounding_box(&filtered, bbox),
        None => filtered,
    }
}
