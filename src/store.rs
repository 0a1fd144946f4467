use std::time::Duration;

use geodata::{BoundingBox, Observation};

use crate::colors::{self, ColorSource, InvalidColor, TypeColorMap};
use crate::config::DashboardConfig;
use crate::effects::{FetchPurpose, FetchRequest};
use crate::interaction::{ChartSettings, InteractionState};
use crate::layout::LayoutModel;
use crate::permalink::Permalink;
use crate::versioned::Versioned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session opened yet.
    Idle,
    /// Initial load in flight.
    Loading,
    /// Incremental refresh in flight; the previous data stays visible.
    Refreshing,
    Ready,
}

/// Everything the dashboard and its builder hold between actions.
pub struct Store {
    pub observations: Versioned<Vec<Observation>>,
    pub interaction: Versioned<InteractionState>,
    pub chart: Versioned<ChartSettings>,
    /// Map viewport, used only for exports. Kept across data resets and
    /// outside `interaction` so panning leaves the widget caches alone.
    pub bounding_box: Option<BoundingBox>,
    pub type_colors: TypeColorMap,
    pub layout: LayoutModel,
    pub source_url: String,
    pub interval_seconds: u64,
    pub phase: Phase,
    /// Data came from a file upload; auto-refresh stays off.
    pub static_mode: bool,
    pub refresh_timer_active: bool,
    pub export_file_name: String,
    pub error_message: Option<String>,
    /// Refresh ticks skipped while the current load is in flight.
    pub skipped_ticks: u32,
    generation: u64,
    colors: Box<dyn ColorSource>,
}

impl Store {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            observations: Versioned::new(Vec::new()),
            interaction: Versioned::new(InteractionState::default()),
            chart: Versioned::new(ChartSettings::default()),
            bounding_box: None,
            type_colors: TypeColorMap::new(),
            layout: LayoutModel::new(),
            source_url: String::new(),
            interval_seconds: config.default_interval_seconds,
            phase: Phase::Idle,
            static_mode: false,
            refresh_timer_active: false,
            export_file_name: config.export_file_name.clone(),
            error_message: None,
            skipped_ticks: 0,
            generation: 0,
            colors: config.color_source(),
        }
    }

    pub fn set_color_source(&mut self, source: Box<dyn ColorSource>) {
        self.colors = source;
    }

    /// Load generation; responses tagged with an older one are dropped.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate every request in flight.
    pub fn abandon_in_flight(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_current(&self, request: &FetchRequest) -> bool {
        request.generation == self.generation
    }

    // ------------------------------------------------------------------
    // Session configuration
    // ------------------------------------------------------------------

    pub fn permalink(&self) -> Permalink {
        Permalink {
            layout: self.layout.items().to_vec(),
            source_url: self.source_url.clone(),
            interval_seconds: self.interval_seconds,
            type_colors: self.type_colors.clone(),
        }
    }

    pub fn apply_permalink(&mut self, link: Permalink) {
        self.layout = LayoutModel::from_items(link.layout);
        self.source_url = link.source_url;
        self.interval_seconds = link.interval_seconds;
        self.type_colors = link.type_colors;
    }

    /// Forget the data of the previous session, keeping its configuration.
    pub fn reset_session(&mut self) {
        self.abandon_in_flight();
        self.observations.set(Vec::new());
        self.interaction.set(InteractionState::default());
        self.static_mode = false;
        self.phase = Phase::Idle;
    }

    /// Interval of the auto-refresh timer, if it should run.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.interval_seconds > 0 && !self.static_mode)
            .then(|| Duration::from_secs(self.interval_seconds))
    }

    pub fn set_type_color(
        &mut self,
        kind: impl Into<String>,
        color: &str,
    ) -> Result<(), InvalidColor> {
        self.type_colors.assign(kind, color)
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Tag a new fetch. Loads start a new generation; type previews ride
    /// on the current one.
    pub fn begin_fetch(&mut self, purpose: FetchPurpose) -> FetchRequest {
        match purpose {
            FetchPurpose::Initial => {
                self.abandon_in_flight();
                self.phase = Phase::Loading;
            }
            FetchPurpose::Incremental => {
                self.abandon_in_flight();
                self.phase = Phase::Refreshing;
            }
            FetchPurpose::TypePreview => {}
        }
        if purpose != FetchPurpose::TypePreview {
            self.skipped_ticks = 0;
        }
        FetchRequest {
            url: self.source_url.clone(),
            purpose,
            generation: self.generation,
        }
    }

    /// Install a freshly fetched set.
    pub fn finish_load(
        &mut self,
        purpose: FetchPurpose,
        observations: Vec<Observation>,
    ) {
        self.type_colors = colors::complete(
            &self.type_colors,
            &observations,
            self.colors.as_mut(),
        );
        if purpose == FetchPurpose::Initial {
            self.interaction.set(InteractionState::reset_for(&observations));
        }
        tracing::info!(
            count = observations.len(),
            purpose = ?purpose,
            "observations loaded"
        );
        self.observations.set(observations);
        self.phase = Phase::Ready;
    }

    /// A failed load leaves an empty set; interaction state is kept.
    pub fn fail_load(&mut self, purpose: FetchPurpose, reason: &str) {
        tracing::warn!(purpose = ?purpose, %reason, "failed to load observations");
        self.observations.set(Vec::new());
        self.phase = Phase::Ready;
    }

    /// Replace live data with an uploaded document. Colors start over.
    pub fn load_upload(&mut self, observations: Vec<Observation>) {
        self.abandon_in_flight();
        self.static_mode = true;
        self.type_colors = TypeColorMap::new();
        self.finish_load(FetchPurpose::Initial, observations);
    }

    /// New colors for exactly the types of a preview fetch. The fetched
    /// observations are not kept.
    pub fn preview_types(&mut self, observations: &[Observation]) {
        self.type_colors = colors::fresh(observations, self.colors.as_mut());
    }
}
