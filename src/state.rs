use geodata::{Bar, Observation, Timestamp};

use crate::actions::{self, Action};
use crate::cache::Cache;
use crate::config::DashboardConfig;
use crate::effects::{self, Effect, Environment};
use crate::layout::{Widget, preview_aspect_ratio};
use crate::store::Store;

pub struct State {
    pub store: Store,
    pub cache: Cache,
    action_queue: Vec<Action>,
    effect_queue: Vec<Effect>,
}

impl State {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            cache: Cache::new(),
            action_queue: Vec::new(),
            effect_queue: Vec::new(),
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(Store::new(config))
    }

    pub fn dispatch(&mut self, action: Action) {
        self.action_queue.push(action);
    }

    pub fn flush_actions(&mut self) {
        let actions = std::mem::take(&mut self.action_queue);
        for action in actions {
            let mut effects = actions::update(&mut self.store, action);
            self.effect_queue.append(&mut effects);
        }
    }

    pub fn flush_effects(&mut self, env: &mut dyn Environment) {
        let effects = std::mem::take(&mut self.effect_queue);
        for effect in effects {
            effects::run(&mut self.store, effect, env);
        }
    }

    /// Dispatch and settle one action.
    pub fn handle(&mut self, action: Action, env: &mut dyn Environment) {
        self.dispatch(action);
        self.flush_actions();
        self.flush_effects(env);
    }

    // ------------------------------------------------------------------
    // Widget inputs
    // ------------------------------------------------------------------

    pub fn slider_timestamps(&mut self) -> &[Timestamp] {
        self.cache.slider_timestamps.get(&self.store)
    }

    pub fn chart_observations(&mut self) -> &[Observation] {
        self.cache.chart_observations.get(&self.store)
    }

    pub fn map_observations(&mut self) -> &[Observation] {
        self.cache.map_observations.get(&self.store)
    }

    /// `None` until a field is picked for a value aggregation.
    pub fn chart_bars(&mut self) -> Option<&[Bar]> {
        self.cache.chart_bars.get(&self.store).as_deref()
    }

    pub fn picker_days(&mut self) -> &[Timestamp] {
        self.cache.picker_days.get(&self.store)
    }

    pub fn attribute_fields(&mut self) -> &[String] {
        self.cache.attribute_fields.get(&self.store)
    }

    pub fn background_src(&mut self) -> Option<&str> {
        self.cache.background_src.get(&self.store).as_deref()
    }

    pub fn widgets(&self) -> Vec<(String, Widget)> {
        self.store
            .layout
            .items()
            .iter()
            .map(|item| (item.i.clone(), item.widget()))
            .collect()
    }

    pub fn preview_aspect_ratio(&self, env: &dyn Environment) -> f64 {
        preview_aspect_ratio(env.viewport())
    }
}
