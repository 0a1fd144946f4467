pub mod actions;
pub mod cache;
pub mod colors;
pub mod config;
pub mod effects;
pub mod export;
pub mod interaction;
pub mod layout;
pub mod permalink;
pub mod state;
pub mod store;
pub mod versioned;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use actions::Action;
pub use colors::{ColorSource, PaletteColors, RandomColors, TypeColorMap};
pub use config::{ColorScheme, ConfigError, DashboardConfig};
pub use effects::{Effect, Environment, FetchPurpose, FetchRequest};
pub use interaction::{ChartSettings, InteractionState};
pub use layout::{LayoutItem, LayoutModel, Widget, WidgetKind};
pub use permalink::{Permalink, PermalinkFormatError};
pub use state::State;
pub use store::{Phase, Store};
