use geodata::{BoundingBox, Observation, ObservationDocument};

use crate::interaction::{InteractionState, export_observations};

pub const EXPORT_FILE_NAME: &str = "exported_filtered_data.json";

/// Currently visible observations as a pretty-printed
/// `{"observations": [...]}` document, the same shape uploads accept.
pub fn export_json(
    observations: &[Observation],
    state: &InteractionState,
    viewport: Option<&BoundingBox>,
) -> Result<String, serde_json::Error> {
    let document = ObservationDocument {
        observations: export_observations(observations, state, viewport),
    };
    tracing::info!(
        count = document.observations.len(),
        clipped = viewport.is_some(),
        "exporting visible observations"
    );
    serde_json::to_string_pretty(&document)
}
