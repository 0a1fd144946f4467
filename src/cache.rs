use geodata::{
    Bar, Observation, Timestamp, background_image, bar_data,
    custom_attribute_fields, included_days, resolve_image_src,
};

use crate::interaction::{
    chart_observations, map_observations, slider_timestamps,
};
use crate::store::Store;
use crate::versioned::Memoized;

type DataKey = (u64, u64);

fn data_key(s: &Store) -> DataKey {
    (s.observations.version(), s.interaction.version())
}

/// Widget inputs derived from the store, recomputed only when the
/// observations or the interaction state change.
pub struct Cache {
    pub slider_timestamps: Memoized<Store, DataKey, Vec<Timestamp>>,
    pub chart_observations: Memoized<Store, DataKey, Vec<Observation>>,
    pub map_observations: Memoized<Store, DataKey, Vec<Observation>>,
    pub chart_bars: Memoized<Store, (u64, u64, u64), Option<Vec<Bar>>>,
    pub picker_days: Memoized<Store, u64, Vec<Timestamp>>,
    pub attribute_fields: Memoized<Store, u64, Vec<String>>,
    pub background_src: Memoized<Store, DataKey, Option<String>>,
}

impl Cache {
    pub fn new() -> Self {
        let slider_timestamps = Memoized::new(data_key, |s: &Store| {
            slider_timestamps(s.observations.get(), s.interaction.get())
        });

        let chart_observations = Memoized::new(data_key, |s: &Store| {
            chart_observations(s.observations.get(), s.interaction.get())
        });

        let map_observations = Memoized::new(data_key, |s: &Store| {
            map_observations(s.observations.get(), s.interaction.get())
        });

        let chart_bars = Memoized::new(
            |s: &Store| {
                (
                    s.observations.version(),
                    s.interaction.version(),
                    s.chart.version(),
                )
            },
            |s: &Store| {
                let settings = s.chart.get();
                bar_data(
                    &crate::interaction::chart_observations(
                        s.observations.get(),
                        s.interaction.get(),
                    ),
                    settings.aggregation,
                    &settings.field,
                )
            },
        );

        let picker_days = Memoized::new(
            |s: &Store| s.observations.version(),
            |s: &Store| included_days(s.observations.get()),
        );

        let attribute_fields = Memoized::new(
            |s: &Store| s.observations.version(),
            |s: &Store| custom_attribute_fields(s.observations.get()),
        );

        let background_src = Memoized::new(data_key, |s: &Store| {
            let visible = crate::interaction::map_observations(
                s.observations.get(),
                s.interaction.get(),
            );
            background_image(&visible)
                .and_then(|image| resolve_image_src(&image.url))
        });

        Self {
            slider_timestamps,
            chart_observations,
            map_observations,
            chart_bars,
            picker_days,
            attribute_fields,
            background_src,
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
