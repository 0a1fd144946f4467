use geodata::{
    Aggregation, BoundingBox, SliderRange, TimeRange, Timestamp,
    parse_payload,
};

use crate::config::MAX_INTERVAL_SECONDS;
use crate::effects::{Effect, FetchPurpose, FetchRequest};
use crate::export::export_json;
use crate::layout::{LayoutItem, WidgetKind};
use crate::permalink;
use crate::store::{Phase, Store};

/// Skipped refresh ticks after which an in-flight load counts as stalled
/// and the next tick replaces it.
pub const STALLED_AFTER_TICKS: u32 = 3;

/// Actions that can be dispatched to modify the dashboard state
#[derive(Debug, Clone)]
pub enum Action {
    // Session
    /// Open a dashboard from a permalink, a `state=` query or a bare token
    OpenPermalink { link: String },
    /// Open a dashboard for the builder's current configuration
    OpenDashboard,
    /// Auto-refresh timer fired
    RefreshTick,
    /// Host finished a fetch; `response` is the body or a failure reason
    FetchCompleted {
        request: FetchRequest,
        response: Result<String, String>,
    },
    /// User uploaded an observation document
    FileUploaded { contents: String },
    /// Dashboard is going away
    Teardown,

    // Widget interaction
    SelectDateRange { range: TimeRange },
    /// Slider moved; one value, or two for a span
    SelectSliderRange { values: Vec<Timestamp> },
    /// Chart bar clicked; clicking the selected bar clears it
    SelectChartBar { index: usize },
    /// Map viewport changed
    SetBoundingBox { bbox: Option<BoundingBox> },
    SetChartAggregation { aggregation: Aggregation },
    SetChartField { field: String },

    // Builder
    AddWidget { kind: WidgetKind },
    RemoveWidget { id: String },
    /// Grid engine reported a new arrangement
    LayoutChanged { items: Vec<LayoutItem> },
    SetSourceUrl { url: String },
    SetRefreshInterval { seconds: u64 },
    SetTypeColor { kind: String, color: String },
    /// Fetch the source once to give its types colors up front
    PreloadTypes,
    CopyPermalink,
    /// Save the visible observations as a JSON document
    ExportVisible,

    ClearErrorMessage,
}

/// Apply an action to the store, returning effects to run afterwards.
pub fn update(store: &mut Store, action: Action) -> Vec<Effect> {
    match action {
        // Session
        Action::OpenPermalink { link } => match permalink::decode_link(&link) {
            Ok(link) => {
                store.apply_permalink(link);
                start_session(store)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected dashboard link");
                store.error_message = Some(format!("Invalid dashboard link: {e}"));
                vec![]
            }
        },
        Action::OpenDashboard => start_session(store),
        Action::RefreshTick => match store.phase {
            _ if store.static_mode => {
                tracing::debug!("static data, ignoring refresh tick");
                vec![]
            }
            Phase::Ready => vec![Effect::Fetch(
                store.begin_fetch(FetchPurpose::Incremental),
            )],
            Phase::Loading | Phase::Refreshing
                if store.skipped_ticks + 1 < STALLED_AFTER_TICKS =>
            {
                store.skipped_ticks += 1;
                tracing::debug!(
                    skipped = store.skipped_ticks,
                    "load in flight, skipping refresh tick"
                );
                vec![]
            }
            Phase::Loading => {
                tracing::warn!("initial load stalled, retrying");
                vec![Effect::Fetch(store.begin_fetch(FetchPurpose::Initial))]
            }
            Phase::Refreshing => {
                tracing::warn!("refresh stalled, superseding it");
                vec![Effect::Fetch(
                    store.begin_fetch(FetchPurpose::Incremental),
                )]
            }
            Phase::Idle => vec![],
        },
        Action::FetchCompleted { request, response } => {
            if !store.is_current(&request) {
                tracing::debug!(
                    generation = request.generation,
                    current = store.generation(),
                    "dropping stale response"
                );
                return vec![];
            }
            let parsed = response.and_then(|body| {
                parse_payload(&body).map_err(|e| e.to_string())
            });
            match (request.purpose, parsed) {
                (FetchPurpose::TypePreview, Ok(observations)) => {
                    store.preview_types(&observations);
                }
                (FetchPurpose::TypePreview, Err(reason)) => {
                    tracing::warn!(%reason, "type preview failed");
                }
                (purpose, Ok(observations)) => {
                    store.finish_load(purpose, observations);
                }
                (purpose, Err(reason)) => store.fail_load(purpose, &reason),
            }
            vec![]
        }
        Action::FileUploaded { contents } => match parse_payload(&contents) {
            Ok(observations) => {
                store.load_upload(observations);
                stop_timer(store)
            }
            Err(e) => {
                tracing::error!(error = %e, "rejected uploaded file");
                store.error_message = Some(format!("Failed to load file: {e}"));
                vec![]
            }
        },
        Action::Teardown => {
            store.abandon_in_flight();
            stop_timer(store)
        }

        // Widget interaction
        Action::SelectDateRange { range } => {
            let observations = store.observations.get();
            store
                .interaction
                .get_mut()
                .select_date_range(range, observations);
            vec![]
        }
        Action::SelectSliderRange { values } => {
            match SliderRange::from_values(&values) {
                Some(slider) => {
                    store.interaction.get_mut().select_slider_range(slider)
                }
                None => tracing::debug!("empty slider value, ignored"),
            }
            vec![]
        }
        Action::SelectChartBar { index } => {
            store.interaction.get_mut().toggle_chart_bar(index);
            vec![]
        }
        Action::SetBoundingBox { bbox } => {
            store.bounding_box = bbox;
            vec![]
        }
        Action::SetChartAggregation { aggregation } => {
            store.chart.get_mut().aggregation = aggregation;
            vec![]
        }
        Action::SetChartField { field } => {
            store.chart.get_mut().field = field;
            vec![]
        }

        // Builder
        Action::AddWidget { kind } => {
            store.layout.add_widget(kind);
            vec![]
        }
        Action::RemoveWidget { id } => {
            if store.layout.remove_widget(&id).is_none() {
                tracing::debug!(%id, "no such widget");
            }
            vec![]
        }
        Action::LayoutChanged { items } => {
            store.layout.apply_layout_change(items);
            vec![]
        }
        Action::SetSourceUrl { url } => {
            store.source_url = url;
            vec![]
        }
        Action::SetRefreshInterval { seconds } => {
            if seconds > MAX_INTERVAL_SECONDS {
                store.error_message = Some(format!(
                    "Refresh interval must be at most {MAX_INTERVAL_SECONDS} seconds"
                ));
            } else {
                store.interval_seconds = seconds;
            }
            vec![]
        }
        Action::SetTypeColor { kind, color } => {
            if let Err(e) = store.set_type_color(kind, &color) {
                store.error_message = Some(e.to_string());
            }
            vec![]
        }
        Action::PreloadTypes => {
            vec![Effect::Fetch(store.begin_fetch(FetchPurpose::TypePreview))]
        }
        Action::CopyPermalink => vec![Effect::CopyPermalink {
            link: store.permalink(),
        }],
        Action::ExportVisible => {
            match export_json(
                store.observations.get(),
                store.interaction.get(),
                store.bounding_box.as_ref(),
            ) {
                Ok(contents) => vec![Effect::SaveFile {
                    file_name: store.export_file_name.clone(),
                    contents,
                }],
                Err(e) => {
                    store.error_message =
                        Some(format!("Failed to export observations: {e}"));
                    vec![]
                }
            }
        }

        Action::ClearErrorMessage => {
            store.error_message = None;
            vec![]
        }
    }
}

/// Drop the previous session's data, fetch, and arm the refresh timer.
fn start_session(store: &mut Store) -> Vec<Effect> {
    let mut effects = stop_timer(store);
    store.reset_session();
    effects.push(Effect::Fetch(store.begin_fetch(FetchPurpose::Initial)));
    if let Some(interval) = store.refresh_interval() {
        store.refresh_timer_active = true;
        effects.push(Effect::StartRefreshTimer { interval });
    }
    effects
}

fn stop_timer(store: &mut Store) -> Vec<Effect> {
    if store.refresh_timer_active {
        store.refresh_timer_active = false;
        vec![Effect::StopRefreshTimer]
    } else {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::TypeColorMap;
    use crate::config::DashboardConfig;
    use crate::interaction::tests::{at, observations};
    use crate::permalink::{Permalink, encode};
    use geodata::{ChartSelection, ObservationDocument};
    use std::time::Duration;

    fn store() -> Store {
        Store::new(&DashboardConfig {
            color_seed: Some(5),
            ..DashboardConfig::default()
        })
    }

    fn body(points: &[(u32, u32, &str, f64, f64)]) -> String {
        serde_json::to_string(&ObservationDocument {
            observations: observations(points),
        })
        .unwrap()
    }

    fn link(interval_seconds: u64) -> String {
        encode(&Permalink {
            layout: vec![],
            source_url: "https://data.example/obs".into(),
            interval_seconds,
            type_colors: [("tree", "#00aa00")].into_iter().collect(),
        })
        .unwrap()
    }

    /// Open a session and answer its initial fetch.
    fn opened(interval: u64, points: &[(u32, u32, &str, f64, f64)]) -> Store {
        let mut store = store();
        let effects =
            update(&mut store, Action::OpenPermalink { link: link(interval) });
        let Some(Effect::Fetch(request)) = effects.into_iter().next() else {
            panic!("expected an initial fetch");
        };
        update(
            &mut store,
            Action::FetchCompleted {
                request,
                response: Ok(body(points)),
            },
        );
        store
    }

    fn fetch_of(effects: Vec<Effect>) -> FetchRequest {
        effects
            .into_iter()
            .find_map(|e| match e {
                Effect::Fetch(r) => Some(r),
                _ => None,
            })
            .expect("no fetch effect")
    }

    #[test]
    fn test_open_permalink_fetches_and_arms_timer() {
        let mut store = store();
        let effects =
            update(&mut store, Action::OpenPermalink { link: link(10) });

        assert_eq!(store.phase, Phase::Loading);
        assert_eq!(store.source_url, "https://data.example/obs");
        assert!(matches!(
            &effects[..],
            [
                Effect::Fetch(FetchRequest { purpose: FetchPurpose::Initial, .. }),
                Effect::StartRefreshTimer { interval },
            ] if *interval == Duration::from_secs(10)
        ));
        assert!(store.refresh_timer_active);
    }

    #[test]
    fn test_zero_interval_has_no_timer() {
        let mut store = store();
        let effects = update(&mut store, Action::OpenPermalink { link: link(0) });
        assert_eq!(effects.len(), 1);
        assert!(!store.refresh_timer_active);
    }

    #[test]
    fn test_initial_load_resets_interaction() {
        let store = opened(0, &[(1, 10, "car", 0.0, 0.0), (3, 12, "tree", 0.0, 0.0)]);

        assert_eq!(store.phase, Phase::Ready);
        let state = store.interaction.get();
        assert_eq!(state.date_range.unwrap().start, at(1, 0));
        assert_eq!(state.slider_range, Some(SliderRange::Single(at(3, 12))));
        // permalink color kept, new type completed
        assert_eq!(store.type_colors.get("tree"), Some("#00aa00"));
        assert!(store.type_colors.contains("car"));
    }

    #[test]
    fn test_incremental_refresh_keeps_interaction_and_stale_colors() {
        let mut store =
            opened(5, &[(1, 10, "car", 0.0, 0.0), (2, 10, "boat", 0.0, 0.0)]);
        update(&mut store, Action::SelectChartBar { index: 0 });
        let interaction = store.interaction.get().clone();
        let boat = store.type_colors.get("boat").map(str::to_string);

        let request = fetch_of(update(&mut store, Action::RefreshTick));
        assert_eq!(request.purpose, FetchPurpose::Incremental);
        assert_eq!(store.phase, Phase::Refreshing);

        update(
            &mut store,
            Action::FetchCompleted {
                request,
                response: Ok(body(&[(1, 10, "car", 0.0, 0.0), (4, 1, "bus", 0.0, 0.0)])),
            },
        );

        assert_eq!(store.interaction.get(), &interaction);
        assert_eq!(store.observations.get().len(), 2);
        assert_eq!(store.type_colors.get("boat").map(str::to_string), boat);
        assert!(store.type_colors.contains("bus"));
    }

    #[test]
    fn test_tick_while_loading_is_skipped() {
        let mut store = store();
        update(&mut store, Action::OpenPermalink { link: link(5) });
        assert!(update(&mut store, Action::RefreshTick).is_empty());
    }

    #[test]
    fn test_stalled_refresh_is_superseded() {
        let mut store =
            opened(5, &[(1, 1, "car", 0.0, 0.0), (2, 1, "car", 0.0, 0.0)]);
        let stalled = fetch_of(update(&mut store, Action::RefreshTick));

        for _ in 1..STALLED_AFTER_TICKS {
            assert!(update(&mut store, Action::RefreshTick).is_empty());
        }
        let retry = fetch_of(update(&mut store, Action::RefreshTick));
        assert_eq!(retry.purpose, FetchPurpose::Incremental);
        assert_eq!(store.phase, Phase::Refreshing);
        assert_eq!(store.skipped_ticks, 0);

        // the stalled response arriving late is ignored
        update(
            &mut store,
            Action::FetchCompleted {
                request: stalled,
                response: Ok(body(&[])),
            },
        );
        assert_eq!(store.observations.get().len(), 2);

        update(
            &mut store,
            Action::FetchCompleted {
                request: retry,
                response: Ok(body(&[(3, 1, "car", 0.0, 0.0)])),
            },
        );
        assert_eq!(store.phase, Phase::Ready);
        assert_eq!(store.observations.get().len(), 1);
    }

    #[test]
    fn test_stalled_initial_load_is_retried() {
        let mut store = store();
        update(&mut store, Action::OpenPermalink { link: link(5) });
        for _ in 1..STALLED_AFTER_TICKS {
            update(&mut store, Action::RefreshTick);
        }
        let retry = fetch_of(update(&mut store, Action::RefreshTick));
        assert_eq!(retry.purpose, FetchPurpose::Initial);
        assert_eq!(store.phase, Phase::Loading);
    }

    #[test]
    fn test_viewport_changes_leave_interaction_untouched() {
        let mut store =
            opened(0, &[(1, 1, "car", 1.0, 1.0), (1, 1, "tree", 9.0, 9.0)]);
        let version = store.interaction.version();
        update(
            &mut store,
            Action::SetBoundingBox {
                bbox: Some(BoundingBox::from_corners((0.0, 0.0), (2.0, 2.0))),
            },
        );
        assert_eq!(store.interaction.version(), version);

        let Some(Effect::SaveFile { contents, .. }) =
            update(&mut store, Action::ExportVisible).into_iter().next()
        else {
            panic!("expected a saved export");
        };
        let exported = geodata::parse_payload(&contents).unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].geo_objects[0].kind, "car");

        update(&mut store, Action::SetBoundingBox { bbox: None });
        assert!(store.bounding_box.is_none());
    }

    #[test]
    fn test_failed_fetch_degrades_to_empty() {
        let mut store = store();
        let request = fetch_of(update(
            &mut store,
            Action::OpenPermalink { link: link(0) },
        ));
        update(
            &mut store,
            Action::FetchCompleted {
                request,
                response: Err("connection refused".into()),
            },
        );
        assert_eq!(store.phase, Phase::Ready);
        assert!(store.observations.get().is_empty());
        assert!(store.error_message.is_none());
    }

    #[test]
    fn test_malformed_body_degrades_to_empty() {
        let mut store = opened(0, &[(1, 1, "car", 0.0, 0.0)]);
        let request = fetch_of(update(&mut store, Action::RefreshTick));
        update(
            &mut store,
            Action::FetchCompleted {
                request,
                response: Ok(r#"{"data": []}"#.into()),
            },
        );
        assert!(store.observations.get().is_empty());
    }

    #[test]
    fn test_upload_switches_to_static_and_drops_in_flight() {
        let mut store = opened(5, &[(1, 1, "car", 0.0, 0.0)]);
        let pending = fetch_of(update(&mut store, Action::RefreshTick));

        let effects = update(
            &mut store,
            Action::FileUploaded {
                contents: body(&[(7, 7, "tree", 0.0, 0.0)]),
            },
        );
        assert_eq!(effects, vec![Effect::StopRefreshTimer]);
        assert!(store.static_mode);
        assert!(!store.refresh_timer_active);

        // the refresh started before the upload must not overwrite it
        update(
            &mut store,
            Action::FetchCompleted {
                request: pending,
                response: Ok(body(&[(1, 1, "car", 0.0, 0.0)])),
            },
        );
        let obs = store.observations.get();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].geo_objects[0].kind, "tree");

        assert!(update(&mut store, Action::RefreshTick).is_empty());
    }

    #[test]
    fn test_upload_without_observations_is_rejected() {
        let mut store = opened(0, &[(1, 1, "car", 0.0, 0.0)]);
        update(
            &mut store,
            Action::FileUploaded {
                contents: r#"{"items": []}"#.into(),
            },
        );
        assert!(store.error_message.is_some());
        assert!(!store.static_mode);
        assert_eq!(store.observations.get().len(), 1);
    }

    #[test]
    fn test_malformed_permalink_leaves_state_unchanged() {
        let mut store = opened(5, &[(1, 1, "car", 0.0, 0.0)]);
        let url = store.source_url.clone();
        let colors = store.type_colors.clone();
        let version = store.observations.version();

        let effects = update(
            &mut store,
            Action::OpenPermalink {
                link: "https://host/dashboard?state=%%%".into(),
            },
        );

        assert!(effects.is_empty());
        assert!(store.error_message.is_some());
        assert_eq!(store.source_url, url);
        assert_eq!(store.type_colors, colors);
        assert_eq!(store.observations.version(), version);
        assert!(store.refresh_timer_active);
    }

    #[test]
    fn test_reopening_restarts_timer() {
        let mut store = opened(5, &[(1, 1, "car", 0.0, 0.0)]);
        let effects = update(&mut store, Action::OpenDashboard);
        assert!(matches!(
            &effects[..],
            [
                Effect::StopRefreshTimer,
                Effect::Fetch(_),
                Effect::StartRefreshTimer { .. }
            ]
        ));
        assert!(store.observations.get().is_empty());
    }

    #[test]
    fn test_chart_bar_toggles() {
        let mut store = opened(0, &[(1, 1, "car", 0.0, 0.0)]);
        update(&mut store, Action::SelectChartBar { index: 2 });
        assert_eq!(store.interaction.get().chart_selection, ChartSelection::Index(2));
        update(&mut store, Action::SelectChartBar { index: 2 });
        assert_eq!(store.interaction.get().chart_selection, ChartSelection::None);
    }

    #[test]
    fn test_slider_span_clears_chart_selection() {
        let mut store =
            opened(0, &[(1, 1, "car", 0.0, 0.0), (1, 5, "car", 0.0, 0.0)]);
        update(&mut store, Action::SelectChartBar { index: 0 });
        update(
            &mut store,
            Action::SelectSliderRange {
                values: vec![at(1, 0), at(1, 6)],
            },
        );
        let state = store.interaction.get();
        assert_eq!(state.chart_selection, ChartSelection::None);
        assert_eq!(state.date_time_range, Some(TimeRange::new(at(1, 0), at(1, 6))));

        let version = store.interaction.version();
        update(&mut store, Action::SelectSliderRange { values: vec![] });
        assert_eq!(store.interaction.version(), version);
    }

    #[test]
    fn test_type_preview_replaces_colors() {
        let mut store = store();
        store.source_url = "https://data.example/obs".into();
        store.set_type_color("boat", "#123456").unwrap();
        let request = fetch_of(update(&mut store, Action::PreloadTypes));
        assert_eq!(request.purpose, FetchPurpose::TypePreview);
        assert_eq!(store.phase, Phase::Idle);

        update(
            &mut store,
            Action::FetchCompleted {
                request,
                response: Ok(body(&[(1, 1, "car", 0.0, 0.0)])),
            },
        );
        assert!(store.type_colors.contains("car"));
        assert!(!store.type_colors.contains("boat"));
        assert!(store.observations.get().is_empty());
        assert_eq!(store.phase, Phase::Idle);
    }

    #[test]
    fn test_builder_actions() {
        let mut store = store();
        update(&mut store, Action::AddWidget { kind: WidgetKind::Chart });
        update(&mut store, Action::AddWidget { kind: WidgetKind::Slider });
        update(&mut store, Action::RemoveWidget { id: "Chart_0".into() });
        assert_eq!(store.layout.items().len(), 1);

        update(&mut store, Action::SetRefreshInterval { seconds: 60 });
        assert_eq!(store.interval_seconds, 60);
        update(&mut store, Action::SetRefreshInterval { seconds: u64::MAX });
        assert_eq!(store.interval_seconds, 60);
        assert!(store.error_message.is_some());

        update(&mut store, Action::ClearErrorMessage);
        update(
            &mut store,
            Action::SetTypeColor {
                kind: "car".into(),
                color: "blue".into(),
            },
        );
        assert!(store.error_message.is_some());
        assert_eq!(store.type_colors, TypeColorMap::new());

        let effects = update(&mut store, Action::CopyPermalink);
        assert!(matches!(
            &effects[..],
            [Effect::CopyPermalink { link }] if link.layout.len() == 1
                && link.interval_seconds == 60
        ));
    }

    #[test]
    fn test_export_visible() {
        let mut store = opened(
            0,
            &[(1, 1, "car", 1.0, 1.0), (1, 1, "tree", 9.0, 9.0)],
        );
        update(
            &mut store,
            Action::SetBoundingBox {
                bbox: Some(BoundingBox::from_corners((0.0, 0.0), (2.0, 2.0))),
            },
        );
        let effects = update(&mut store, Action::ExportVisible);
        let [Effect::SaveFile { file_name, contents }] = &effects[..] else {
            panic!("expected a file save");
        };
        assert_eq!(file_name, "exported_filtered_data.json");
        let exported = parse_payload(contents).unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].geo_objects[0].kind, "car");
    }
}
