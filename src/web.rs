#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use geodata::{
    Aggregation, BoundingBox, TimeRange, Timestamp, from_millis, to_millis,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};

use crate::actions::Action;
use crate::config::DashboardConfig;
use crate::effects::{Environment, FetchRequest};
use crate::layout::{LayoutItem, Viewport, Widget, WidgetKind};
use crate::state::State;

/// Route `tracing` events to the browser console.
fn init_logging() {
    let console = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(tracing_web::MakeWebConsoleWriter::new());
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new("info"))
        .with(console)
        .try_init();
    if installed.is_err() {
        tracing::debug!("console logging already installed");
    }
}

struct Inner {
    state: State,
    env: BrowserEnvironment,
}

fn dispatch(inner: &Rc<RefCell<Inner>>, action: Action) {
    let Ok(mut guard) = inner.try_borrow_mut() else {
        tracing::error!(?action, "dashboard busy, action dropped");
        return;
    };
    let Inner { state, env } = &mut *guard;
    state.handle(action, env);
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn millis(timestamps: &[Timestamp]) -> Vec<f64> {
    timestamps.iter().map(|t| to_millis(*t) as f64).collect()
}

fn js_err(value: JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

async fn fetch_text(url: &str) -> Result<String, String> {
    let window = web_sys::window().ok_or_else(|| "no window".to_string())?;
    let response: web_sys::Response =
        JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(js_err)?
            .dyn_into()
            .map_err(js_err)?;
    if !response.ok() {
        return Err(format!("HTTP {}", response.status()));
    }
    JsFuture::from(response.text().map_err(js_err)?)
        .await
        .map_err(js_err)?
        .as_string()
        .ok_or_else(|| "response body is not text".to_string())
}

/// Host side of the dashboard inside a browser window.
struct BrowserEnvironment {
    config: DashboardConfig,
    dashboard: Weak<RefCell<Inner>>,
    timer: Option<(i32, Closure<dyn FnMut()>)>,
}

impl Environment for BrowserEnvironment {
    fn base_url(&self) -> String {
        let origin = web_sys::window()
            .and_then(|w| w.location().origin().ok())
            .unwrap_or_default();
        self.config.base_url(&origin)
    }

    fn viewport(&self) -> Viewport {
        let window = web_sys::window();
        let dim = |v: Option<JsValue>| v.and_then(|v| v.as_f64()).unwrap_or(0.0);
        Viewport {
            width: dim(window.as_ref().and_then(|w| w.inner_width().ok())),
            height: dim(window.as_ref().and_then(|w| w.inner_height().ok())),
            root_font_size: 16.0,
        }
    }

    fn fetch(&mut self, request: FetchRequest) {
        let dashboard = self.dashboard.clone();
        spawn_local(async move {
            let response = fetch_text(&request.url).await;
            if let Some(inner) = dashboard.upgrade() {
                dispatch(&inner, Action::FetchCompleted { request, response });
            }
        });
    }

    fn start_timer(&mut self, interval: Duration) {
        self.stop_timer();
        let Some(window) = web_sys::window() else {
            return;
        };
        let dashboard = self.dashboard.clone();
        let tick = Closure::<dyn FnMut()>::new(move || {
            if let Some(inner) = dashboard.upgrade() {
                dispatch(&inner, Action::RefreshTick);
            }
        });
        let millis = i32::try_from(interval.as_millis()).unwrap_or(i32::MAX);
        match window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            millis,
        ) {
            Ok(id) => self.timer = Some((id, tick)),
            Err(e) => tracing::error!(error = %js_err(e), "failed to start refresh timer"),
        }
    }

    fn stop_timer(&mut self) {
        if let Some((id, _tick)) = self.timer.take()
            && let Some(window) = web_sys::window()
        {
            window.clear_interval_with_handle(id);
        }
    }

    fn write_clipboard(&mut self, text: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let promise = window.navigator().clipboard().write_text(text);
        spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                tracing::warn!(error = %js_err(e), "clipboard write failed");
            }
        });
    }

    fn save_file(&mut self, file_name: &str, contents: &str) {
        let href = format!(
            "data:application/json;base64,{}",
            STANDARD.encode(contents)
        );
        let anchor = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.create_element("a").ok())
            .and_then(|e| e.dyn_into::<web_sys::HtmlAnchorElement>().ok());
        match anchor {
            Some(anchor) => {
                anchor.set_href(&href);
                anchor.set_download(file_name);
                anchor.click();
            }
            None => tracing::error!(file_name, "cannot create download link"),
        }
    }
}

/// Dashboard handle for the page script. Widgets read their inputs from
/// the getters and report interaction through the setters.
#[wasm_bindgen]
pub struct Dashboard {
    inner: Rc<RefCell<Inner>>,
}

#[wasm_bindgen]
impl Dashboard {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Dashboard, JsValue> {
        console_error_panic_hook::set_once();
        init_logging();

        let config = if config_json.trim().is_empty() {
            DashboardConfig::default()
        } else {
            DashboardConfig::from_json(config_json).map_err(to_js_error)?
        };
        let inner = Rc::new_cyclic(|weak| {
            RefCell::new(Inner {
                state: State::from_config(&config),
                env: BrowserEnvironment {
                    config: config.clone(),
                    dashboard: weak.clone(),
                    timer: None,
                },
            })
        });
        Ok(Dashboard { inner })
    }

    /// Open the dashboard described by the current page URL.
    #[wasm_bindgen(js_name = openFromLocation)]
    pub fn open_from_location(&self) -> Result<(), JsValue> {
        let href = web_sys::window()
            .ok_or("no window")?
            .location()
            .href()?;
        self.open_permalink(&href);
        Ok(())
    }

    #[wasm_bindgen(js_name = openPermalink)]
    pub fn open_permalink(&self, link: &str) {
        dispatch(&self.inner, Action::OpenPermalink { link: link.to_string() });
    }

    /// Open a dashboard for the builder's current configuration.
    #[wasm_bindgen(js_name = openDashboard)]
    pub fn open_dashboard(&self) {
        dispatch(&self.inner, Action::OpenDashboard);
    }

    #[wasm_bindgen(js_name = uploadFile)]
    pub fn upload_file(&self, contents: String) {
        dispatch(&self.inner, Action::FileUploaded { contents });
    }

    pub fn teardown(&self) {
        dispatch(&self.inner, Action::Teardown);
    }

    // ------------------------------------------------------------------
    // Widget interaction
    // ------------------------------------------------------------------

    #[wasm_bindgen(js_name = selectDateRange)]
    pub fn select_date_range(&self, start_ms: f64, end_ms: f64) {
        if let (Some(start), Some(end)) =
            (from_millis(start_ms as i64), from_millis(end_ms as i64))
        {
            dispatch(&self.inner, Action::SelectDateRange {
                range: TimeRange::new(start, end),
            });
        }
    }

    #[wasm_bindgen(js_name = selectSliderRange)]
    pub fn select_slider_range(&self, values_ms: Vec<f64>) {
        let values = values_ms
            .into_iter()
            .filter_map(|ms| from_millis(ms as i64))
            .collect();
        dispatch(&self.inner, Action::SelectSliderRange { values });
    }

    /// Negative indexes are ignored.
    #[wasm_bindgen(js_name = selectChartBar)]
    pub fn select_chart_bar(&self, index: i32) {
        if let Ok(index) = usize::try_from(index) {
            dispatch(&self.inner, Action::SelectChartBar { index });
        }
    }

    #[wasm_bindgen(js_name = setBoundingBox)]
    pub fn set_bounding_box(&self, south: f64, west: f64, north: f64, east: f64) {
        let bbox = BoundingBox::from_corners((south, west), (north, east));
        dispatch(&self.inner, Action::SetBoundingBox { bbox: Some(bbox) });
    }

    /// Forget the map viewport; exports are no longer clipped.
    #[wasm_bindgen(js_name = clearBoundingBox)]
    pub fn clear_bounding_box(&self) {
        dispatch(&self.inner, Action::SetBoundingBox { bbox: None });
    }

    #[wasm_bindgen(js_name = setChartAggregation)]
    pub fn set_chart_aggregation(&self, name: &str) -> Result<(), JsValue> {
        let aggregation = name.parse::<Aggregation>().map_err(to_js_error)?;
        dispatch(&self.inner, Action::SetChartAggregation { aggregation });
        Ok(())
    }

    #[wasm_bindgen(js_name = setChartField)]
    pub fn set_chart_field(&self, field: String) {
        dispatch(&self.inner, Action::SetChartField { field });
    }

    #[wasm_bindgen(js_name = copyPermalink)]
    pub fn copy_permalink(&self) {
        dispatch(&self.inner, Action::CopyPermalink);
    }

    #[wasm_bindgen(js_name = exportVisible)]
    pub fn export_visible(&self) {
        dispatch(&self.inner, Action::ExportVisible);
    }

    // ------------------------------------------------------------------
    // Builder
    // ------------------------------------------------------------------

    #[wasm_bindgen(js_name = addWidget)]
    pub fn add_widget(&self, kind: &str) -> Result<(), JsValue> {
        let kind = kind.parse::<WidgetKind>().map_err(to_js_error)?;
        dispatch(&self.inner, Action::AddWidget { kind });
        Ok(())
    }

    #[wasm_bindgen(js_name = removeWidget)]
    pub fn remove_widget(&self, id: String) {
        dispatch(&self.inner, Action::RemoveWidget { id });
    }

    /// New arrangement from the grid engine, as a JSON array of items.
    #[wasm_bindgen(js_name = layoutChanged)]
    pub fn layout_changed(&self, items_json: &str) -> Result<(), JsValue> {
        let items: Vec<LayoutItem> =
            serde_json::from_str(items_json).map_err(to_js_error)?;
        dispatch(&self.inner, Action::LayoutChanged { items });
        Ok(())
    }

    #[wasm_bindgen(js_name = setSourceUrl)]
    pub fn set_source_url(&self, url: String) {
        dispatch(&self.inner, Action::SetSourceUrl { url });
    }

    #[wasm_bindgen(js_name = setRefreshInterval)]
    pub fn set_refresh_interval(&self, seconds: u32) {
        dispatch(&self.inner, Action::SetRefreshInterval {
            seconds: u64::from(seconds),
        });
    }

    #[wasm_bindgen(js_name = setTypeColor)]
    pub fn set_type_color(&self, kind: String, color: String) {
        dispatch(&self.inner, Action::SetTypeColor { kind, color });
    }

    #[wasm_bindgen(js_name = preloadTypes)]
    pub fn preload_types(&self) {
        dispatch(&self.inner, Action::PreloadTypes);
    }

    // ------------------------------------------------------------------
    // Widget inputs
    // ------------------------------------------------------------------

    #[wasm_bindgen(js_name = sliderTimestamps)]
    pub fn slider_timestamps(&self) -> Vec<f64> {
        millis(self.inner.borrow_mut().state.slider_timestamps())
    }

    /// Days the date picker enables, as epoch milliseconds of UTC midnight.
    #[wasm_bindgen(js_name = pickerDays)]
    pub fn picker_days(&self) -> Vec<f64> {
        millis(self.inner.borrow_mut().state.picker_days())
    }

    /// Observations for the chart, as a JSON array.
    #[wasm_bindgen(js_name = chartObservations)]
    pub fn chart_observations(&self) -> Result<String, JsValue> {
        let mut inner = self.inner.borrow_mut();
        serde_json::to_string(inner.state.chart_observations()).map_err(to_js_error)
    }

    /// Stacked bars as `[{label, timestamp, values}]` JSON, or `None` while
    /// the aggregation has no field to read.
    #[wasm_bindgen(js_name = chartBars)]
    pub fn chart_bars(&self) -> Result<Option<String>, JsValue> {
        let mut inner = self.inner.borrow_mut();
        let Some(bars) = inner.state.chart_bars() else {
            return Ok(None);
        };
        let bars: Vec<_> = bars
            .iter()
            .map(|bar| {
                serde_json::json!({
                    "label": bar.label(),
                    "timestamp": to_millis(bar.timestamp),
                    "values": bar.values,
                })
            })
            .collect();
        serde_json::to_string(&bars).map(Some).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = attributeFields)]
    pub fn attribute_fields(&self) -> Vec<String> {
        self.inner.borrow_mut().state.attribute_fields().to_vec()
    }

    /// Observations for the map, as a JSON array.
    #[wasm_bindgen(js_name = mapObservations)]
    pub fn map_observations(&self) -> Result<String, JsValue> {
        let mut inner = self.inner.borrow_mut();
        serde_json::to_string(inner.state.map_observations()).map_err(to_js_error)
    }

    /// Image layer source for the visible observations.
    #[wasm_bindgen(js_name = backgroundSrc)]
    pub fn background_src(&self) -> Option<String> {
        self.inner
            .borrow_mut()
            .state
            .background_src()
            .map(str::to_string)
    }

    /// Grid items with the widget each renders as, in JSON. `widget` is
    /// `null` for kinds this build cannot render.
    pub fn widgets(&self) -> Result<String, JsValue> {
        let inner = self.inner.borrow();
        let layout = inner.state.store.layout.items();
        let widgets: Vec<_> = inner
            .state
            .widgets()
            .into_iter()
            .zip(layout)
            .map(|((id, widget), item)| {
                let (kind, label) = match widget {
                    Widget::Known(kind) => {
                        (Some(kind.name()), Some(kind.menu_label()))
                    }
                    Widget::Unsupported(_) => (None, None),
                };
                serde_json::json!({
                    "id": id,
                    "widget": kind,
                    "label": label,
                    "item": item,
                })
            })
            .collect();
        serde_json::to_string(&widgets).map_err(to_js_error)
    }

    /// Width over height of the builder's layout preview.
    #[wasm_bindgen(js_name = previewAspectRatio)]
    pub fn preview_aspect_ratio(&self) -> f64 {
        let inner = self.inner.borrow();
        inner.state.preview_aspect_ratio(&inner.env)
    }

    /// Type colors as `[type, color]` pairs in JSON.
    #[wasm_bindgen(js_name = typeColors)]
    pub fn type_colors(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.borrow().state.store.type_colors)
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = takeErrorMessage)]
    pub fn take_error_message(&self) -> Option<String> {
        self.inner.borrow_mut().state.store.error_message.take()
    }
}
