use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum grid size of a widget, in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinSize {
    pub w: u32,
    pub h: u32,
}

impl MinSize {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Chart,
    View2D,
    DateRangePicker,
    Slider,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 4] = [
        WidgetKind::View2D,
        WidgetKind::Chart,
        WidgetKind::DateRangePicker,
        WidgetKind::Slider,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WidgetKind::Chart => "Chart",
            WidgetKind::View2D => "View2D",
            WidgetKind::DateRangePicker => "DateRangePicker",
            WidgetKind::Slider => "Slider",
        }
    }

    /// Label shown in the "add module" menu.
    pub fn menu_label(&self) -> &'static str {
        match self {
            WidgetKind::View2D => "2D View",
            other => other.name(),
        }
    }

    pub const fn min_size(&self) -> MinSize {
        match self {
            WidgetKind::Chart => MinSize::new(2, 2),
            WidgetKind::View2D => MinSize::new(4, 2),
            WidgetKind::DateRangePicker => MinSize::new(2, 1),
            WidgetKind::Slider => MinSize::new(2, 1),
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("unsupported widget kind `{0}`")]
pub struct UnsupportedWidgetKind(pub String);

impl FromStr for WidgetKind {
    type Err = UnsupportedWidgetKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetKind::ALL
            .into_iter()
            .find(|k| k.name() == s || k.menu_label() == s)
            .ok_or_else(|| UnsupportedWidgetKind(s.to_string()))
    }
}

/// Grid coordinate of a layout item.
///
/// `Append` asks the grid engine to place the item after everything else
/// and compact it into the first free slot. It travels through JSON as
/// `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum GridSlot {
    Append,
    At(u32),
}

impl From<Option<u32>> for GridSlot {
    fn from(v: Option<u32>) -> Self {
        v.map_or(GridSlot::Append, GridSlot::At)
    }
}

impl From<GridSlot> for Option<u32> {
    fn from(slot: GridSlot) -> Self {
        match slot {
            GridSlot::Append => None,
            GridSlot::At(n) => Some(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    pub i: String,
    pub x: GridSlot,
    pub y: GridSlot,
    pub w: u32,
    pub h: u32,
    pub min_w: u32,
    pub min_h: u32,
}

/// What a layout item renders as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Widget {
    Known(WidgetKind),
    /// Placeholder for an unknown kind; siblings still render.
    Unsupported(String),
}

impl LayoutItem {
    /// Kind name: the part of `i` before the first `_`.
    pub fn kind_name(&self) -> &str {
        self.i.split('_').next().unwrap_or_default()
    }

    pub fn widget(&self) -> Widget {
        match self.kind_name().parse::<WidgetKind>() {
            Ok(kind) => Widget::Known(kind),
            Err(UnsupportedWidgetKind(name)) => {
                tracing::warn!(item = %self.i, "unsupported widget kind");
                Widget::Unsupported(name)
            }
        }
    }

    fn ordinal(&self) -> Option<u64> {
        self.i.rsplit_once('_').and_then(|(_, n)| n.parse().ok())
    }
}

// ------------------------------------------------------------------
// Layout model
// ------------------------------------------------------------------

/// Widget arrangement of one editing session.
///
/// Overlaps are resolved by the grid engine, which reports the compacted
/// items back through [`LayoutModel::apply_layout_change`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutModel {
    items: Vec<LayoutItem>,
    next_ordinal: u64,
}

impl LayoutModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from decoded items; new ordinals continue past the highest
    /// one already used.
    pub fn from_items(items: Vec<LayoutItem>) -> Self {
        let next_ordinal = items
            .iter()
            .filter_map(LayoutItem::ordinal)
            .max()
            .map_or(0, |n| n + 1);
        Self {
            items,
            next_ordinal,
        }
    }

    pub fn items(&self) -> &[LayoutItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<LayoutItem> {
        self.items
    }

    pub fn add_widget(&mut self, kind: WidgetKind) -> &LayoutItem {
        let min = kind.min_size();
        let item = LayoutItem {
            i: format!("{}_{}", kind.name(), self.next_ordinal),
            x: GridSlot::Append,
            y: GridSlot::Append,
            w: min.w,
            h: min.h,
            min_w: min.w,
            min_h: min.h,
        };
        self.next_ordinal += 1;
        tracing::debug!(id = %item.i, "widget added");
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    pub fn remove_widget(&mut self, id: &str) -> Option<LayoutItem> {
        let pos = self.items.iter().position(|item| item.i == id)?;
        Some(self.items.remove(pos))
    }

    /// Persist the grid engine's report verbatim.
    pub fn apply_layout_change(&mut self, items: Vec<LayoutItem>) {
        self.items = items;
    }
}

/// Viewport dimensions in CSS pixels, plus the root font size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub root_font_size: f64,
}

/// Aspect ratio of the builder's layout preview, matching the dashboard
/// area left below the header.
pub fn preview_aspect_ratio(viewport: Viewport) -> f64 {
    let height = viewport.height
        - (viewport.height * 0.05 - 2.0 * viewport.root_font_size);
    viewport.width / height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_widget_uses_minimum_size() {
        let mut model = LayoutModel::new();
        let view = model.add_widget(WidgetKind::View2D).clone();
        assert_eq!(view.i, "View2D_0");
        assert_eq!((view.w, view.h), (4, 2));
        assert_eq!((view.min_w, view.min_h), (4, 2));
        assert_eq!(view.x, GridSlot::Append);

        let slider = model.add_widget(WidgetKind::Slider).clone();
        assert_eq!(slider.i, "Slider_1");
        assert_eq!((slider.w, slider.h), (2, 1));

        let chart = model.add_widget(WidgetKind::Chart);
        assert_eq!((chart.w, chart.h), (2, 2));
    }

    #[test]
    fn test_ordinals_are_never_reused() {
        let mut model = LayoutModel::new();
        model.add_widget(WidgetKind::Chart);
        assert!(model.remove_widget("Chart_0").is_some());
        let again = model.add_widget(WidgetKind::Chart);
        assert_eq!(again.i, "Chart_1");
        assert!(model.remove_widget("Chart_0").is_none());
    }

    #[test]
    fn test_from_items_continues_ordinals() {
        let mut model = LayoutModel::new();
        model.add_widget(WidgetKind::Chart);
        model.add_widget(WidgetKind::Slider);
        let mut restored = LayoutModel::from_items(model.into_items());
        assert_eq!(restored.add_widget(WidgetKind::View2D).i, "View2D_2");
    }

    #[test]
    fn test_widget_resolution() {
        let mut model = LayoutModel::new();
        let item = model.add_widget(WidgetKind::DateRangePicker).clone();
        assert_eq!(item.widget(), Widget::Known(WidgetKind::DateRangePicker));

        let unknown = LayoutItem {
            i: "Heatmap_3".to_string(),
            ..item
        };
        assert_eq!(unknown.widget(), Widget::Unsupported("Heatmap".into()));
        assert!("chart".parse::<WidgetKind>().is_err());
        assert_eq!("2D View".parse::<WidgetKind>(), Ok(WidgetKind::View2D));
    }

    #[test]
    fn test_append_slot_serializes_as_null() {
        let mut model = LayoutModel::new();
        model.add_widget(WidgetKind::Slider);
        let json = serde_json::to_value(model.items()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "i": "Slider_0", "x": null, "y": null,
                "w": 2, "h": 1, "minW": 2, "minH": 1
            }])
        );

        let placed: LayoutItem = serde_json::from_value(serde_json::json!({
            "i": "Chart_4", "x": 3, "y": 0, "w": 2, "h": 2, "minW": 2, "minH": 2
        }))
        .unwrap();
        assert_eq!(placed.x, GridSlot::At(3));
    }

    #[test]
    fn test_preview_aspect_ratio() {
        let ratio = preview_aspect_ratio(Viewport {
            width: 1000.0,
            height: 800.0,
            root_font_size: 16.0,
        });
        // 800 - (40 - 32) = 792
        assert!((ratio - 1000.0 / 792.0).abs() < 1e-12);
    }
}
