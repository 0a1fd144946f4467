pub mod background;
pub mod bbox;
pub mod chart;
pub mod filter;
pub mod observation;
pub mod timestamp;

pub use background::{ImageSource, classify_image_source, resolve_image_src};
pub use bbox::{BoundingBox, filter_by_bounding_box};
pub use chart::{Aggregation, Bar, bar_data, custom_attribute_fields};
pub use filter::{
    ChartSelection, SliderRange, TimeRange, distinct_timestamps,
    filter_by_range, filter_by_time_range, included_days,
    narrow_to_selection, time_extent,
};
pub use observation::{
    BackgroundImage, Coordinates, DataFormatError, GeoObject, Geometry,
    GeometryKind, Observation, ObservationDocument, background_image,
    parse_payload,
};
pub use timestamp::{
    Timestamp, day_end, day_start, format_timestamp, from_millis,
    parse_timestamp, to_millis,
};
