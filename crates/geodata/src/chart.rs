use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::observation::Observation;
use crate::timestamp::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    #[default]
    Sum,
    Average,
    Min,
    Max,
    Count,
}

impl Aggregation {
    pub const ALL: [Aggregation; 5] = [
        Aggregation::Sum,
        Aggregation::Average,
        Aggregation::Min,
        Aggregation::Max,
        Aggregation::Count,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Sum => "Sum",
            Aggregation::Average => "Average",
            Aggregation::Min => "Min",
            Aggregation::Max => "Max",
            Aggregation::Count => "Count",
        }
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        match self {
            Aggregation::Sum => Some(values.iter().sum()),
            Aggregation::Average if !values.is_empty() => {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
            Aggregation::Min => values.iter().copied().reduce(f64::min),
            Aggregation::Max => values.iter().copied().reduce(f64::max),
            Aggregation::Count => Some(values.len() as f64),
            Aggregation::Average => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("unknown aggregation `{0}`")]
pub struct UnknownAggregation(pub String);

impl FromStr for Aggregation {
    type Err = UnknownAggregation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregation::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| UnknownAggregation(s.to_string()))
    }
}

/// One stacked bar: per geo-object type value for a single observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: Timestamp,
    pub values: BTreeMap<String, f64>,
}

impl Bar {
    /// Two-line axis label: date, then time.
    pub fn label(&self) -> String {
        self.timestamp.format("%Y-%m-%d\n%H:%M:%S").to_string()
    }
}

/// Every custom attribute key used by any geo-object, sorted.
pub fn custom_attribute_fields(observations: &[Observation]) -> Vec<String> {
    let fields: BTreeSet<&String> = observations
        .iter()
        .flat_map(|o| &o.geo_objects)
        .filter_map(|g| g.custom_attributes.as_ref())
        .flat_map(|attrs| attrs.keys())
        .collect();
    fields.into_iter().cloned().collect()
}

/// Bars for the chart, one per observation in input order.
///
/// Returns `None` when no field is chosen for a value aggregation.
pub fn bar_data(
    observations: &[Observation],
    aggregation: Aggregation,
    field: &str,
) -> Option<Vec<Bar>> {
    if field.is_empty() && aggregation != Aggregation::Count {
        return None;
    }

    let bars = observations
        .iter()
        .map(|observation| {
            let mut per_type: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
            for geo in &observation.geo_objects {
                let values = per_type.entry(geo.kind.as_str()).or_default();
                if aggregation == Aggregation::Count {
                    values.push(1.0);
                } else if let Some(v) = geo.numeric_attribute(field) {
                    values.push(v);
                }
            }

            let values = per_type
                .into_iter()
                .filter_map(|(kind, values)| {
                    aggregation
                        .reduce(&values)
                        .map(|v| (kind.to_string(), v))
                })
                .collect();

            Bar {
                timestamp: observation.start_date_time,
                values,
            }
        })
        .collect();

    Some(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::parse_payload;

    fn observations() -> Vec<Observation> {
        parse_payload(
            r#"{ "observations": [
                { "startDateTime": "2024-02-01T09:15:00Z", "geoObjects": [
                    { "type": "car", "geometry": { "type": "Point", "coordinates": [0, 0] },
                      "customAttributes": { "speed": 10, "lane": 1 } },
                    { "type": "car", "geometry": { "type": "Point", "coordinates": [1, 1] },
                      "customAttributes": { "speed": 30 } },
                    { "type": "bike", "geometry": { "type": "Point", "coordinates": [2, 2] },
                      "customAttributes": { "speed": "slow" } },
                    { "type": "tree", "geometry": { "type": "Point", "coordinates": [3, 3] } }
                ] }
            ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_custom_attribute_fields() {
        assert_eq!(
            custom_attribute_fields(&observations()),
            vec!["lane".to_string(), "speed".to_string()]
        );
    }

    #[test]
    fn test_count_ignores_field() {
        let bars = bar_data(&observations(), Aggregation::Count, "").unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].values["car"], 2.0);
        assert_eq!(bars[0].values["bike"], 1.0);
        assert_eq!(bars[0].values["tree"], 1.0);
        assert_eq!(bars[0].label(), "2024-02-01\n09:15:00");
    }

    #[test]
    fn test_value_aggregations() {
        let obs = observations();
        let value = |agg: Aggregation, kind: &str| {
            bar_data(&obs, agg, "speed").unwrap()[0].values.get(kind).copied()
        };

        assert_eq!(value(Aggregation::Sum, "car"), Some(40.0));
        assert_eq!(value(Aggregation::Average, "car"), Some(20.0));
        assert_eq!(value(Aggregation::Min, "car"), Some(10.0));
        assert_eq!(value(Aggregation::Max, "car"), Some(30.0));

        // non-numeric and missing values contribute nothing
        assert_eq!(value(Aggregation::Sum, "bike"), Some(0.0));
        assert_eq!(value(Aggregation::Average, "bike"), None);
        assert_eq!(value(Aggregation::Max, "tree"), None);
    }

    #[test]
    fn test_value_aggregation_without_field() {
        assert!(bar_data(&observations(), Aggregation::Sum, "").is_none());
    }

    #[test]
    fn test_parse_aggregation() {
        assert_eq!("Average".parse::<Aggregation>(), Ok(Aggregation::Average));
        assert!("Median".parse::<Aggregation>().is_err());
    }
}
