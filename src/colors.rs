use std::collections::{BTreeMap, BTreeSet};

use geodata::Observation;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------
// Type -> color mapping
// ------------------------------------------------------------------

/// Display color per geo-object type.
///
/// Serialized as an array of `[type, color]` pairs, the shape carried by
/// permalinks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct TypeColorMap(BTreeMap<String, String>);

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("`{0}` is not a #rrggbb color")]
pub struct InvalidColor(pub String);

impl TypeColorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: &str) -> Option<&str> {
        self.0.get(kind).map(String::as_str)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// User override of a type's color.
    pub fn assign(
        &mut self,
        kind: impl Into<String>,
        color: &str,
    ) -> Result<(), InvalidColor> {
        if !is_hex_color(color) {
            return Err(InvalidColor(color.to_string()));
        }
        self.0.insert(kind.into(), color.to_ascii_lowercase());
        Ok(())
    }
}

impl From<Vec<(String, String)>> for TypeColorMap {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs.into_iter().collect())
    }
}

impl From<TypeColorMap> for Vec<(String, String)> {
    fn from(map: TypeColorMap) -> Self {
        map.0.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TypeColorMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

pub fn is_hex_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

// ------------------------------------------------------------------
// Color generation
// ------------------------------------------------------------------

/// Supplies colors for types that have none yet.
pub trait ColorSource {
    fn next_color(&mut self) -> String;
}

/// Uniform random 24-bit colors.
pub struct RandomColors {
    rng: StdRng,
}

impl RandomColors {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomColors {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorSource for RandomColors {
    fn next_color(&mut self) -> String {
        format!("#{:06x}", self.rng.random_range(0..1u32 << 24))
    }
}

/// Cycles through a categorical colorous scheme.
pub struct PaletteColors {
    palette: &'static [colorous::Color],
    next: usize,
}

impl PaletteColors {
    pub fn new(palette: &'static [colorous::Color]) -> Self {
        Self { palette, next: 0 }
    }

    pub fn category10() -> Self {
        Self::new(&colorous::CATEGORY10)
    }

    pub fn tableau10() -> Self {
        Self::new(&colorous::TABLEAU10)
    }
}

impl ColorSource for PaletteColors {
    fn next_color(&mut self) -> String {
        if self.palette.is_empty() {
            return "#000000".to_string();
        }
        let c = self.palette[self.next % self.palette.len()];
        self.next = self.next.wrapping_add(1);
        format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
    }
}

// ------------------------------------------------------------------
// Completion
// ------------------------------------------------------------------

/// Distinct geo-object types across all observations, sorted.
pub fn distinct_types(observations: &[Observation]) -> BTreeSet<&str> {
    observations
        .iter()
        .flat_map(|o| &o.geo_objects)
        .map(|g| g.kind.as_str())
        .collect()
}

/// Give every type in `observations` a color.
///
/// Existing entries are copied unchanged, including those of types that
/// are no longer present, so a type that briefly disappears between two
/// refreshes keeps its color.
pub fn complete(
    current: &TypeColorMap,
    observations: &[Observation],
    source: &mut dyn ColorSource,
) -> TypeColorMap {
    let mut completed = current.clone();
    for kind in distinct_types(observations) {
        if !completed.contains(kind) {
            completed.0.insert(kind.to_string(), source.next_color());
        }
    }
    completed
}

/// A new color for every type present, ignoring any previous mapping.
pub fn fresh(
    observations: &[Observation],
    source: &mut dyn ColorSource,
) -> TypeColorMap {
    complete(&TypeColorMap::new(), observations, source)
}
