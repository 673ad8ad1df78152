//! Index declarations.
//!
//! Indexes are declared on a schema with field names and resolved to storage paths when
//! the schema is built. The session ensures them once per collection before first use.

use std::time::Duration;

use bson::Bson;

/// Direction or type of one index component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDirection {
    Ascending,
    Descending,
    Geo2d,
    GeoHaystack,
}

impl IndexDirection {
    /// The value used for this component in a native index key document.
    pub fn to_bson(&self) -> Bson {
        match self {
            IndexDirection::Ascending => Bson::Int32(1),
            IndexDirection::Descending => Bson::Int32(-1),
            IndexDirection::Geo2d => Bson::String("2d".into()),
            IndexDirection::GeoHaystack => Bson::String("geoHaystack".into()),
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            IndexDirection::Ascending => "1",
            IndexDirection::Descending => "-1",
            IndexDirection::Geo2d => "2d",
            IndexDirection::GeoHaystack => "geoHaystack",
        }
    }
}

/// An ordered list of index components plus index options.
///
/// # Example
///
/// ```ignore
/// use docmodel_core::index::Index;
///
/// let index = Index::new()
///     .ascending("last_name")
///     .descending("age")
///     .unique();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    components: Vec<(String, IndexDirection)>,
    unique: bool,
    drop_dups: bool,
    expire_after: Option<u64>,
    min: Option<f64>,
    max: Option<f64>,
    bucket_size: Option<u32>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascending(mut self, path: impl Into<String>) -> Self {
        self.components.push((path.into(), IndexDirection::Ascending));
        self
    }

    pub fn descending(mut self, path: impl Into<String>) -> Self {
        self.components.push((path.into(), IndexDirection::Descending));
        self
    }

    pub fn geo2d(mut self, path: impl Into<String>) -> Self {
        self.components.push((path.into(), IndexDirection::Geo2d));
        self
    }

    /// Coordinate bounds for a 2d component.
    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn geo_haystack(mut self, path: impl Into<String>, bucket_size: u32) -> Self {
        self.components.push((path.into(), IndexDirection::GeoHaystack));
        self.bucket_size = Some(bucket_size);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Unique, dropping documents with duplicate keys when the index is built.
    pub fn unique_drop_dups(mut self) -> Self {
        self.unique = true;
        self.drop_dups = true;
        self
    }

    pub fn expire(mut self, seconds: u64) -> Self {
        self.expire_after = Some(seconds);
        self
    }

    pub fn components(&self) -> &[(String, IndexDirection)] {
        &self.components
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn drops_dups(&self) -> bool {
        self.drop_dups
    }

    pub fn expire_after(&self) -> Option<Duration> {
        self.expire_after.map(Duration::from_secs)
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn bucket_size(&self) -> Option<u32> {
        self.bucket_size
    }

    /// The native key document, components in declaration order.
    pub fn keys(&self) -> bson::Document {
        self.components
            .iter()
            .map(|(path, direction)| (path.clone(), direction.to_bson()))
            .collect()
    }

    /// The conventional index name, e.g. `last_name_1_age_-1`.
    pub fn name(&self) -> String {
        self.components
            .iter()
            .map(|(path, direction)| format!("{path}_{}", direction.suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub(crate) fn map_paths<E>(
        &self,
        mut resolve: impl FnMut(&str) -> Result<String, E>,
    ) -> Result<Index, E> {
        let components = self
            .components
            .iter()
            .map(|(path, direction)| Ok((resolve(path)?, *direction)))
            .collect::<Result<Vec<_>, E>>()?;

        Ok(Index {
            components,
            ..self.clone()
        })
    }
}
