//! Dataset catalogue: a JSON map of dataset names to their mirror URLs.
//!
//! ```json
//! {
//!   "data_testing": [
//!     "https://github.com/org/data_testing/archive/r20200101.zip",
//!     "https://mirror.example.org/data_testing.zip"
//!   ],
//!   "t2_model": "https://example.org/t2_model.tar.gz"
//! }
//! ```
//!
//! Mirrors are listed in order of decreasing priority.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::CatalogueError;
use crate::mirrors::MirrorList;

pub const DEFAULT_CATALOGUE: &str = "URL_list.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Catalogue {
    datasets: BTreeMap<String, MirrorList>,
}

impl Catalogue {
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogueError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogueError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn mirrors(&self, name: &str) -> Result<&MirrorList, CatalogueError> {
        self.datasets
            .get(name)
            .ok_or_else(|| CatalogueError::UnknownDataset {
                name: name.to_string(),
                known: self.names().map(str::to_string).collect(),
            })
    }

    /// Dataset names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}
