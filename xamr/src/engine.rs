//! The contract with the mesh engine that does the actual AMR work.
//!
//! `xamr` never reads simulation output itself. An `Engine` loads a source into a `Snapshot`,
//! and the snapshot answers every question about grids, regions and fields. A reference
//! in-memory implementation lives in the `memory` module.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::{
    errors::Result,
    field::{Axis, FieldId},
    geom::Region,
};

/// Loads simulation output.
///
pub trait Engine {
    /// Load one source, producing a snapshot owned by the caller.
    ///
    fn load(&self, source: &Path) -> Result<Box<dyn Snapshot>>;
}

/// One loaded simulation output at one point in time.
///
/// Metadata is immutable once loaded. The derived field registry is the only mutable state and
/// is only ever extended, through `add_field` and `add_gradient_fields`.
///
pub trait Snapshot: Send + Sync {
    fn current_time(&self) -> f64;

    /// 2 or 3
    fn dimensionality(&self) -> usize;

    fn max_level(&self) -> usize;

    /// Refinement ratio between consecutive levels
    fn refine_by(&self) -> usize;

    /// Lower domain corner, x, y, z order
    fn domain_left_edge(&self) -> &[f64];

    /// Upper domain corner, x, y, z order
    fn domain_right_edge(&self) -> &[f64];

    /// Number of level 0 cells spanning the domain, x, y, z order
    fn domain_dimensions(&self) -> &[usize];

    /// Fields stored in the simulation output.
    fn field_list(&self) -> Vec<FieldId>;

    fn parameters(&self) -> &Parameters;

    /// Build a uniform grid at `level`, with its lower corner at `left_edge` and `dims` cells
    /// along each axis (x, y, z order), padded by `num_ghost_zones` cells on every side.
    ///
    fn covering_grid(
        &self,
        level: usize,
        left_edge: &[f64],
        dims: &[usize],
        num_ghost_zones: usize,
    ) -> Result<Box<dyn CoveringGrid>>;

    /// Read a field over the cells picked out by `selection`.
    ///
    fn select(&self, selection: &Selection, field: &FieldId) -> Result<SelectedData>;

    /// Fields registered through `add_field` or `add_gradient_fields`.
    ///
    fn derived_field_list(&self) -> Vec<FieldId>;

    /// Register a derived field. Registering a name that already exists replaces its recipe;
    /// callers check `derived_field_list` first.
    ///
    fn add_field(&self, field: FieldId, recipe: Recipe) -> Result<()>;

    /// Register the gradient of `base` along every spatial axis in one go, returning the new
    /// identifiers in x, y, z order. See `FieldId::gradient` for naming.
    ///
    fn add_gradient_fields(&self, base: &FieldId) -> Result<Vec<FieldId>>;
}

/// A uniform grid covering some box of a snapshot at one level.
///
pub trait CoveringGrid: Send + Sync {
    fn level(&self) -> usize;

    /// Shape of arrays returned by `read`, slowest axis first.
    fn shape(&self) -> Vec<usize>;

    /// Read a field over the grid's active cells. Ghost cells take part in evaluating derived
    /// fields but are not returned.
    ///
    fn read(&self, field: &FieldId) -> Result<ArrayD<f64>>;
}

/// What a derived field recipe gets to see while it is evaluated.
///
pub trait FieldReader {
    /// Read a field over the whole evaluation block, ghost cells included.
    fn read(&self, field: &FieldId) -> Result<ArrayD<f64>>;

    /// Width of a cell along `axis`, in domain units.
    fn cell_width(&self, axis: Axis) -> f64;

    fn dimensionality(&self) -> usize;
}

/// A derived field recipe: a pure, elementwise combination of already known fields.
///
pub type Recipe = Arc<dyn Fn(&dyn FieldReader) -> Result<ArrayD<f64>> + Send + Sync>;

/// Which cells of a snapshot to read.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// Every leaf cell in the domain
    All,

    /// Leaf cells whose centers are inside a box
    Region(Region),

    /// Leaf cells of `base` belonging to one of `levels`
    Levels {
        base: Box<Selection>,
        levels: Vec<usize>,
    },
}

impl Default for Selection {
    fn default() -> Self {
        Self::All
    }
}

/// Field values of selected cells, as flat parallel arrays.
///
#[derive(Clone, Debug, Default)]
pub struct SelectedData {
    pub values: Vec<f64>,

    /// Cell volumes (areas in 2 dimensions), for weighting
    pub volumes: Vec<f64>,

    /// Refinement level of each cell
    pub levels: Vec<usize>,

    /// Cell centers, one vector per spatial axis in x, y, z order
    pub positions: Vec<Vec<f64>>,
}

impl SelectedData {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest value, ignoring NaN. NaN for an empty selection.
    pub fn max(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::max)
    }

    /// Smallest value, ignoring NaN. NaN for an empty selection.
    pub fn min(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::min)
    }

    /// Volume weighted mean, ignoring NaN. NaN for an empty selection.
    pub fn mean(&self) -> f64 {
        let (weighted, volume) = self
            .values
            .iter()
            .zip(&self.volumes)
            .filter(|(value, _)| !value.is_nan())
            .fold((0.0, 0.0), |(sum, total), (value, volume)| {
                (sum + value * volume, total + volume)
            });

        weighted / volume
    }
}

/// Simulation parameters attached to a snapshot.
///
pub type Parameters = BTreeMap<String, Param>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}
