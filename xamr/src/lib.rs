//! Array style access to block structured AMR simulation output.
//!
//! A `Dataset` is a time ordered series of snapshots loaded through an `Engine`. Fields are read
//! as `DataArray`s, either on uniform grids at a chosen refinement level or cell by cell over a
//! selection, and `Calculations` derives gradients, divergence and vorticity from them.
//!
//! ```ignore
//! let engine = MemoryEngine::new();
//! let dataset = xamr::open(&engine, "run/plt*")?;
//! let divergence = dataset.calc().divergence("x_velocity", "y_velocity", None)?;
//! let finest = divergence.values(Some(dataset.attrs().max_level as i64))?;
//! ```

mod array;
mod calc;
mod dataset;
mod engine;
mod errors;
mod field;
mod geom;
mod helpers;
pub mod memory;
mod source;

#[cfg(test)]
mod testing;

pub use array::{AxisBound, Bounds, DataArray, Levels, POINT_HALF_WIDTH};
pub use calc::{Calculations, DERIVED_NAMESPACE};
pub use dataset::{Attributes, Coords, Dataset, NUM_GHOST_ZONES};
pub use engine::{
    CoveringGrid, Engine, FieldReader, Param, Parameters, Recipe, SelectedData, Selection,
    Snapshot,
};
pub use errors::{Error, ErrorKind, Result};
pub use field::{Axis, FieldId, INDEX_NAMESPACE, NATIVE_NAMESPACES};
pub use geom::{IndexBox, Region};
pub use source::Source;

/// Open a dataset from one path, a glob pattern or a list of paths.
///
pub fn open<E, S>(engine: &E, source: S) -> Result<Dataset>
where
    E: Engine + ?Sized,
    S: Into<Source>,
{
    Dataset::open(engine, source)
}
