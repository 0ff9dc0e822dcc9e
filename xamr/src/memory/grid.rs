use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn, Slice, Zip};
use parking_lot::Mutex;

use crate::{
    engine::{CoveringGrid, FieldReader, Recipe},
    errors::{Error, Result},
    field::{Axis, FieldId, INDEX_NAMESPACE},
    geom::IndexBox,
};

use super::amr::AmrSnapshot;

pub(crate) type Registry = IndexMap<FieldId, Recipe>;

/// A box of cells at one level over which fields are evaluated.
///
/// Evaluated fields are memoized, so a recipe that reads the same input twice, or two recipes
/// sharing an input, only pay for it once.
///
pub(crate) struct Block {
    snapshot: Arc<AmrSnapshot>,
    derived: Arc<Registry>,
    level: usize,
    bounds: IndexBox,
    evaluated: Mutex<HashMap<FieldId, ArrayD<f64>>>,
}

impl Block {
    pub(crate) fn new(
        snapshot: Arc<AmrSnapshot>,
        derived: Arc<Registry>,
        level: usize,
        bounds: IndexBox,
    ) -> Self {
        Self {
            snapshot,
            derived,
            level,
            bounds,
            evaluated: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn bounds(&self) -> &IndexBox {
        &self.bounds
    }

    fn from_cells<F>(&self, mut f: F) -> Result<ArrayD<f64>>
    where
        F: FnMut(&[i64]) -> Result<f64>,
    {
        let values = self
            .bounds
            .iter()
            .map(|index| f(&index))
            .collect::<Result<Vec<f64>>>()?;

        Ok(ArrayD::from_shape_vec(IxDyn(&self.bounds.shape()), values)?)
    }

    fn evaluate(&self, field: &FieldId) -> Result<ArrayD<f64>> {
        if let Some(recipe) = self.derived.get(field) {
            return recipe(self);
        }

        if field.namespace == INDEX_NAMESPACE {
            let level = self.level;
            return match field.name.as_str() {
                "grid_level" => self.from_cells(|index| {
                    Ok(self.snapshot.sample_level(level, index)? as f64)
                }),
                name => {
                    let axis: Axis = name.parse().map_err(|_| Error::missing(&field.name))?;
                    let position = axis.position();
                    if position >= self.snapshot.dimensionality() {
                        return Err(Error::missing(&field.name));
                    }
                    self.from_cells(|index| Ok(self.snapshot.cell_center(level, index)[position]))
                }
            };
        }

        if field.is_native() && self.snapshot.has_field(&field.name) {
            return self.from_cells(|index| self.snapshot.sample(&field.name, self.level, index));
        }

        Err(Error::missing(&field.name))
    }
}

impl FieldReader for Block {
    fn read(&self, field: &FieldId) -> Result<ArrayD<f64>> {
        if let Some(values) = self.evaluated.lock().get(field) {
            return Ok(values.clone());
        }

        // Lock is not held while evaluating, recipes read through here recursively
        let values = self.evaluate(field)?;
        self.evaluated.lock().insert(field.clone(), values.clone());

        Ok(values)
    }

    fn cell_width(&self, axis: Axis) -> f64 {
        self.snapshot.cell_width(self.level, axis.position())
    }

    fn dimensionality(&self) -> usize {
        self.snapshot.dimensionality()
    }
}

/// Covering grid over an in-memory snapshot.
///
/// The derived field registry is captured when the grid is built. Fields registered with the
/// snapshot afterwards aren't visible through this grid.
///
pub struct MemoryGrid {
    block: Block,
    num_ghost_zones: usize,
}

impl MemoryGrid {
    pub(crate) fn new(block: Block, num_ghost_zones: usize) -> Self {
        Self {
            block,
            num_ghost_zones,
        }
    }
}

impl CoveringGrid for MemoryGrid {
    fn level(&self) -> usize {
        self.block.level
    }

    fn shape(&self) -> Vec<usize> {
        self.block
            .bounds()
            .extend_all(-(self.num_ghost_zones as i64))
            .shape()
    }

    fn read(&self, field: &FieldId) -> Result<ArrayD<f64>> {
        let values = self.block.read(field)?;
        let ghost = self.num_ghost_zones as isize;
        let active = values.slice_each_axis(|axis| Slice::from(ghost..axis.len as isize - ghost));

        Ok(active.to_owned())
    }
}

/// Derivative of `values` along `axis`: centered differences in the interior, one sided at the
/// two ends. Arrays with fewer than 2 cells along `axis` have a zero derivative.
///
pub(crate) fn gradient(values: &ArrayD<f64>, axis: ndarray::Axis, dx: f64) -> ArrayD<f64> {
    let mut out = ArrayD::zeros(values.raw_dim());
    let n = values.len_of(axis);
    if n < 2 {
        return out;
    }

    Zip::from(values.lanes(axis))
        .and(out.lanes_mut(axis))
        .for_each(|lane, mut derivative| {
            derivative[0] = (lane[1] - lane[0]) / dx;
            derivative[n - 1] = (lane[n - 1] - lane[n - 2]) / dx;
            for i in 1..n - 1 {
                derivative[i] = (lane[i + 1] - lane[i - 1]) / (2.0 * dx);
            }
        });

    out
}

/// Recipe for the gradient of `base` along `axis`.
pub(crate) fn gradient_recipe(base: FieldId, axis: Axis) -> Recipe {
    Arc::new(move |reader: &dyn FieldReader| -> Result<ArrayD<f64>> {
        let values = reader.read(&base)?;
        let array_axis = axis.array_axis(reader.dimensionality());

        Ok(gradient(&values, array_axis, reader.cell_width(axis)))
    })
}
