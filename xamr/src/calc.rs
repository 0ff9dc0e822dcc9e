use std::sync::Arc;

use log::debug;
use ndarray::ArrayD;

use crate::{
    array::DataArray,
    dataset::Dataset,
    engine::{FieldReader, Recipe, Snapshot},
    errors::{Error, Result},
    field::{Axis, FieldId},
};

/// Namespace derived fields are registered under.
pub const DERIVED_NAMESPACE: &str = "amrex";

/// Derives new fields of a dataset.
///
/// Each derivation registers a recipe with every snapshot, unless one by that name is already
/// registered, and maps the new field's name in the dataset's data variables.
///
pub struct Calculations<'a> {
    dataset: &'a Dataset,
}

impl<'a> Calculations<'a> {
    pub(crate) fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Gradient of `field` along `axis`, named `{field}_gradient_{axis}`.
    ///
    pub fn gradient(&self, field: &str, axis: &str) -> Result<DataArray<'a>> {
        let axis = self.axis(axis)?;
        let base = self.dataset.var(field)?;
        let gradient = self.ensure_gradient(&base, axis)?;

        let name = format!("{field}_gradient_{axis}");
        self.dataset.insert_var(&name, gradient);
        self.dataset.field(&name)
    }

    /// Divergence of the vector field (`u`, `v`, `w`), named `divergence`. `w` only contributes
    /// in 3 dimensions.
    ///
    pub fn divergence(&self, u: &str, v: &str, w: Option<&str>) -> Result<DataArray<'a>> {
        let mut terms = vec![
            self.ensure_gradient(&self.dataset.var(u)?, Axis::X)?,
            self.ensure_gradient(&self.dataset.var(v)?, Axis::Y)?,
        ];
        if let Some(w) = w {
            if self.dataset.dimensionality() == 3 {
                terms.push(self.ensure_gradient(&self.dataset.var(w)?, Axis::Z)?);
            }
        }

        let recipe: Recipe = Arc::new(move |reader: &dyn FieldReader| -> Result<ArrayD<f64>> {
            let mut sum = reader.read(&terms[0])?;
            for term in &terms[1..] {
                sum += &reader.read(term)?;
            }

            Ok(sum)
        });

        self.derive("divergence", recipe)
    }

    /// z component of the curl of (`u`, `v`), named `vorticity_z`.
    ///
    pub fn vorticity(&self, u: &str, v: &str) -> Result<DataArray<'a>> {
        let dv_dx = self.ensure_gradient(&self.dataset.var(v)?, Axis::X)?;
        let du_dy = self.ensure_gradient(&self.dataset.var(u)?, Axis::Y)?;

        let recipe: Recipe = Arc::new(move |reader: &dyn FieldReader| -> Result<ArrayD<f64>> {
            Ok(reader.read(&dv_dx)? - reader.read(&du_dy)?)
        });

        self.derive("vorticity_z", recipe)
    }

    fn axis(&self, axis: &str) -> Result<Axis> {
        let axis: Axis = axis.parse()?;
        if axis.position() >= self.dataset.dimensionality() {
            return Err(Error::BadAxis(axis.name().to_string()));
        }

        Ok(axis)
    }

    /// Make sure every snapshot has gradient fields for `base`, returning the one along `axis`.
    ///
    fn ensure_gradient(&self, base: &FieldId, axis: Axis) -> Result<FieldId> {
        let gradient = base.gradient(axis);
        for snapshot in self.dataset.snapshots() {
            if is_registered(snapshot.as_ref(), &gradient) {
                debug!("{gradient} already registered, skipping");
                continue;
            }
            snapshot.add_gradient_fields(base)?;
        }

        Ok(gradient)
    }

    /// Register `recipe` as `name` with every snapshot that doesn't have it yet.
    ///
    fn derive(&self, name: &str, recipe: Recipe) -> Result<DataArray<'a>> {
        let field = FieldId::new(DERIVED_NAMESPACE, name);
        for snapshot in self.dataset.snapshots() {
            if is_registered(snapshot.as_ref(), &field) {
                debug!("{field} already registered, skipping");
                continue;
            }
            snapshot.add_field(field.clone(), Arc::clone(&recipe))?;
        }

        self.dataset.insert_var(name, field);
        self.dataset.field(name)
    }
}

fn is_registered(snapshot: &dyn Snapshot, field: &FieldId) -> bool {
    snapshot.derived_field_list().contains(field)
}
