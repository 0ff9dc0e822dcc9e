use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    engine::{Param, Parameters},
    errors::{Error, Result},
    geom::IndexBox,
};

fn default_refine_by() -> usize {
    2
}

/// Block structured AMR data for one point in time, held in memory.
///
/// Patches are boxes of cells at some refinement level, located in the index space of their
/// level. Level 0 patches are expected to tile the domain and finer patches to nest inside
/// coarser ones; patches at the same level must not overlap.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AmrSnapshot {
    pub time: f64,

    /// x, y, z order
    pub domain_left_edge: Vec<f64>,

    /// x, y, z order
    pub domain_right_edge: Vec<f64>,

    /// Level 0 cells across the domain, x, y, z order
    pub domain_dimensions: Vec<usize>,

    #[serde(default = "default_refine_by")]
    pub refine_by: usize,

    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub patches: Vec<Patch>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patch {
    pub level: usize,

    /// Lower corner in the index space of `level`, x, y, z order
    pub lo: Vec<i64>,

    /// Cells along each axis, x, y, z order
    pub dims: Vec<usize>,

    /// Field values, slowest axis first (z, y, x)
    pub fields: BTreeMap<String, Vec<f64>>,
}

impl Patch {
    pub fn index_box(&self) -> IndexBox {
        IndexBox::with_dims(&self.lo, &self.dims)
    }
}

impl AmrSnapshot {
    pub fn new(
        time: f64,
        domain_left_edge: Vec<f64>,
        domain_right_edge: Vec<f64>,
        domain_dimensions: Vec<usize>,
    ) -> Self {
        Self {
            time,
            domain_left_edge,
            domain_right_edge,
            domain_dimensions,
            refine_by: default_refine_by(),
            parameters: Parameters::new(),
            patches: vec![],
        }
    }

    pub fn with_refine_by(mut self, refine_by: usize) -> Self {
        self.refine_by = refine_by;
        self
    }

    pub fn with_parameter<S: Into<String>>(mut self, name: S, value: Param) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patches.push(patch);
        self
    }

    /// Read a JSON encoded snapshot from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Self = serde_json::from_reader(reader)?;
        snapshot.validate()?;

        Ok(snapshot)
    }

    /// Write this snapshot to disk, JSON encoded.
    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let rank = self.dimensionality();
        if rank != 2 && rank != 3 {
            return Err(Error::Format(format!(
                "dimensionality must be 2 or 3, got {rank}"
            )));
        }
        if self.domain_left_edge.len() != rank || self.domain_right_edge.len() != rank {
            return Err(Error::Format(String::from(
                "domain edges don't match domain dimensions",
            )));
        }
        if self.domain_dimensions.contains(&0) {
            return Err(Error::Format(format!(
                "domain must have at least one cell along each axis, got {:?}",
                self.domain_dimensions
            )));
        }
        for (left, right) in self.domain_left_edge.iter().zip(&self.domain_right_edge) {
            if !left.is_finite() || !right.is_finite() || left >= right {
                return Err(Error::Format(format!(
                    "domain edges must be finite with left < right, got [{left}, {right}]"
                )));
            }
        }
        if self.refine_by < 2 {
            return Err(Error::Format(format!(
                "refinement ratio must be at least 2, got {}",
                self.refine_by
            )));
        }
        for patch in &self.patches {
            if patch.lo.len() != rank || patch.dims.len() != rank {
                return Err(Error::Format(format!(
                    "patch at level {} has the wrong rank",
                    patch.level
                )));
            }
            if patch.dims.contains(&0) {
                return Err(Error::Format(format!(
                    "patch at level {} has no cells",
                    patch.level
                )));
            }
            let len: usize = patch.dims.iter().product();
            for (name, values) in &patch.fields {
                if values.len() != len {
                    return Err(Error::Format(format!(
                        "field '{name}' has {} values, patch has {len} cells",
                        values.len()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn dimensionality(&self) -> usize {
        self.domain_dimensions.len()
    }

    pub fn max_level(&self) -> usize {
        self.patches.iter().map(|p| p.level).max().unwrap_or(0)
    }

    /// Names of fields stored in every patch.
    pub fn field_names(&self) -> Vec<String> {
        let mut patches = self.patches.iter();
        let mut names: BTreeSet<&String> = match patches.next() {
            Some(first) => first.fields.keys().collect(),
            None => BTreeSet::new(),
        };
        for patch in patches {
            names.retain(|name| patch.fields.contains_key(*name));
        }

        names.into_iter().cloned().collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.patches.iter().any(|p| p.fields.contains_key(name))
    }

    fn ratio(&self, levels: usize) -> i64 {
        (self.refine_by as i64).pow(levels as u32)
    }

    /// The whole domain in the index space of `level`.
    pub fn domain_box(&self, level: usize) -> IndexBox {
        let dims: Vec<usize> = self
            .domain_dimensions
            .iter()
            .map(|d| d * self.ratio(level) as usize)
            .collect();

        IndexBox::with_dims(&vec![0; dims.len()], &dims)
    }

    /// Width of a cell at `level` along the axis at `position` (x = 0, y = 1, z = 2).
    pub fn cell_width(&self, level: usize, position: usize) -> f64 {
        let extent = self.domain_right_edge[position] - self.domain_left_edge[position];

        extent / (self.domain_dimensions[position] as f64 * self.ratio(level) as f64)
    }

    pub fn cell_volume(&self, level: usize) -> f64 {
        (0..self.dimensionality())
            .map(|position| self.cell_width(level, position))
            .product()
    }

    pub fn cell_center(&self, level: usize, index: &[i64]) -> Vec<f64> {
        index
            .iter()
            .enumerate()
            .map(|(position, i)| {
                self.domain_left_edge[position]
                    + (*i as f64 + 0.5) * self.cell_width(level, position)
            })
            .collect()
    }

    /// Index at `level` of the cell whose lower corner is nearest to `point`.
    pub fn index_of(&self, level: usize, point: &[f64]) -> Vec<i64> {
        point
            .iter()
            .enumerate()
            .map(|(position, p)| {
                ((p - self.domain_left_edge[position]) / self.cell_width(level, position)).round()
                    as i64
            })
            .collect()
    }

    /// Pull an index that falls outside the domain back to the nearest cell inside it.
    fn clamp(&self, level: usize, index: &[i64]) -> Vec<i64> {
        let domain = self.domain_box(level);
        index
            .iter()
            .zip(domain.lo.iter().zip(&domain.hi))
            .map(|(i, (lo, hi))| (*i).clamp(*lo, hi - 1))
            .collect()
    }

    /// Finest patch, no finer than `level`, containing the cell `index` at `level`.
    ///
    fn patch_for(&self, level: usize, index: &[i64]) -> Option<&Patch> {
        let index = self.clamp(level, index);
        self.patches
            .iter()
            .filter(|p| p.level <= level)
            .filter(|p| {
                let ratio = self.ratio(level - p.level);
                let coarse: Vec<i64> = index.iter().map(|i| i.div_euclid(ratio)).collect();
                p.index_box().contains(&coarse)
            })
            .max_by_key(|p| p.level)
    }

    /// Value of `field` at the cell `index` of `level`, taken from the finest data available no
    /// finer than `level`. Coarser data is injected piecewise constant.
    ///
    pub fn sample(&self, field: &str, level: usize, index: &[i64]) -> Result<f64> {
        let index = self.clamp(level, index);
        let patch = self
            .patch_for(level, &index)
            .ok_or_else(|| Error::Engine(format!("no patch covers cell {index:?} at level {level}")))?;
        let values = patch.fields.get(field).ok_or_else(|| Error::missing(field))?;
        let ratio = self.ratio(level - patch.level);
        let coarse: Vec<i64> = index.iter().map(|i| i.div_euclid(ratio)).collect();

        Ok(values[patch.index_box().offset(&coarse)])
    }

    /// Level of the patch `sample` would read the cell `index` of `level` from.
    pub fn sample_level(&self, level: usize, index: &[i64]) -> Result<usize> {
        self.patch_for(level, index)
            .map(|p| p.level)
            .ok_or_else(|| Error::Engine(format!("no patch covers cell {index:?} at level {level}")))
    }

    /// Whether a finer patch covers the cell `index` of `level`.
    pub fn is_covered(&self, level: usize, index: &[i64]) -> bool {
        let cell = IndexBox::with_dims(index, &vec![1; index.len()]);
        self.patches
            .iter()
            .filter(|p| p.level > level)
            .any(|p| cell.refine(self.ratio(p.level - level)).overlaps(&p.index_box()))
    }

    /// Build a patch by evaluating `f(field, cell_center)` for every named field.
    ///
    pub fn fill_patch<F>(&self, level: usize, lo: &[i64], dims: &[usize], names: &[&str], f: F) -> Patch
    where
        F: Fn(&str, &[f64]) -> f64,
    {
        let bx = IndexBox::with_dims(lo, dims);
        let fields = names
            .iter()
            .map(|name| {
                let values = bx
                    .iter()
                    .map(|index| f(name, &self.cell_center(level, &index)))
                    .collect();
                (name.to_string(), values)
            })
            .collect();

        Patch {
            level,
            lo: lo.to_vec(),
            dims: dims.to_vec(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level() -> AmrSnapshot {
        let snapshot = AmrSnapshot::new(0.5, vec![0.0, 0.0], vec![1.0, 2.0], vec![4, 4]);
        let base = snapshot.fill_patch(0, &[0, 0], &[4, 4], &["rho"], |_, p| p[0] + 10.0 * p[1]);
        let fine = snapshot.fill_patch(1, &[2, 2], &[4, 4], &["rho"], |_, _| -1.0);

        snapshot.with_patch(base).with_patch(fine)
    }

    #[test]
    fn test_geometry() {
        let snapshot = two_level();
        assert_eq!(snapshot.dimensionality(), 2);
        assert_eq!(snapshot.max_level(), 1);
        assert_eq!(snapshot.cell_width(0, 0), 0.25);
        assert_eq!(snapshot.cell_width(0, 1), 0.5);
        assert_eq!(snapshot.cell_width(1, 1), 0.25);
        assert_eq!(snapshot.cell_volume(0), 0.125);
        assert_eq!(snapshot.cell_center(0, &[1, 2]), vec![0.375, 1.25]);
        assert_eq!(snapshot.index_of(1, &[0.5, 1.0]), vec![4, 4]);
        assert_eq!(snapshot.domain_box(1).dims(), vec![8, 8]);
    }

    #[test]
    fn test_sample_prefers_finest() {
        let snapshot = two_level();

        // Level 0 reads level 0 data only
        assert_eq!(snapshot.sample("rho", 0, &[1, 1]).unwrap(), 0.375 + 7.5);
        assert_eq!(snapshot.sample("rho", 0, &[1, 2]).unwrap(), 0.375 + 12.5);

        // Level 1 picks up the fine patch where it exists, injects level 0 elsewhere
        assert_eq!(snapshot.sample("rho", 1, &[3, 3]).unwrap(), -1.0);
        assert_eq!(snapshot.sample("rho", 1, &[0, 1]).unwrap(), 0.125 + 2.5);
        assert_eq!(snapshot.sample_level(1, &[3, 3]).unwrap(), 1);
        assert_eq!(snapshot.sample_level(1, &[0, 0]).unwrap(), 0);
    }

    #[test]
    fn test_sample_clamps_outside_domain() {
        let snapshot = two_level();
        assert_eq!(
            snapshot.sample("rho", 0, &[-1, -1]).unwrap(),
            snapshot.sample("rho", 0, &[0, 0]).unwrap()
        );
        assert_eq!(
            snapshot.sample("rho", 0, &[4, 2]).unwrap(),
            snapshot.sample("rho", 0, &[3, 2]).unwrap()
        );
    }

    #[test]
    fn test_sample_missing_field() {
        let snapshot = two_level();
        assert!(matches!(
            snapshot.sample("pressure", 0, &[0, 0]),
            Err(Error::MissingField { .. })
        ));
    }

    #[test]
    fn test_is_covered() {
        let snapshot = two_level();
        assert!(snapshot.is_covered(0, &[1, 1]));
        assert!(snapshot.is_covered(0, &[2, 2]));
        assert!(!snapshot.is_covered(0, &[0, 0]));
        assert!(!snapshot.is_covered(0, &[3, 3]));
        assert!(!snapshot.is_covered(1, &[3, 3]));
    }

    #[test]
    fn test_field_names() {
        let mut snapshot = two_level();
        assert_eq!(snapshot.field_names(), vec![String::from("rho")]);

        snapshot.patches[0]
            .fields
            .insert(String::from("temp"), vec![0.0; 16]);
        assert_eq!(snapshot.field_names(), vec![String::from("rho")]);
        assert!(snapshot.has_field("temp"));
    }

    #[test]
    fn test_validate() {
        let snapshot = two_level();
        assert!(snapshot.validate().is_ok());

        let mut bad = snapshot.clone();
        bad.patches[1].fields.get_mut("rho").unwrap().pop();
        assert!(matches!(bad.validate(), Err(Error::Format(_))));

        let bad = AmrSnapshot::new(0.0, vec![0.0], vec![1.0], vec![8]);
        assert!(matches!(bad.validate(), Err(Error::Format(_))));

        let empty = AmrSnapshot::new(0.0, vec![0.0, 0.0], vec![1.0, 1.0], vec![0, 4]);
        assert!(matches!(empty.validate(), Err(Error::Format(_))));

        let flat = AmrSnapshot::new(0.0, vec![0.0, 1.0], vec![1.0, 1.0], vec![4, 4]);
        assert!(matches!(flat.validate(), Err(Error::Format(_))));

        let unbounded = AmrSnapshot::new(0.0, vec![0.0, 0.0], vec![f64::INFINITY, 1.0], vec![4, 4]);
        assert!(matches!(unbounded.validate(), Err(Error::Format(_))));

        let mut no_cells = snapshot.clone();
        no_cells.patches[1].dims = vec![0, 4];
        no_cells.patches[1].fields.clear();
        assert!(matches!(no_cells.validate(), Err(Error::Format(_))));
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("plt00000.json");
        let snapshot = two_level().with_parameter("cfl", Param::Float(0.7));
        snapshot.save(&path)?;

        let loaded = AmrSnapshot::load(&path)?;
        assert_eq!(loaded.time, 0.5);
        assert_eq!(loaded.patches.len(), 2);
        assert_eq!(loaded.parameters["cfl"], Param::Float(0.7));
        assert_eq!(
            loaded.sample("rho", 1, &[3, 3])?,
            snapshot.sample("rho", 1, &[3, 3])?
        );

        Ok(())
    }
}
