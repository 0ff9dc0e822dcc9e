use std::path::PathBuf;

use indexmap::IndexMap;
use log::{debug, info};
use ndarray::ArrayD;
use parking_lot::RwLock;

use crate::{
    array::DataArray,
    calc::Calculations,
    engine::{CoveringGrid, Engine, Parameters, Snapshot},
    errors::{Error, Result},
    field::{Axis, FieldId},
    source::Source,
};

/// Ghost cells padding every covering grid the dataset builds, enough for centered differences
/// at the domain boundary.
pub const NUM_GHOST_ZONES: usize = 1;

/// A time ordered series of AMR snapshots, with named fields.
///
/// Every snapshot gets a covering grid of the whole domain at the coarsest level when the
/// dataset is opened. Those grids back indexed access through `DataArray`.
///
pub struct Dataset {
    files: Vec<PathBuf>,
    times: Vec<f64>,
    snapshots: Vec<Box<dyn Snapshot>>,
    coarsest_grids: Vec<Box<dyn CoveringGrid>>,
    coords: Coords,
    data_vars: RwLock<IndexMap<String, FieldId>>,
}

/// Coordinates of a dataset.
///
#[derive(Clone, Debug)]
pub struct Coords {
    /// Snapshot times, only when there is more than one snapshot
    pub time: Option<Vec<f64>>,

    /// Cell center coordinates on the coarsest grid, one array per spatial axis in x, y, z order
    pub axes: Vec<(Axis, ArrayD<f64>)>,

    /// Domain extent along each spatial axis, x, y, z order
    pub ranges: Vec<(f64, f64)>,

    pub levels: Vec<usize>,
}

impl Coords {
    pub fn axis(&self, axis: Axis) -> Option<&ArrayD<f64>> {
        self.axes
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, values)| values)
    }

    pub fn range(&self, axis: Axis) -> Option<(f64, f64)> {
        self.ranges.get(axis.position()).copied()
    }

    /// Whether a coordinate is present, by name: `time`, `x`, `x_range`, `levels` and so on.
    ///
    pub fn contains(&self, name: &str) -> bool {
        match name {
            "time" => self.time.is_some(),
            "levels" => true,
            name => {
                let axis = name.strip_suffix("_range").unwrap_or(name);
                axis.parse::<Axis>()
                    .map_or(false, |axis| axis.position() < self.axes.len())
            }
        }
    }
}

/// Global attributes of a dataset, taken from its earliest snapshot.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Attributes {
    pub max_level: usize,
    pub dimensionality: usize,
    pub times: Vec<f64>,
    pub n_timesteps: usize,
    pub domain_left_edge: Vec<f64>,
    pub domain_right_edge: Vec<f64>,
    pub domain_dimensions: Vec<usize>,
    pub parameters: Parameters,
}

impl Dataset {
    /// Open a dataset, loading every snapshot `source` resolves to through `engine`.
    ///
    /// Snapshots are ordered by time. The earliest one is the reference for dimensionality,
    /// domain and field listing; the rest are assumed to match it.
    ///
    pub fn open<E, S>(engine: &E, source: S) -> Result<Self>
    where
        E: Engine + ?Sized,
        S: Into<Source>,
    {
        let paths = source.into().expand()?;
        let mut loaded = paths
            .into_iter()
            .map(|path| {
                let snapshot = engine.load(&path)?;
                Ok((path, snapshot))
            })
            .collect::<Result<Vec<_>>>()?;

        let unsorted: Vec<f64> = loaded.iter().map(|(_, s)| s.current_time()).collect();
        loaded.sort_by(|(_, a), (_, b)| a.current_time().total_cmp(&b.current_time()));
        let (files, snapshots): (Vec<PathBuf>, Vec<Box<dyn Snapshot>>) = loaded.into_iter().unzip();
        let times: Vec<f64> = snapshots.iter().map(|s| s.current_time()).collect();
        if times != unsorted {
            debug!("reordered snapshots by time");
        }

        let coarsest_grids = snapshots
            .iter()
            .map(|snapshot| covering_grid(snapshot.as_ref(), 0))
            .collect::<Result<Vec<_>>>()?;
        debug!("built {} coarsest grids", coarsest_grids.len());

        let reference = snapshots[0].as_ref();
        let dimensionality = reference.dimensionality();
        let axes = Axis::first(dimensionality)
            .iter()
            .map(|&axis| Ok((axis, coarsest_grids[0].read(&FieldId::index(axis.name()))?)))
            .collect::<Result<Vec<_>>>()?;
        let ranges = reference
            .domain_left_edge()
            .iter()
            .zip(reference.domain_right_edge())
            .map(|(left, right)| (*left, *right))
            .collect();
        let coords = Coords {
            time: if times.len() > 1 {
                Some(times.clone())
            } else {
                None
            },
            axes,
            ranges,
            levels: (0..=reference.max_level()).collect(),
        };

        let mut data_vars = IndexMap::new();
        for field in reference.field_list() {
            if field.is_native() {
                data_vars.insert(field.name.clone(), field);
            }
        }
        for axis in Axis::first(dimensionality) {
            data_vars.insert(axis.name().to_string(), FieldId::index(axis.name()));
        }

        info!(
            "opened {} snapshots, {} fields, {} levels",
            files.len(),
            data_vars.len(),
            coords.levels.len()
        );

        Ok(Self {
            files,
            times,
            snapshots,
            coarsest_grids,
            coords,
            data_vars: RwLock::new(data_vars),
        })
    }

    /// A view of the named field over the whole domain.
    ///
    pub fn field(&self, name: &str) -> Result<DataArray<'_>> {
        let field = self
            .data_vars
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BadName(name.to_string()))?;

        Ok(DataArray::new(self, name, field))
    }

    pub fn attrs(&self) -> Attributes {
        let reference = self.reference();

        Attributes {
            max_level: reference.max_level(),
            dimensionality: reference.dimensionality(),
            times: self.times.clone(),
            n_timesteps: self.n_timesteps(),
            domain_left_edge: reference.domain_left_edge().to_vec(),
            domain_right_edge: reference.domain_right_edge().to_vec(),
            domain_dimensions: reference.domain_dimensions().to_vec(),
            parameters: reference.parameters().clone(),
        }
    }

    /// Refinement levels, coarsest first.
    pub fn levels(&self) -> Vec<usize> {
        self.coords.levels.clone()
    }

    pub fn calc(&self) -> Calculations<'_> {
        Calculations::new(self)
    }

    /// Dimension names of arrays read from this dataset, slowest axis first. `time` leads when
    /// there is more than one snapshot.
    ///
    pub fn dims(&self) -> Vec<String> {
        let mut dims = vec![];
        if self.n_timesteps() > 1 {
            dims.push(String::from("time"));
        }
        for axis in Axis::first(self.dimensionality()).iter().rev() {
            dims.push(axis.name().to_string());
        }

        dims
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn n_timesteps(&self) -> usize {
        self.snapshots.len()
    }

    pub fn dimensionality(&self) -> usize {
        self.reference().dimensionality()
    }

    pub fn max_level(&self) -> usize {
        self.reference().max_level()
    }

    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    /// Field names and the identifiers they map to, in insertion order.
    pub fn data_vars(&self) -> IndexMap<String, FieldId> {
        self.data_vars.read().clone()
    }

    pub(crate) fn reference(&self) -> &dyn Snapshot {
        self.snapshots[0].as_ref()
    }

    pub(crate) fn snapshots(&self) -> &[Box<dyn Snapshot>] {
        &self.snapshots
    }

    pub(crate) fn coarsest_grids(&self) -> &[Box<dyn CoveringGrid>] {
        &self.coarsest_grids
    }

    /// Map `name` to `field`, replacing any earlier mapping.
    pub(crate) fn insert_var(&self, name: &str, field: FieldId) {
        self.data_vars.write().insert(name.to_string(), field);
    }

    pub(crate) fn var(&self, name: &str) -> Result<FieldId> {
        self.data_vars
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BadName(name.to_string()))
    }
}

/// A covering grid of the whole domain of `snapshot` at `level`, padded with ghost cells.
///
pub(crate) fn covering_grid(snapshot: &dyn Snapshot, level: usize) -> Result<Box<dyn CoveringGrid>> {
    let ratio = snapshot.refine_by().pow(level as u32);
    let dims: Vec<usize> = snapshot
        .domain_dimensions()
        .iter()
        .map(|d| d * ratio)
        .collect();

    snapshot.covering_grid(level, snapshot.domain_left_edge(), &dims, NUM_GHOST_ZONES)
}
