use std::{
    cell::OnceCell,
    fmt,
    ops::{Range, RangeFrom, RangeFull, RangeTo},
};

use indexmap::IndexMap;
use log::debug;
use ndarray::{ArrayD, ArrayView1, ArrayViewD, Axis as ArrayAxis, IxDyn, Slice, SliceInfoElem};

use crate::{
    dataset::{covering_grid, Dataset},
    engine::{SelectedData, Selection},
    errors::{Error, Result},
    field::{Axis, FieldId},
    geom::Region,
};

/// Half width of the region selected around a single coordinate value, as a fraction of the
/// domain extent along that axis.
pub const POINT_HALF_WIDTH: f64 = 0.01;

/// A lazily loaded view of one field of a dataset.
///
/// Indexing and `values` read uniform grids covering the whole domain. Reductions, `data` and
/// `coords` read the leaf cells of the current selection of the earliest snapshot, through the
/// engine.
///
pub struct DataArray<'a> {
    dataset: &'a Dataset,
    name: String,
    field: FieldId,
    selection: Selection,

    coarsest: OnceCell<Vec<ArrayD<f64>>>,
    data: OnceCell<SelectedData>,
}

impl<'a> DataArray<'a> {
    pub(crate) fn new(dataset: &'a Dataset, name: &str, field: FieldId) -> Self {
        Self::with_selection(dataset, name.to_string(), field, Selection::All)
    }

    fn with_selection(
        dataset: &'a Dataset,
        name: String,
        field: FieldId,
        selection: Selection,
    ) -> Self {
        Self {
            dataset,
            name,
            field,
            selection,
            coarsest: OnceCell::new(),
            data: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self) -> &FieldId {
        &self.field
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn dims(&self) -> Vec<String> {
        self.dataset.dims()
    }

    /// Coarsest level values for every snapshot, read on first use.
    ///
    fn coarsest(&self) -> Result<&Vec<ArrayD<f64>>> {
        if let Some(coarsest) = self.coarsest.get() {
            return Ok(coarsest);
        }

        let values = self
            .dataset
            .snapshots()
            .iter()
            .zip(self.dataset.coarsest_grids())
            .map(|(snapshot, grid)| match grid.read(&self.field) {
                Ok(values) => Ok(values),
                Err(err) => {
                    // Derived fields registered after the dataset was opened
                    debug!("{} not on coarsest grid ({err}), rebuilding grid", self.field);
                    covering_grid(snapshot.as_ref(), 0)
                        .and_then(|grid| grid.read(&self.field))
                        .map_err(|cause| Error::MissingField {
                            field: self.name.clone(),
                            level: None,
                            cause: Some(Box::new(cause)),
                        })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("loaded coarsest values of {}", self.name);

        Ok(self.coarsest.get_or_init(|| values))
    }

    /// Shape of the coarsest level values, with a leading time axis when there is more than
    /// one snapshot.
    ///
    pub fn shape(&self) -> Result<Vec<usize>> {
        let coarsest = self.coarsest()?;
        let mut shape = vec![];
        if coarsest.len() > 1 {
            shape.push(coarsest.len());
        }
        shape.extend_from_slice(coarsest[0].shape());

        Ok(shape)
    }

    /// Index the coarsest level values.
    ///
    /// With more than one snapshot the first key element addresses time and the rest address
    /// space, slowest axis first. Negative indices count from the end; slice bounds are clamped
    /// to the axis.
    ///
    /// ```ignore
    /// let row = density.index(&s![0, 2, ..])?;
    /// ```
    ///
    pub fn index<K>(&self, key: &K) -> Result<ArrayD<f64>>
    where
        K: AsRef<[SliceInfoElem]> + ?Sized,
    {
        let key = key.as_ref();
        let coarsest = self.coarsest()?;
        let dimensionality = self.dataset.dimensionality();

        if coarsest.len() == 1 {
            if key.len() > dimensionality {
                return Err(Error::TooManyIndices {
                    max: dimensionality,
                    given: key.len(),
                });
            }
            return apply_key(coarsest[0].view(), key);
        }

        if key.len() > dimensionality + 1 {
            return Err(Error::TooManyIndices {
                max: dimensionality + 1,
                given: key.len(),
            });
        }
        let (time, space) = match key.split_first() {
            Some((time, space)) => (*time, space),
            None => (SliceInfoElem::from(..), key),
        };

        match time {
            SliceInfoElem::Index(index) => {
                let index = normalize_index(index, coarsest.len())?;
                apply_key(coarsest[index].view(), space)
            }
            _ => {
                let instants: Vec<usize> = (0..coarsest.len()).collect();
                let instants = apply_key(ArrayView1::from(&instants[..]).into_dyn(), &[time])?;
                let arrays = instants
                    .iter()
                    .map(|&i| apply_key(coarsest[i].view(), space))
                    .collect::<Result<Vec<_>>>()?;
                if arrays.is_empty() {
                    let mut shape = vec![0];
                    shape.extend_from_slice(apply_key(coarsest[0].view(), space)?.shape());
                    return Ok(ArrayD::zeros(IxDyn(&shape)));
                }

                // A time slice keeps its axis, even when it picks a single snapshot
                let views: Vec<ArrayViewD<f64>> = arrays.iter().map(|a| a.view()).collect();
                Ok(ndarray::stack(ArrayAxis(0), &views)?)
            }
        }
    }

    /// Values on a uniform grid covering the whole domain at `level` (0 when `None`), stacked
    /// along a leading time axis when there is more than one snapshot.
    ///
    pub fn values(&self, level: Option<i64>) -> Result<ArrayD<f64>> {
        let level = level.unwrap_or(0);
        let max_level = self.dataset.max_level();
        if level < 0 || level > max_level as i64 {
            return Err(Error::BadLevel { level, max_level });
        }
        let level = level as usize;

        if level == 0 {
            return stack(self.coarsest()?);
        }

        let arrays = self
            .dataset
            .snapshots()
            .iter()
            .map(|snapshot| {
                covering_grid(snapshot.as_ref(), level)
                    .and_then(|grid| grid.read(&self.field))
                    .map_err(|cause| Error::MissingField {
                        field: self.name.clone(),
                        level: Some(level),
                        cause: Some(Box::new(cause)),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        stack(&arrays)
    }

    /// Field values of the leaf cells in this array's selection, read once.
    ///
    pub fn data(&self) -> Result<&SelectedData> {
        if let Some(data) = self.data.get() {
            return Ok(data);
        }
        let data = self.dataset.reference().select(&self.selection, &self.field)?;
        debug!("read {} cells of {}", data.len(), self.name);

        Ok(self.data.get_or_init(|| data))
    }

    /// Cell center coordinates and the refinement level of every selected cell.
    ///
    pub fn coords(&self) -> Result<IndexMap<String, Vec<f64>>> {
        let data = self.data()?;
        let mut coords = IndexMap::new();
        for (axis, positions) in Axis::first(self.dataset.dimensionality())
            .iter()
            .zip(&data.positions)
        {
            coords.insert(axis.name().to_string(), positions.clone());
        }
        coords.insert(
            String::from("level"),
            data.levels.iter().map(|l| *l as f64).collect(),
        );

        Ok(coords)
    }

    pub fn max(&self) -> Result<f64> {
        Ok(self.data()?.max())
    }

    pub fn min(&self) -> Result<f64> {
        Ok(self.data()?.min())
    }

    /// Volume weighted mean.
    pub fn mean(&self) -> Result<f64> {
        Ok(self.data()?.mean())
    }

    /// Narrow this array to a box of the domain. Axes without a bound span the whole domain.
    ///
    pub fn spatial_select(&self, bounds: Bounds) -> Result<DataArray<'a>> {
        let attrs = self.dataset.attrs();
        let mut left_edge = vec![];
        let mut right_edge = vec![];
        for &axis in Axis::first(attrs.dimensionality) {
            let position = axis.position();
            let (lo, hi) = (
                attrs.domain_left_edge[position],
                attrs.domain_right_edge[position],
            );
            let (left, right) = match bounds.get(axis) {
                None => (lo, hi),
                Some(AxisBound::Range(start, stop)) => (start.unwrap_or(lo), stop.unwrap_or(hi)),
                Some(AxisBound::Point(value)) => {
                    let delta = POINT_HALF_WIDTH * (hi - lo);
                    (value - delta, value + delta)
                }
            };
            left_edge.push(left);
            right_edge.push(right);
        }
        for axis in &Axis::ALL[attrs.dimensionality..] {
            if bounds.get(*axis).is_some() {
                return Err(Error::BadAxis(axis.name().to_string()));
            }
        }

        let region = Region::new(left_edge, right_edge);
        Ok(self.narrowed(with_region(&self.selection, region)))
    }

    /// Alias of `spatial_select`.
    pub fn sel(&self, bounds: Bounds) -> Result<DataArray<'a>> {
        self.spatial_select(bounds)
    }

    /// Narrow this array to cells at the given refinement levels.
    ///
    pub fn level_select<L: Into<Levels>>(&self, levels: L) -> Result<DataArray<'a>> {
        let Levels(levels) = levels.into();
        let max_level = self.dataset.max_level();
        if let Some(&level) = levels.iter().find(|&&l| l > max_level) {
            return Err(Error::BadLevel {
                level: level as i64,
                max_level,
            });
        }

        Ok(self.narrowed(Selection::Levels {
            base: Box::new(self.selection.clone()),
            levels,
        }))
    }

    fn narrowed(&self, selection: Selection) -> DataArray<'a> {
        Self::with_selection(self.dataset, self.name.clone(), self.field.clone(), selection)
    }
}

impl PartialEq for DataArray<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

impl fmt::Debug for DataArray<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataArray")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("selection", &self.selection)
            .finish()
    }
}

/// Replace the region of `selection`, keeping any level filter.
fn with_region(selection: &Selection, region: Region) -> Selection {
    match selection {
        Selection::Levels { base, levels } => Selection::Levels {
            base: Box::new(with_region(base, region)),
            levels: levels.clone(),
        },
        _ => Selection::Region(region),
    }
}

/// One or more refinement levels, for `DataArray::level_select`.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Levels(pub Vec<usize>);

impl From<usize> for Levels {
    fn from(level: usize) -> Self {
        Self(vec![level])
    }
}

impl From<Vec<usize>> for Levels {
    fn from(levels: Vec<usize>) -> Self {
        Self(levels)
    }
}

impl From<&[usize]> for Levels {
    fn from(levels: &[usize]) -> Self {
        Self(levels.to_vec())
    }
}

/// A bound on one spatial axis for `DataArray::spatial_select`.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisBound {
    /// `[start, stop]`, open ends default to the domain edge
    Range(Option<f64>, Option<f64>),

    /// A thin slab around a coordinate value
    Point(f64),
}

impl From<f64> for AxisBound {
    fn from(value: f64) -> Self {
        Self::Point(value)
    }
}

impl From<Range<f64>> for AxisBound {
    fn from(range: Range<f64>) -> Self {
        Self::Range(Some(range.start), Some(range.end))
    }
}

impl From<RangeFrom<f64>> for AxisBound {
    fn from(range: RangeFrom<f64>) -> Self {
        Self::Range(Some(range.start), None)
    }
}

impl From<RangeTo<f64>> for AxisBound {
    fn from(range: RangeTo<f64>) -> Self {
        Self::Range(None, Some(range.end))
    }
}

impl From<RangeFull> for AxisBound {
    fn from(_: RangeFull) -> Self {
        Self::Range(None, None)
    }
}

/// Per axis bounds for `DataArray::spatial_select`.
///
/// ```ignore
/// let slab = density.sel(Bounds::new().x(0.25..0.5).y(0.75))?;
/// ```
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bounds {
    pub x: Option<AxisBound>,
    pub y: Option<AxisBound>,
    pub z: Option<AxisBound>,
}

impl Bounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn x<B: Into<AxisBound>>(mut self, bound: B) -> Self {
        self.x = Some(bound.into());
        self
    }

    pub fn y<B: Into<AxisBound>>(mut self, bound: B) -> Self {
        self.y = Some(bound.into());
        self
    }

    pub fn z<B: Into<AxisBound>>(mut self, bound: B) -> Self {
        self.z = Some(bound.into());
        self
    }

    pub fn get(&self, axis: Axis) -> Option<AxisBound> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

fn normalize_index(index: isize, len: usize) -> Result<usize> {
    let normalized = if index < 0 {
        index + len as isize
    } else {
        index
    };
    if normalized < 0 || normalized >= len as isize {
        return Err(Error::IndexOutOfBounds { index, len });
    }

    Ok(normalized as usize)
}

/// Clamp slice bounds to an axis of length `len`, the way Python clamps them.
fn clamp_slice(start: isize, end: Option<isize>, step: isize, len: usize) -> Slice {
    let len = len as isize;
    let clamp = |bound: isize| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(0, len)
    };
    let start = clamp(start);
    let end = clamp(end.unwrap_or(len)).max(start);

    Slice::new(start, Some(end), step)
}

/// Apply `key` to `array`, axis by axis. Integer elements remove their axis.
///
fn apply_key<A, K>(array: ArrayViewD<'_, A>, key: &K) -> Result<ArrayD<A>>
where
    A: Clone,
    K: AsRef<[SliceInfoElem]> + ?Sized,
{
    let mut view = array;
    let mut axis = 0;
    for elem in key.as_ref() {
        match *elem {
            SliceInfoElem::Index(index) => {
                let index = normalize_index(index, view.len_of(ArrayAxis(axis)))?;
                view = view.index_axis_move(ArrayAxis(axis), index);
            }
            SliceInfoElem::Slice { start, end, step } => {
                if step == 0 {
                    return Err(Error::BadKey(String::from("slice step cannot be zero")));
                }
                let slice = clamp_slice(start, end, step, view.len_of(ArrayAxis(axis)));
                view.slice_axis_inplace(ArrayAxis(axis), slice);
                axis += 1;
            }
            SliceInfoElem::NewAxis => {
                return Err(Error::BadKey(String::from("new axes are not supported")));
            }
        }
    }

    Ok(view.to_owned())
}

/// Stack per snapshot arrays along a new leading axis. The array of a single snapshot dataset
/// is returned as is.
///
fn stack(arrays: &[ArrayD<f64>]) -> Result<ArrayD<f64>> {
    if arrays.len() == 1 {
        return Ok(arrays[0].clone());
    }
    let views: Vec<ArrayViewD<f64>> = arrays.iter().map(|a| a.view()).collect();

    Ok(ndarray::stack(ArrayAxis(0), &views)?)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ndarray::s;
    use paste::paste;

    use super::*;
    use crate::{
        errors::ErrorKind,
        testing::{engine_with, series, snapshot, snapshot2d},
    };

    fn at(index: isize) -> SliceInfoElem {
        SliceInfoElem::Index(index)
    }

    #[test]
    fn test_apply_key() -> Result<()> {
        let array = ArrayD::from_shape_vec(IxDyn(&[2, 3]), (0..6).collect::<Vec<i32>>())?;

        let row = apply_key(array.view(), &[at(1)])?;
        assert_eq!(row.as_slice().unwrap(), &[3, 4, 5]);

        let last = apply_key(array.view(), &[at(-1), at(-1)])?;
        assert_eq!(last.ndim(), 0);
        assert_eq!(last[IxDyn(&[])], 5);

        let clamped = apply_key(array.view(), &s![.., 1..10])?;
        assert_eq!(clamped.shape(), &[2, 2]);

        let empty = apply_key(array.view(), &s![.., 2..1])?;
        assert_eq!(empty.shape(), &[2, 0]);

        let stepped = apply_key(array.view(), &s![.., ..;2])?;
        assert_eq!(stepped.as_slice().unwrap(), &[0, 2, 3, 5]);

        assert!(matches!(
            apply_key(array.view(), &[at(2)]),
            Err(Error::IndexOutOfBounds { index: 2, len: 2 })
        ));
        assert!(matches!(
            apply_key(array.view(), &[SliceInfoElem::NewAxis]),
            Err(Error::BadKey(_))
        ));

        Ok(())
    }

    #[test]
    fn test_index_single_snapshot() -> Result<()> {
        let (engine, paths) = series(2, &[0.0]);
        let dataset = Dataset::open(&engine, paths)?;
        let velocity = dataset.field("x_velocity")?;

        assert_eq!(velocity.shape()?, vec![8, 8]);

        // x_velocity = x * y at t = 0; row index is y
        let cell = velocity.index(&[at(1), at(2)])?;
        assert_eq!(cell[IxDyn(&[])], 0.3125 * 0.1875);

        let row = velocity.index(&[at(0)])?;
        assert_eq!(row.shape(), &[8]);

        let err = velocity.index(&[at(0), at(0), at(0)]).unwrap_err();
        assert!(matches!(err, Error::TooManyIndices { max: 2, given: 3 }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        Ok(())
    }

    #[test]
    fn test_index_too_many_3d() -> Result<()> {
        let (engine, paths) = series(3, &[0.0]);
        let dataset = Dataset::open(&engine, paths)?;
        let density = dataset.field("density")?;

        let err = density
            .index(&[at(0), at(0), at(0), at(0)])
            .unwrap_err();
        assert!(err.to_string().contains("at most 3"));

        Ok(())
    }

    #[test]
    fn test_index_time_series() -> Result<()> {
        let (engine, paths) = series(2, &[0.0, 1.0, 2.0]);
        let dataset = Dataset::open(&engine, paths)?;
        let velocity = dataset.field("x_velocity")?;

        assert_eq!(velocity.shape()?, vec![3, 8, 8]);

        // x_velocity = x * y + t
        let later = velocity.index(&[at(2), at(0), at(0)])?;
        let first = velocity.index(&[at(0), at(0), at(0)])?;
        assert_eq!(later[IxDyn(&[])] - first[IxDyn(&[])], 2.0);

        let stacked = velocity.index(&s![1.., 0, ..])?;
        assert_eq!(stacked.shape(), &[2, 8]);

        let everything = velocity.index::<[SliceInfoElem]>(&[])?;
        assert_eq!(everything.shape(), &[3, 8, 8]);

        let none = velocity.index(&s![2..1, ..])?;
        assert_eq!(none.shape(), &[0, 8, 8]);

        assert!(matches!(
            velocity.index(&[at(0), at(0), at(0), at(0)]),
            Err(Error::TooManyIndices { max: 3, given: 4 })
        ));

        Ok(())
    }

    #[test]
    fn test_time_slice_keeps_time_axis() -> Result<()> {
        let (engine, paths) = series(2, &[0.0, 1.0]);
        let dataset = Dataset::open(&engine, paths)?;
        let velocity = dataset.field("x_velocity")?;

        let both = velocity.index(&s![0..2, ..])?;
        assert_eq!(both.shape(), &[2, 8, 8]);

        let one = velocity.index(&s![1.., ..])?;
        assert_eq!(one.shape(), &[1, 8, 8]);
        assert_eq!(one.index_axis(ArrayAxis(0), 0), both.index_axis(ArrayAxis(0), 1));

        let row = velocity.index(&s![..1, 3, ..])?;
        assert_eq!(row.shape(), &[1, 8]);

        // An integer time index drops the axis
        let instant = velocity.index(&s![1, ..])?;
        assert_eq!(instant.shape(), &[8, 8]);

        Ok(())
    }

    #[test]
    fn test_values_by_level() -> Result<()> {
        let (engine, paths) = series(2, &[0.0]);
        let dataset = Dataset::open(&engine, paths)?;
        let density = dataset.field("density")?;

        let coarse = density.values(None)?;
        assert_eq!(coarse, density.values(Some(0))?);
        assert_eq!(coarse.shape(), &[8, 8]);

        let fine = density.values(Some(1))?;
        assert_eq!(fine.shape(), &[16, 16]);
        assert!(fine.iter().all(|v| v.is_finite()));

        for level in [-1, 11] {
            let err = density.values(Some(level)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Range);
        }

        Ok(())
    }

    #[test]
    fn test_values_time_series() -> Result<()> {
        let (engine, paths) = series(3, &[0.0, 1.0]);
        let dataset = Dataset::open(&engine, paths)?;
        let velocity = dataset.field("z_velocity")?;

        assert_eq!(velocity.values(None)?.shape(), &[2, 4, 4, 4]);
        assert_eq!(velocity.values(Some(1))?.shape(), &[2, 8, 8, 8]);

        Ok(())
    }

    #[test]
    fn test_missing_field_at_level() -> Result<()> {
        let (engine, paths) = series(2, &[0.0]);
        let dataset = Dataset::open(&engine, paths)?;
        dataset.insert_var("pressure", FieldId::new("boxlib", "pressure"));
        let pressure = dataset.field("pressure")?;

        let err = pressure.values(Some(1)).unwrap_err();
        assert!(matches!(err, Error::MissingField { level: Some(1), .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("pressure"));

        let err = pressure.shape().unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                level: None,
                cause: Some(_),
                ..
            }
        ));

        Ok(())
    }

    #[test]
    fn test_reductions_use_all_levels() -> Result<()> {
        let engine = engine_with(vec![(PathBuf::from("plt00000"), snapshot2d(0.0))]);
        let dataset = Dataset::open(&engine, "plt00000")?;
        let velocity = dataset.field("y_velocity")?;

        // y_velocity = x - 2y, extreme at the corners of the finest cells
        assert_eq!(velocity.max()?, 0.9375 - 2.0 * 0.0625);
        assert_eq!(velocity.min()?, 0.0625 - 2.0 * 0.9375);
        assert!((velocity.mean()? - (0.5 - 1.0)).abs() < 1e-12);

        let data = velocity.data()?;
        assert_eq!(data.len(), 48 + 64);

        Ok(())
    }

    #[test]
    fn test_spatial_select() -> Result<()> {
        let (engine, paths) = series(2, &[0.0]);
        let dataset = Dataset::open(&engine, paths)?;
        let density = dataset.field("density")?;

        let lower_left = density.spatial_select(Bounds::new().x(..0.5).y(..0.5))?;
        assert_eq!(lower_left.field(), density.field());
        assert_eq!(lower_left.data()?.len(), 16);
        assert!(lower_left.data()?.levels.iter().all(|l| *l == 0));

        let slab = density.sel(Bounds::new().y(0.5625))?;
        let coords = slab.coords()?;
        assert_eq!(coords.keys().collect::<Vec<_>>(), vec!["x", "y", "level"]);
        assert!(coords["y"].iter().all(|y| (y - 0.5625).abs() <= 0.01));
        assert!(!coords["y"].is_empty());

        assert!(matches!(
            density.sel(Bounds::new().z(0.5)),
            Err(Error::BadAxis(_))
        ));

        Ok(())
    }

    #[test]
    fn test_level_select() -> Result<()> {
        let (engine, paths) = series(2, &[0.0]);
        let dataset = Dataset::open(&engine, paths)?;
        let density = dataset.field("density")?;

        let finest = density.level_select(1)?;
        assert_eq!(finest.data()?.len(), 64);
        assert!(finest.data()?.levels.iter().all(|l| *l == 1));

        let both = density.level_select(vec![0, 1])?;
        assert_eq!(both.data()?.len(), density.data()?.len());

        let narrowed = finest.sel(Bounds::new().x(..0.5))?;
        assert!(narrowed.data()?.is_empty());

        assert_eq!(density.level_select(2).unwrap_err().kind(), ErrorKind::Range);

        Ok(())
    }

    macro_rules! array_tests {
        ($dim:literal) => {
            paste! {
                #[test]
                fn [<test_shapes_grow_with_level_ $dim d>]() -> Result<()> {
                    let (engine, paths) = series($dim, &[0.0]);
                    let dataset = Dataset::open(&engine, paths)?;
                    let density = dataset.field("density")?;

                    let mut last = 0;
                    for level in dataset.levels() {
                        let values = density.values(Some(level as i64))?;
                        assert!(values.iter().all(|v| v.is_finite()));
                        assert!(values.len() >= last);
                        last = values.len();
                    }

                    Ok(())
                }

                #[test]
                fn [<test_coords_field_ $dim d>]() -> Result<()> {
                    let (engine, paths) = series($dim, &[0.0]);
                    let dataset = Dataset::open(&engine, paths)?;
                    let x = dataset.field("x")?;

                    let expected = snapshot($dim, 0.0).domain_dimensions[0];
                    assert_eq!(x.shape()?, vec![expected; $dim]);
                    assert_eq!(x.values(None)?, dataset.coords().axis(Axis::X).unwrap().clone());
                    assert_eq!(x.dims(), dataset.dims());

                    Ok(())
                }
            }
        };
    }

    array_tests!(2);
    array_tests!(3);
}
