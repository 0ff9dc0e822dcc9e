use super::helpers::rearrange;

/// A box in the discrete index space of one refinement level.
///
/// Bounds are stored per spatial axis in x, y, z order, `lo` inclusive and `hi` exclusive.
/// Arrays backing a box are laid out slowest axis first, see `shape`.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexBox {
    pub lo: Vec<i64>,
    pub hi: Vec<i64>,
    _private: (),
}

impl IndexBox {
    pub fn new(lo: Vec<i64>, hi: Vec<i64>) -> Self {
        assert_eq!(lo.len(), hi.len(), "index box bounds differ in rank");
        let (lo, hi) = lo
            .into_iter()
            .zip(hi)
            .map(|(lo, hi)| rearrange(lo, hi))
            .unzip();

        Self { lo, hi, _private: () }
    }

    /// Box starting at `lo` with `dims` cells along each axis.
    pub fn with_dims(lo: &[i64], dims: &[usize]) -> Self {
        let hi = lo.iter().zip(dims).map(|(l, d)| l + *d as i64).collect();
        Self::new(lo.to_vec(), hi)
    }

    pub fn rank(&self) -> usize {
        self.lo.len()
    }

    /// Number of cells along each axis, x, y, z order.
    pub fn dims(&self) -> Vec<usize> {
        self.lo
            .iter()
            .zip(&self.hi)
            .map(|(lo, hi)| (hi - lo) as usize)
            .collect()
    }

    /// Shape of an array backing this box, slowest axis first.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = self.dims();
        shape.reverse();

        shape
    }

    pub fn len(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: &[i64]) -> bool {
        self.lo
            .iter()
            .zip(&self.hi)
            .zip(index)
            .all(|((lo, hi), i)| lo <= i && i < hi)
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.lo
            .iter()
            .zip(&self.hi)
            .zip(other.lo.iter().zip(&other.hi))
            .all(|((lo0, hi0), (lo1, hi1))| lo0.max(lo1) < hi0.min(hi1))
    }

    /// Grow the box by `delta` cells on every side.
    pub fn extend_all(&self, delta: i64) -> Self {
        Self::new(
            self.lo.iter().map(|lo| lo - delta).collect(),
            self.hi.iter().map(|hi| hi + delta).collect(),
        )
    }

    /// The same region of space in the index space `factor` times finer.
    pub fn refine(&self, factor: i64) -> Self {
        Self::new(
            self.lo.iter().map(|lo| lo * factor).collect(),
            self.hi.iter().map(|hi| hi * factor).collect(),
        )
    }

    /// Row-major offset of `index` in an array backing this box.
    pub fn offset(&self, index: &[i64]) -> usize {
        let dims = self.dims();
        let mut offset = 0;
        for axis in (0..self.rank()).rev() {
            offset = offset * dims[axis] + (index[axis] - self.lo[axis]) as usize;
        }

        offset
    }

    /// Iterate over the indexes in this box, in the order of a row-major backing array.
    pub fn iter(&self) -> IndexBoxIter {
        IndexBoxIter {
            next: if self.is_empty() {
                None
            } else {
                Some(self.lo.clone())
            },
            lo: self.lo.clone(),
            hi: self.hi.clone(),
        }
    }
}

pub struct IndexBoxIter {
    next: Option<Vec<i64>>,
    lo: Vec<i64>,
    hi: Vec<i64>,
}

impl Iterator for IndexBoxIter {
    type Item = Vec<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        // x is the fastest varying axis
        let mut index = current.clone();
        for axis in 0..index.len() {
            index[axis] += 1;
            if index[axis] < self.hi[axis] {
                self.next = Some(index);
                break;
            }
            index[axis] = self.lo[axis];
        }

        Some(current)
    }
}

/// An axis aligned box in physical space.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub left_edge: Vec<f64>,
    pub right_edge: Vec<f64>,
    _private: (),
}

impl Region {
    pub fn new(left_edge: Vec<f64>, right_edge: Vec<f64>) -> Self {
        assert_eq!(
            left_edge.len(),
            right_edge.len(),
            "region edges differ in rank"
        );
        let (left_edge, right_edge) = left_edge
            .into_iter()
            .zip(right_edge)
            .map(|(left, right)| rearrange(left, right))
            .unzip();

        Self {
            left_edge,
            right_edge,
            _private: (),
        }
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        self.left_edge
            .iter()
            .zip(&self.right_edge)
            .zip(point)
            .all(|((left, right), p)| left <= p && p <= right)
    }
}
