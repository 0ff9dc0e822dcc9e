//! An engine that keeps block structured AMR data in memory.
//!
//! Useful for tests and for data produced in process. Snapshots are either registered up front
//! with `MemoryEngine::insert` or read from JSON documents on disk (see `AmrSnapshot::save`).

mod amr;
mod grid;

pub use amr::{AmrSnapshot, Patch};
pub use grid::MemoryGrid;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use crate::{
    engine::{CoveringGrid, Engine, FieldReader, Parameters, Recipe, SelectedData, Selection, Snapshot},
    errors::{Error, Result},
    field::{Axis, FieldId},
    geom::{IndexBox, Region},
};

use grid::{gradient_recipe, Block, Registry};

/// Namespace the in-memory engine reports stored fields under.
pub const NAMESPACE: &str = "boxlib";

/// An `Engine` serving in-memory snapshots.
///
pub struct MemoryEngine {
    sources: Mutex<HashMap<PathBuf, Arc<AmrSnapshot>>>,
    loads: Mutex<Vec<PathBuf>>,
    registrations: Arc<AtomicUsize>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            sources: Mutex::new(HashMap::new()),
            loads: Mutex::new(vec![]),
            registrations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a snapshot to be served for `source`.
    pub fn insert<P: Into<PathBuf>>(&self, source: P, snapshot: AmrSnapshot) -> Result<()> {
        snapshot.validate()?;
        self.sources.lock().insert(source.into(), Arc::new(snapshot));

        Ok(())
    }

    /// Sources loaded so far, in the order they were loaded.
    pub fn loads(&self) -> Vec<PathBuf> {
        self.loads.lock().clone()
    }

    /// Derived field registrations made so far, across every snapshot this engine loaded.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MemoryEngine {
    fn load(&self, source: &Path) -> Result<Box<dyn Snapshot>> {
        let registered = self.sources.lock().get(source).cloned();
        let data = match registered {
            Some(data) => data,
            None => Arc::new(AmrSnapshot::load(source)?),
        };
        self.loads.lock().push(source.to_path_buf());
        debug!("loaded {} at t={}", source.display(), data.time);

        Ok(Box::new(MemorySnapshot {
            data,
            derived: RwLock::new(Registry::new()),
            registrations: Arc::clone(&self.registrations),
        }))
    }
}

/// A loaded in-memory snapshot and its derived field registry.
///
pub struct MemorySnapshot {
    data: Arc<AmrSnapshot>,
    derived: RwLock<Registry>,
    registrations: Arc<AtomicUsize>,
}

impl MemorySnapshot {
    pub fn new(data: Arc<AmrSnapshot>) -> Self {
        Self {
            data,
            derived: RwLock::new(Registry::new()),
            registrations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of calls to `add_field` and `add_gradient_fields` so far. Snapshots loaded by the
    /// same `MemoryEngine` share one count.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    fn registry(&self) -> Arc<Registry> {
        Arc::new(self.derived.read().clone())
    }

    fn block(&self, registry: &Arc<Registry>, level: usize, bounds: IndexBox) -> Block {
        Block::new(Arc::clone(&self.data), Arc::clone(registry), level, bounds)
    }
}

/// Flatten a selection into an optional region and an optional set of levels.
fn resolve(selection: &Selection) -> (Option<&Region>, Option<Vec<usize>>) {
    match selection {
        Selection::All => (None, None),
        Selection::Region(region) => (Some(region), None),
        Selection::Levels { base, levels } => {
            let (region, inner) = resolve(base);
            let levels = match inner {
                Some(inner) => levels.iter().copied().filter(|l| inner.contains(l)).collect(),
                None => levels.clone(),
            };
            (region, Some(levels))
        }
    }
}

impl Snapshot for MemorySnapshot {
    fn current_time(&self) -> f64 {
        self.data.time
    }

    fn dimensionality(&self) -> usize {
        self.data.dimensionality()
    }

    fn max_level(&self) -> usize {
        self.data.max_level()
    }

    fn refine_by(&self) -> usize {
        self.data.refine_by
    }

    fn domain_left_edge(&self) -> &[f64] {
        &self.data.domain_left_edge
    }

    fn domain_right_edge(&self) -> &[f64] {
        &self.data.domain_right_edge
    }

    fn domain_dimensions(&self) -> &[usize] {
        &self.data.domain_dimensions
    }

    fn field_list(&self) -> Vec<FieldId> {
        self.data
            .field_names()
            .into_iter()
            .map(|name| FieldId::new(NAMESPACE, name))
            .collect()
    }

    fn parameters(&self) -> &Parameters {
        &self.data.parameters
    }

    fn covering_grid(
        &self,
        level: usize,
        left_edge: &[f64],
        dims: &[usize],
        num_ghost_zones: usize,
    ) -> Result<Box<dyn CoveringGrid>> {
        if dims.len() != self.dimensionality() || left_edge.len() != self.dimensionality() {
            return Err(Error::Engine(format!(
                "covering grid must have {} dimensions",
                self.dimensionality()
            )));
        }
        let lo = self.data.index_of(level, left_edge);
        let bounds = IndexBox::with_dims(&lo, dims).extend_all(num_ghost_zones as i64);
        trace!("covering grid at level {level}: {bounds:?}");
        let block = self.block(&self.registry(), level, bounds);

        Ok(Box::new(MemoryGrid::new(block, num_ghost_zones)))
    }

    fn select(&self, selection: &Selection, field: &FieldId) -> Result<SelectedData> {
        let (region, levels) = resolve(selection);
        let registry = self.registry();
        let rank = self.dimensionality();
        let mut selected = SelectedData {
            positions: vec![vec![]; rank],
            ..Default::default()
        };

        for patch in &self.data.patches {
            if let Some(levels) = &levels {
                if !levels.contains(&patch.level) {
                    continue;
                }
            }

            let patch_box = patch.index_box();
            let block = self.block(&registry, patch.level, patch_box.extend_all(1));
            let values = block.read(field)?;
            let volume = self.data.cell_volume(patch.level);

            for index in patch_box.iter() {
                if self.data.is_covered(patch.level, &index) {
                    continue;
                }
                let center = self.data.cell_center(patch.level, &index);
                if let Some(region) = region {
                    if !region.contains(&center) {
                        continue;
                    }
                }

                // Array index is slowest axis first, relative to the block
                let at: Vec<usize> = index
                    .iter()
                    .zip(&block.bounds().lo)
                    .rev()
                    .map(|(i, lo)| (i - lo) as usize)
                    .collect();
                selected.values.push(values[at.as_slice()]);
                selected.volumes.push(volume);
                selected.levels.push(patch.level);
                for (position, coordinate) in center.into_iter().enumerate() {
                    selected.positions[position].push(coordinate);
                }
            }
        }

        Ok(selected)
    }

    fn derived_field_list(&self) -> Vec<FieldId> {
        self.derived.read().keys().cloned().collect()
    }

    fn add_field(&self, field: FieldId, recipe: Recipe) -> Result<()> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        debug!("registering derived field {field}");
        self.derived.write().insert(field, recipe);

        Ok(())
    }

    fn add_gradient_fields(&self, base: &FieldId) -> Result<Vec<FieldId>> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let mut derived = self.derived.write();
        let fields = Axis::first(self.dimensionality())
            .iter()
            .map(|&axis| {
                let field = base.gradient(axis);
                derived.insert(field.clone(), gradient_recipe(base.clone(), axis));
                field
            })
            .collect::<Vec<_>>();
        debug!("registered gradient fields of {base}");

        Ok(fields)
    }
}
