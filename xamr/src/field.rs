use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Namespaces the engine uses for fields read straight from simulation output.
pub const NATIVE_NAMESPACES: [&str; 2] = ["boxlib", "amrex"];

/// Namespace of the coordinate fields (`x`, `y`, `z`, `grid_level`).
pub const INDEX_NAMESPACE: &str = "index";

/// Identifies a field known to the engine: a namespace plus a name.
///
/// Kept as a named pair so the namespace can't be mistaken for a display name.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId {
    pub namespace: String,
    pub name: String,
}

impl FieldId {
    pub fn new<N: Into<String>, S: Into<String>>(namespace: N, name: S) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn index<S: Into<String>>(name: S) -> Self {
        Self::new(INDEX_NAMESPACE, name)
    }

    pub fn is_native(&self) -> bool {
        NATIVE_NAMESPACES.contains(&self.namespace.as_str())
    }

    /// Identifier of the gradient of this field along `axis`, as produced by
    /// `Snapshot::add_gradient_fields`.
    ///
    pub fn gradient(&self, axis: Axis) -> Self {
        Self::new(
            self.namespace.clone(),
            format!("{}_gradient_{}", self.name, axis),
        )
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "('{}', '{}')", self.namespace, self.name)
    }
}

/// A spatial axis. Snapshot metadata (edges, dimensions) is stored in x, y, z order while arrays
/// are laid out slowest axis first, so z, y, x in 3 dimensions.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of this axis in x, y, z ordered metadata.
    pub fn position(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Array axis for this spatial axis in an array of the given dimensionality.
    pub fn array_axis(self, dimensionality: usize) -> ndarray::Axis {
        ndarray::Axis(dimensionality - 1 - self.position())
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    /// The first `dimensionality` axes, in x, y, z order.
    pub fn first(dimensionality: usize) -> &'static [Axis] {
        &Self::ALL[..dimensionality.min(3)]
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(Error::BadAxis(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native() {
        assert!(FieldId::new("amrex", "density").is_native());
        assert!(FieldId::new("boxlib", "density").is_native());
        assert!(!FieldId::index("x").is_native());
    }

    #[test]
    fn test_gradient_name() {
        let velocity = FieldId::new("boxlib", "x_velocity");
        assert_eq!(
            velocity.gradient(Axis::Y),
            FieldId::new("boxlib", "x_velocity_gradient_y")
        );
    }

    #[test]
    fn test_parse_axis() {
        assert_eq!("x".parse::<Axis>().unwrap(), Axis::X);
        assert_eq!("z".parse::<Axis>().unwrap(), Axis::Z);
        assert!(matches!("w".parse::<Axis>(), Err(Error::BadAxis(_))));
        assert!(matches!("X".parse::<Axis>(), Err(Error::BadAxis(_))));
    }

    #[test]
    fn test_array_axis() {
        assert_eq!(Axis::X.array_axis(3), ndarray::Axis(2));
        assert_eq!(Axis::Z.array_axis(3), ndarray::Axis(0));
        assert_eq!(Axis::X.array_axis(2), ndarray::Axis(1));
        assert_eq!(Axis::Y.array_axis(2), ndarray::Axis(0));
    }
}
