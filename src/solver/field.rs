//! Unknowns on a structured Cartesian grid.
//!
//! An [`Unknown`] owns the interior values of one transported quantity together
//! with six boundary records. Interior arrays are cell-centred or staggered to
//! the faces normal to one axis; staggered arrays own only the interior faces,
//! the two bounding faces are stored in the boundary records.

use ndarray::Array3;

/// Coordinate axis of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn nd(self) -> ndarray::Axis {
        ndarray::Axis(self.index())
    }

    /// The two remaining axes, in ascending order.
    pub fn others(self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::X, Axis::Z],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }
}

/// Boundary faces of the box-shaped domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compass {
    West,
    East,
    South,
    North,
    Bottom,
    Top,
}

impl Compass {
    pub const ALL: [Compass; 6] = [
        Compass::West,
        Compass::East,
        Compass::South,
        Compass::North,
        Compass::Bottom,
        Compass::Top,
    ];

    pub fn index(self) -> usize {
        match self {
            Compass::West => 0,
            Compass::East => 1,
            Compass::South => 2,
            Compass::North => 3,
            Compass::Bottom => 4,
            Compass::Top => 5,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Compass::West | Compass::East => Axis::X,
            Compass::South | Compass::North => Axis::Y,
            Compass::Bottom | Compass::Top => Axis::Z,
        }
    }

    /// West, South and Bottom sit at the low end of their axis.
    pub fn is_low(self) -> bool {
        matches!(self, Compass::West | Compass::South | Compass::Bottom)
    }

    pub fn low(axis: Axis) -> Self {
        match axis {
            Axis::X => Compass::West,
            Axis::Y => Compass::South,
            Axis::Z => Compass::Bottom,
        }
    }

    pub fn high(axis: Axis) -> Self {
        match axis {
            Axis::X => Compass::East,
            Axis::Y => Compass::North,
            Axis::Z => Compass::Top,
        }
    }

    /// Outward normal sign of the face: -1 on low faces, +1 on high faces.
    pub fn outward_sign(self) -> f64 {
        if self.is_low() {
            -1.0
        } else {
            1.0
        }
    }
}

/// Where the values of an unknown live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Cell,
    Face(Axis),
}

impl Position {
    pub fn staggered_axis(self) -> Option<Axis> {
        match self {
            Position::Cell => None,
            Position::Face(axis) => Some(axis),
        }
    }

    pub fn is_staggered_along(self, axis: Axis) -> bool {
        self.staggered_axis() == Some(axis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BcKind {
    Dirichlet,
    Neumann,
    Outlet,
}

/// Boundary condition of one domain face, stored per boundary cell.
///
/// Both arrays have the extent of the interior array with the normal
/// direction collapsed to one.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub kind: Array3<BcKind>,
    pub val: Array3<f64>,
}

impl Boundary {
    pub fn new(shape: [usize; 3], kind: BcKind) -> Self {
        Self {
            kind: Array3::from_elem(shape, kind),
            val: Array3::zeros(shape),
        }
    }

    pub fn set_kind(&mut self, kind: BcKind) {
        self.kind.fill(kind);
    }

    pub fn set_value(&mut self, value: f64) {
        self.val.fill(value);
    }

    pub fn has_kind(&self, kind: BcKind) -> bool {
        self.kind.iter().any(|&k| k == kind)
    }
}

/// Shape of the boundary slab of `res` on face `side`.
pub fn boundary_shape(res: [usize; 3], side: Compass) -> [usize; 3] {
    let mut shape = res;
    shape[side.axis().index()] = 1;
    shape
}

#[derive(Debug, Clone)]
pub struct Unknown {
    pub name: String,
    pub pos: Position,
    pub val: Array3<f64>,
    pub old: Array3<f64>,
    pub bnd: [Boundary; 6],
}

impl Unknown {
    /// Zero-valued unknown with every boundary cell set to `kind`.
    pub fn new(name: impl Into<String>, pos: Position, res: [usize; 3], kind: BcKind) -> Self {
        let bnd = Compass::ALL.map(|side| Boundary::new(boundary_shape(res, side), kind));
        Self {
            name: name.into(),
            pos,
            val: Array3::zeros(res),
            old: Array3::zeros(res),
            bnd,
        }
    }

    pub fn resolution(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.val.dim();
        [nx, ny, nz]
    }

    pub fn bnd(&self, side: Compass) -> &Boundary {
        &self.bnd[side.index()]
    }

    pub fn bnd_mut(&mut self, side: Compass) -> &mut Boundary {
        &mut self.bnd[side.index()]
    }

    pub fn store_old(&mut self) {
        self.old.assign(&self.val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_slabs_match_face_extents() {
        let u = Unknown::new("face-u-vel", Position::Face(Axis::X), [3, 4, 5], BcKind::Dirichlet);
        assert_eq!(u.bnd(Compass::West).val.dim(), (1, 4, 5));
        assert_eq!(u.bnd(Compass::North).val.dim(), (3, 1, 5));
        assert_eq!(u.bnd(Compass::Top).kind.dim(), (3, 4, 1));
        assert_eq!(u.old.dim(), u.val.dim());
    }

    #[test]
    fn boundary_kind_can_be_overridden_per_cell() {
        let mut t = Unknown::new("temperature", Position::Cell, [2, 2, 2], BcKind::Neumann);
        t.bnd_mut(Compass::West).kind[[0, 1, 0]] = BcKind::Dirichlet;
        assert!(t.bnd(Compass::West).has_kind(BcKind::Dirichlet));
        assert!(t.bnd(Compass::West).has_kind(BcKind::Neumann));
        assert!(!t.bnd(Compass::East).has_kind(BcKind::Dirichlet));
    }

    #[test]
    fn compass_sides_map_to_axes() {
        for axis in Axis::ALL {
            assert_eq!(Compass::low(axis).axis(), axis);
            assert_eq!(Compass::high(axis).axis(), axis);
            assert!(Compass::low(axis).is_low());
            assert!(!Compass::high(axis).is_low());
        }
    }
}
