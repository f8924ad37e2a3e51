use glam::Vec3;
use std::ops::Neg;

/// Which side of a plane a point lies on, relative to the plane normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Back,
    On,
    Front,
}

impl Side {
    /// Sign of a scalar. NaN maps to `On`.
    pub fn of(value: f32) -> Self {
        if value > 0.0 {
            Self::Front
        } else if value < 0.0 {
            Self::Back
        } else {
            Self::On
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            Self::Back => -1.0,
            Self::On => 0.0,
            Self::Front => 1.0,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Back => -1,
            Self::On => 0,
            Self::Front => 1,
        }
    }
}

impl Neg for Side {
    type Output = Self;

    fn neg(self) -> Self {
        match self {
            Self::Back => Self::Front,
            Self::On => Self::On,
            Self::Front => Self::Back,
        }
    }
}

/// Sign of `(point - plane_origin) · plane_normal`.
///
/// A point exactly on the plane reports `Side::On`. Callers compare against a
/// previous side rather than special-casing it.
pub fn side_of_plane(point: Vec3, plane_origin: Vec3, plane_normal: Vec3) -> Side {
    Side::of((point - plane_origin).dot(plane_normal))
}

pub fn same_side(a: Vec3, b: Vec3, plane_origin: Vec3, plane_normal: Vec3) -> bool {
    side_of_plane(a, plane_origin, plane_normal) == side_of_plane(b, plane_origin, plane_normal)
}
