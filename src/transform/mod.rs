//! Coordinate-transform store shared by transform commands.

mod repository;

pub use repository::{
    invert, matrix_from_slice, Matrix4, TransformEntry, TransformName, TransformRepository,
    IDENTITY,
};
