pub mod color;
pub mod matrix;
pub mod path;
pub mod types;

pub use color::Color;
pub use matrix::{AffineMatrix, ComposeMode, MatrixComponents};
pub use path::{PathCommand, PathModel};
pub use types::BBox;
