//! draw-rs: retained-mode 2D vector drawing core.
//!
//! Sprites are kept as a logical scene and reconciled against an SVG-like
//! element tree behind the [`HostDocument`] trait, writing only what changed.
//! A canvas-style [`DrawingContext`] covers immediate drawing on the same
//! surface, and [`AffineMatrix`] carries the transform algebra both share.

pub mod context;
pub mod core;
pub mod error;
pub mod host;
pub mod surface;
pub mod telemetry;

pub use context::{DrawingContext, GradientHandle, Paint};
pub use core::{AffineMatrix, BBox, Color, ComposeMode, PathModel};
pub use error::{DrawError, DrawResult};
pub use host::{ElementId, HostDocument, MemoryDocument};
pub use surface::{
    GradientDefinition, GradientId, Sprite, SpriteDescriptor, SpriteId, SpriteKind, Surface,
    SurfaceConfig, TransformOp,
};
