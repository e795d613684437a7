// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Colors, bone topologies and an optional result viewer.

/// Color definitions.
pub mod color;

/// Bone topologies.
pub mod skeleton;

#[cfg(feature = "visualize")]
pub mod viewer;

pub use color::Color;
pub use skeleton::{BLAZEPOSE, COCO, Topology};

#[cfg(feature = "visualize")]
pub use viewer::Viewer;
