//! Slice generated multi-panel composites into individual images, paint mask
//! overlays on any one of them, and flatten the result into a new record.
//!
//! Flow: [`generation::generate_panels`] → [`grid`] tiles → [`editor::Editor`]
//! (pointer events mapped by [`coords`] into a [`paint::PaintSession`]) →
//! [`compositor`] → [`artifact::ArtifactSink`].

pub mod logger;

pub mod artifact;
pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod coords;
pub mod editor;
pub mod error;
pub mod generation;
pub mod grid;
pub mod io;
pub mod paint;
pub mod raster;

pub use error::{EditorError, Result};
pub use raster::RasterImage;
