//! # isam-core
//!
//! This library provides the core abstractions for incremental
//! structure-from-motion smoothing. An estimation problem is posed as a set
//! of [`Factor`]s (probabilistic constraints with a measurement and a noise
//! model) over variables named by [`Symbol`]s, together with a [`Values`]
//! container holding the current value of every variable. The estimator
//! crates consume these types and never need to know where the measurements
//! came from, which keeps drivers pure orchestration.
//!
//! Two categories of variable exist:
//!
//! * [`CameraPose`] - the camera-to-world pose of a camera, updated on the
//!   se(3) tangent chart provided by [`PoseTangent`]
//! * landmark points - plain [`nalgebra::Point3`] positions in world space
//!
//! A symbol permanently belongs to one category. Inserting a landmark value
//! under a pose symbol (or vice versa) is rejected, as is inserting a second
//! value for a symbol that already has one. Both conditions indicate a bug
//! in the caller rather than bad data, so they surface as errors
//! immediately and are never recovered internally.

mod camera;
mod error;
mod factor;
mod graph;
mod noise;
mod pose;
mod so3;
mod symbol;
mod values;

pub use camera::*;
pub use error::*;
pub use factor::*;
pub use graph::*;
pub use nalgebra;
pub use noise::*;
pub use pose::*;
pub use so3::*;
pub use symbol::*;
pub use values::*;
