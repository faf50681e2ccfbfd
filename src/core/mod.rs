//! Core primitives.
//!
//! Vector math, hit-test geometry and the deterministic RNG shared by the
//! simulation and the AI layers. Nothing in here touches world state.

pub mod vec3;
pub mod geometry;
pub mod rng;

// Re-export core types
pub use vec3::Vec3;
pub use rng::DeterministicRng;
pub use geometry::{check_cone_collision, check_line_collision, check_radius_collision};
