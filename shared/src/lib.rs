//! Types shared between the bowling server and its renderers.

pub mod params;
pub mod protocol;
pub mod vec3;
