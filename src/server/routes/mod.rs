//! Route handlers module.

pub mod camera;
pub mod health;
pub mod sensor;
