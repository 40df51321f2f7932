//! Track catalog: one-directory scans and track display labels.

mod display;
mod model;
mod scan;

pub use model::{Catalog, Track};
