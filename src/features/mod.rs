pub mod compositor;
pub mod document;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod local_store;
pub mod pdf;
pub mod placement;
pub mod raster;
pub mod render;
pub mod storage;
pub mod store;
pub mod transform;
pub mod workspace;
