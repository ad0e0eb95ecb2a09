pub mod aux;
pub mod bits;
pub mod builder;
mod buffer;
pub mod cdf;
mod compactor;
pub mod criterion;
pub mod error;
pub mod observer;
pub mod sketch;

pub use crate::quantile::builder::ReqSketchBuilder;
pub use crate::quantile::criterion::Criterion;
pub use crate::quantile::error::SketchError;
pub use crate::quantile::observer::{NullObserver, SketchObserver};
pub use crate::quantile::sketch::{ReqSketch, WeightedItem};
