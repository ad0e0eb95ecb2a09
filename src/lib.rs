pub mod encode;
pub mod quantile;

pub use crate::quantile::{
    Criterion, NullObserver, ReqSketch, ReqSketchBuilder, SketchError, SketchObserver,
    WeightedItem,
};
