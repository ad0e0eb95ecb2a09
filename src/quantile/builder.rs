use crate::quantile::bits::{BitSource, ThreadRngBits};
use crate::quantile::criterion::Criterion;
use crate::quantile::observer::{NullObserver, SketchObserver};
use crate::quantile::sketch::ReqSketch;

/// Thin constructor helper collecting the sketch's recognized options
/// before a single `build()` call. Not part of the hard core; a caller
/// who only cares about `k`/`hra` can skip it and use `ReqSketch::new`
/// directly.
pub struct ReqSketchBuilder {
    k: u32,
    hra: bool,
    compatible: bool,
    criterion: Criterion,
    bits: Box<dyn BitSource>,
    observer: Box<dyn SketchObserver>,
}

impl Default for ReqSketchBuilder {
    fn default() -> ReqSketchBuilder {
        ReqSketchBuilder {
            k: 12,
            hra: true,
            compatible: true,
            criterion: Criterion::Lt,
            bits: Box::new(ThreadRngBits),
            observer: Box::new(NullObserver),
        }
    }
}

impl ReqSketchBuilder {
    pub fn new() -> ReqSketchBuilder {
        ReqSketchBuilder::default()
    }

    pub fn k(mut self, k: u32) -> ReqSketchBuilder {
        self.k = k;
        self
    }

    pub fn hra(mut self, hra: bool) -> ReqSketchBuilder {
        self.hra = hra;
        self
    }

    pub fn compatible(mut self, compatible: bool) -> ReqSketchBuilder {
        self.compatible = compatible;
        self
    }

    pub fn criterion(mut self, criterion: Criterion) -> ReqSketchBuilder {
        self.criterion = criterion;
        self
    }

    pub fn bits(mut self, bits: Box<dyn BitSource>) -> ReqSketchBuilder {
        self.bits = bits;
        self
    }

    pub fn observer(mut self, observer: Box<dyn SketchObserver>) -> ReqSketchBuilder {
        self.observer = observer;
        self
    }

    pub fn build(self) -> ReqSketch {
        ReqSketch::with_parts(
            self.k,
            self.hra,
            self.compatible,
            self.criterion,
            self.bits,
            self.observer,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builder_matches_documented_defaults() {
        let s = ReqSketchBuilder::default().build();
        assert_eq!(s.get_k(), 12);
        assert!(s.get_high_rank_accuracy());
        assert!(s.is_compatible());
        assert_eq!(s.get_criterion(), Criterion::Lt);
        assert!(s.is_empty());
        assert_eq!(s.get_n(), 0);
    }

    #[test]
    fn builder_honors_explicit_options() {
        let s = ReqSketchBuilder::new()
            .k(100)
            .hra(false)
            .compatible(false)
            .criterion(Criterion::Ge)
            .build();
        assert!(!s.get_high_rank_accuracy());
    }
}
