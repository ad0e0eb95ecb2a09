use crate::encode::{Decodable, DecodeError, Encodable};
use crate::quantile::aux::AuxiliaryView;
use crate::quantile::bits::{BitSource, ThreadRngBits};
use crate::quantile::cdf;
use crate::quantile::compactor::{Compactor, INIT_NUM_SECTIONS, MIN_K};
use crate::quantile::criterion::Criterion;
use crate::quantile::error::SketchError;
use crate::quantile::observer::{NullObserver, SketchObserver};

const PREAMBLE_LONGS: u8 = 1;
const SER_VER: u8 = 1;
const FAMILY_ID: u8 = 17;

const FLAG_EMPTY: u8 = 1 << 2;
const FLAG_HRA: u8 = 1 << 3;
const FLAG_COMPATIBLE: u8 = 1 << 4;
const FLAG_CRITERION_LE: u8 = 1 << 5;

/// Upper bound on a decoded `num_compactors`, checked before any
/// allocation sized by it. `lg_weight` is stored as a `u8`, so a sketch
/// can never legitimately have more levels than that can address;
/// `total_n` would have overflowed long before a real sketch grew this
/// tall regardless.
const MAX_COMPACTORS: u32 = 256;

/// A pair yielded by [`ReqSketch::iter`]: a retained value and the number
/// of stream items it represents (`2^lg_weight`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WeightedItem {
    pub value: f32,
    pub weight: u64,
}

/// A relative-error quantile sketch backed by a hierarchical stack of
/// [`Compactor`]s, one per weight class.
///
/// Follows the teacher's `KllSketch` in spirit — a growable, owned sequence
/// of per-level compactors indexed by level, with lazily rebuilt query
/// structures invalidated on mutation — but drives the capacity schedule
/// and halving strategy described for a sectioned, HRA-oriented sketch
/// rather than the teacher's fixed per-depth KLL capacity table.
pub struct ReqSketch {
    k: u32,
    hra: bool,
    criterion: Criterion,
    compatible: bool,
    total_n: u64,
    min_value: f32,
    max_value: f32,
    retained: usize,
    max_nominal_size: usize,
    compactors: Vec<Compactor>,
    aux: Option<AuxiliaryView>,
    bits: Box<dyn BitSource>,
    observer: Box<dyn SketchObserver>,
}

impl ReqSketch {
    /// Constructs an empty sketch with one level-0 compactor.
    ///
    /// Prefer [`crate::quantile::builder::ReqSketchBuilder`] for anything
    /// beyond the defaults; this constructor exists for callers who only
    /// ever need `k`/`hra`.
    pub fn new(k: u32, hra: bool) -> ReqSketch {
        ReqSketch::with_parts(
            k,
            hra,
            true,
            Criterion::Lt,
            Box::new(ThreadRngBits),
            Box::new(NullObserver),
        )
    }

    pub(crate) fn with_parts(
        k: u32,
        hra: bool,
        compatible: bool,
        criterion: Criterion,
        bits: Box<dyn BitSource>,
        observer: Box<dyn SketchObserver>,
    ) -> ReqSketch {
        let k = normalize_k(k);
        observer.on_start(k, hra);
        let compactor = Compactor::new(0, hra, k);
        let mut sketch = ReqSketch {
            k,
            hra,
            criterion,
            compatible,
            total_n: 0,
            min_value: f32::INFINITY,
            max_value: f32::NEG_INFINITY,
            retained: 0,
            max_nominal_size: 0,
            compactors: vec![compactor],
            aux: None,
            bits,
            observer,
        };
        sketch.recompute_max_nominal_size();
        sketch
    }

    pub fn update(&mut self, value: f32) {
        if value.is_nan() {
            return;
        }
        if value < self.min_value {
            self.min_value = value;
        }
        if value > self.max_value {
            self.max_value = value;
        }
        self.compactors[0].buffer_mut().append(value);
        self.retained += 1;
        self.total_n += 1;
        if self.retained >= self.max_nominal_size {
            self.compactors[0].buffer_mut().sort();
            self.compress();
            debug_assert!(self.retained < self.max_nominal_size);
        }
        self.aux = None;
    }

    /// Merges `other` into `self`, returning `self` for chaining.
    pub fn merge(mut self, other: ReqSketch) -> ReqSketch {
        if other.total_n == 0 {
            return self;
        }
        self.total_n += other.total_n;
        self.min_value = self.min_value.min(other.min_value);
        self.max_value = self.max_value.max(other.max_value);

        while self.compactors.len() < other.compactors.len() {
            self.grow();
        }
        for (level, other_compactor) in other.compactors.into_iter().enumerate() {
            self.compactors[level].merge(other_compactor);
        }

        self.recompute_max_nominal_size();
        self.recompute_retained();
        while self.retained >= self.max_nominal_size {
            self.compress();
            self.recompute_max_nominal_size();
            self.recompute_retained();
        }
        debug_assert!(self.retained < self.max_nominal_size);
        self.aux = None;
        self
    }

    /// Clears the stack back to one empty level, returning `self`.
    pub fn reset(mut self) -> ReqSketch {
        let k = self.k;
        let hra = self.hra;
        self.compactors = vec![Compactor::new(0, hra, k)];
        self.total_n = 0;
        self.min_value = f32::INFINITY;
        self.max_value = f32::NEG_INFINITY;
        self.retained = 0;
        self.aux = None;
        self.recompute_max_nominal_size();
        self
    }

    fn grow(&mut self) {
        let level = self.compactors.len() as u8;
        self.compactors.push(Compactor::new(level, self.hra, self.k));
        self.observer.on_new_compactor(level);
        self.recompute_max_nominal_size();
    }

    fn compress(&mut self) {
        self.observer
            .on_compress_start(self.retained, self.max_nominal_size);
        log::trace!(
            "compress start: retained={} max_nominal_size={}",
            self.retained,
            self.max_nominal_size
        );

        let mut h = 0;
        while h < self.compactors.len() {
            if self.compactors[h].is_overflowing() {
                if h + 1 == self.compactors.len() {
                    self.observer.on_must_add_compactor(h as u8 + 1);
                    self.grow();
                }
                let (lower, upper) = self.compactors.split_at_mut(h + 1);
                let promoted = lower[h].compact(self.bits.as_mut());
                upper[0].buffer_mut().merge_sort_in(promoted.as_slice());
                self.recompute_retained();
                if self.retained < self.max_nominal_size {
                    break;
                }
            }
            h += 1;
        }
        self.recompute_max_nominal_size();
        self.aux = None;
        self.observer.on_compress_done(self.retained);
        log::trace!("compress done: retained={}", self.retained);
    }

    fn recompute_retained(&mut self) {
        self.retained = self.compactors.iter().map(|c| c.len()).sum();
    }

    fn recompute_max_nominal_size(&mut self) {
        self.max_nominal_size = self.compactors.iter().map(|c| c.nom_capacity()).sum();
    }

    fn ensure_sorted(&mut self) {
        self.compactors[0].buffer_mut().sort();
    }

    fn ensure_aux(&mut self) {
        self.ensure_sorted();
        if self.aux.is_none() {
            self.aux = Some(AuxiliaryView::build(
                self.compactors
                    .iter()
                    .map(|c| (c.lg_weight(), c.buffer().as_slice())),
                self.total_n,
            ));
        }
    }

    fn count_with_criterion(&mut self, v: f32, crit: Criterion) -> u64 {
        self.ensure_sorted();
        let lower = crit.complementary_lower();
        let count_lower: u64 = self
            .compactors
            .iter()
            .map(|c| (1u64 << c.lg_weight()) * c.buffer().count_with_criterion(v, lower))
            .sum();
        if crit.is_lower() {
            count_lower
        } else {
            self.total_n - count_lower
        }
    }

    pub fn get_rank(&mut self, v: f32) -> f64 {
        if self.total_n == 0 {
            return 0.0;
        }
        let criterion = self.criterion;
        self.count_with_criterion(v, criterion) as f64 / self.total_n as f64
    }

    pub fn get_ranks(&mut self, values: &[f32]) -> Vec<f64> {
        values.iter().map(|&v| self.get_rank(v)).collect()
    }

    pub fn get_quantile(&mut self, r: f64) -> Result<f32, SketchError> {
        if self.is_empty() {
            return Err(SketchError::EmptySketch);
        }
        if !(0.0..=1.0).contains(&r) {
            return Err(SketchError::RankOutOfRange(r));
        }
        self.ensure_aux();
        let criterion = self.criterion;
        let view = self.aux.as_ref().expect("auxiliary view just built");
        match view.quantile(r, criterion) {
            Some(v) => Ok(v),
            None if self.compatible => {
                if criterion.is_lower() {
                    Ok(self.min_value)
                } else {
                    Ok(self.max_value)
                }
            }
            None => Ok(f32::NAN),
        }
    }

    pub fn get_quantiles(&mut self, ranks: &[f64]) -> Result<Vec<f32>, SketchError> {
        ranks.iter().map(|&r| self.get_quantile(r)).collect()
    }

    pub fn get_cdf(&mut self, split_points: &[f32]) -> Result<Vec<f64>, SketchError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let criterion = self.criterion;
        let total_n = self.total_n;
        cdf::cdf(split_points, criterion, total_n, |v, c| {
            self.count_with_criterion(v, c)
        })
    }

    pub fn get_pmf(&mut self, split_points: &[f32]) -> Result<Vec<f64>, SketchError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let criterion = self.criterion;
        let total_n = self.total_n;
        cdf::pmf(split_points, criterion, total_n, |v, c| {
            self.count_with_criterion(v, c)
        })
    }

    pub fn get_rank_lower_bound(&self, rank: f64, num_std_dev: u8) -> f64 {
        self.rank_bound(rank, num_std_dev, true)
    }

    pub fn get_rank_upper_bound(&self, rank: f64, num_std_dev: u8) -> f64 {
        self.rank_bound(rank, num_std_dev, false)
    }

    fn rank_bound(&self, rank: f64, num_std_dev: u8, lower: bool) -> f64 {
        let l = self.compactors.len();
        if l <= 1 || self.total_n == 0 {
            return rank;
        }
        let n = self.total_n as f64;
        let k = self.k as f64;
        let s = num_std_dev as f64;
        let t = k * INIT_NUM_SECTIONS as f64 / n;
        let in_priority_tail = if self.hra {
            rank >= 1.0 - t
        } else {
            rank <= t
        };
        if in_priority_tail {
            return rank;
        }
        let rel = (0.0512 / INIT_NUM_SECTIONS as f64).sqrt() / k
            * (if self.hra { 1.0 - rank } else { rank });
        let fix = 0.06 / k;
        if lower {
            (rank - s * rel).max(rank - s * fix)
        } else {
            (rank + s * rel).min(rank + s * fix)
        }
    }

    pub fn get_n(&self) -> u64 {
        self.total_n
    }

    pub fn get_retained_items(&self) -> i32 {
        self.retained as i32
    }

    pub fn get_min_value(&self) -> f32 {
        self.min_value
    }

    pub fn get_max_value(&self) -> f32 {
        self.max_value
    }

    pub fn is_empty(&self) -> bool {
        self.total_n == 0
    }

    pub fn is_estimation_mode(&self) -> bool {
        self.compactors.len() > 1
    }

    pub fn get_high_rank_accuracy(&self) -> bool {
        self.hra
    }

    pub fn get_k(&self) -> u32 {
        self.k
    }

    pub fn get_criterion(&self) -> Criterion {
        self.criterion
    }

    pub fn is_compatible(&self) -> bool {
        self.compatible
    }

    pub fn set_criterion(mut self, criterion: Criterion) -> ReqSketch {
        self.criterion = criterion;
        self
    }

    pub fn set_compatible(mut self, compatible: bool) -> ReqSketch {
        self.compatible = compatible;
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = WeightedItem> + '_ {
        self.compactors.iter().flat_map(|c| {
            let weight = 1u64 << c.lg_weight();
            c.buffer().iter().map(move |&value| WeightedItem { value, weight })
        })
    }

    pub fn to_byte_array(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        PREAMBLE_LONGS.encode(&mut buf).expect("encoding to Vec<u8> cannot fail");
        SER_VER.encode(&mut buf).expect("encoding to Vec<u8> cannot fail");
        FAMILY_ID.encode(&mut buf).expect("encoding to Vec<u8> cannot fail");

        let mut flags = 0u8;
        if self.is_empty() {
            flags |= FLAG_EMPTY;
        }
        if self.hra {
            flags |= FLAG_HRA;
        }
        if self.compatible {
            flags |= FLAG_COMPATIBLE;
        }
        if self.criterion.is_le_flag() {
            flags |= FLAG_CRITERION_LE;
        }
        flags.encode(&mut buf).expect("encoding to Vec<u8> cannot fail");

        self.k.encode(&mut buf).expect("encoding to Vec<u8> cannot fail");
        self.total_n.encode(&mut buf).expect("encoding to Vec<u8> cannot fail");
        self.min_value.encode(&mut buf).expect("encoding to Vec<u8> cannot fail");
        self.max_value.encode(&mut buf).expect("encoding to Vec<u8> cannot fail");
        (self.compactors.len() as u32)
            .encode(&mut buf)
            .expect("encoding to Vec<u8> cannot fail");

        for c in &self.compactors {
            let mut cbuf = Vec::new();
            c.encode(&mut cbuf).expect("encoding to Vec<u8> cannot fail");
            (cbuf.len() as u32)
                .encode(&mut buf)
                .expect("encoding to Vec<u8> cannot fail");
            buf.extend_from_slice(&cbuf);
        }

        self.observer.on_serialize(self.compactors.len(), buf.len());
        buf
    }

    pub fn heapify(bytes: &[u8]) -> Result<ReqSketch, DecodeError> {
        let mut reader = bytes;
        let preamble_longs = u8::decode(&mut reader)?;
        let ser_ver = u8::decode(&mut reader)?;
        let family_id = u8::decode(&mut reader)?;
        if preamble_longs != PREAMBLE_LONGS || ser_ver != SER_VER || family_id != FAMILY_ID {
            log::debug!(
                "heapify rejected sketch: preamble_longs={} ser_ver={} family_id={}",
                preamble_longs,
                ser_ver,
                family_id
            );
            return Err(DecodeError::BadHeader("unexpected sketch preamble"));
        }

        let flags = u8::decode(&mut reader)?;
        let hra = flags & FLAG_HRA != 0;
        let compatible = flags & FLAG_COMPATIBLE != 0;
        let criterion = Criterion::from_le_flag(flags & FLAG_CRITERION_LE != 0);
        let empty = flags & FLAG_EMPTY != 0;

        let k = u32::decode(&mut reader)?;
        let total_n = u64::decode(&mut reader)?;
        let min_value = f32::decode(&mut reader)?;
        let max_value = f32::decode(&mut reader)?;
        let num_compactors = u32::decode(&mut reader)?;

        if !empty && num_compactors == 0 {
            return Err(DecodeError::BadCompactorCount(
                "non-empty sketch must have at least one compactor",
            ));
        }
        if num_compactors > MAX_COMPACTORS {
            log::debug!(
                "heapify rejected sketch: num_compactors={} exceeds {}",
                num_compactors,
                MAX_COMPACTORS
            );
            return Err(DecodeError::BadCompactorCount(
                "num_compactors exceeds the maximum addressable level count",
            ));
        }

        let mut compactors = Vec::with_capacity(num_compactors as usize);
        for _ in 0..num_compactors {
            let len = u32::decode(&mut reader)? as usize;
            if len > reader.len() {
                log::debug!("heapify rejected sketch: compactor length exceeds remaining bytes");
                return Err(DecodeError::BadCompactorCount(
                    "compactor length exceeds remaining bytes",
                ));
            }
            let (chunk, rest) = reader.split_at(len);
            let c = Compactor::decode(&mut &chunk[..])?;
            compactors.push(c);
            reader = rest;
        }
        if compactors.is_empty() {
            compactors.push(Compactor::new(0, hra, k));
        }

        let mut sketch = ReqSketch {
            k,
            hra,
            criterion,
            compatible,
            total_n,
            min_value,
            max_value,
            retained: 0,
            max_nominal_size: 0,
            compactors,
            aux: None,
            bits: Box::new(ThreadRngBits),
            observer: Box::new(NullObserver),
        };
        sketch.recompute_retained();
        sketch.recompute_max_nominal_size();
        Ok(sketch)
    }
}

fn normalize_k(k: u32) -> u32 {
    let even = k & !1;
    even.max(MIN_K)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantile::bits::FixedBits;

    #[test]
    fn new_sketch_is_empty() {
        let s = ReqSketch::new(12, true);
        assert!(s.is_empty());
        assert_eq!(s.get_n(), 0);
        assert!(!s.is_estimation_mode());
    }

    #[test]
    fn normalize_k_rounds_down_and_clamps() {
        assert_eq!(normalize_k(13), 12);
        assert_eq!(normalize_k(3), 4);
        assert_eq!(normalize_k(12), 12);
    }

    #[test]
    fn scenario_single_update() {
        let mut s = ReqSketch::new(12, true);
        s.update(5.0);
        assert_eq!(s.get_rank(5.0), 1.0);
        s = s.set_criterion(Criterion::Lt);
        assert_eq!(s.get_rank(5.0), 0.0);
        s = s.set_criterion(Criterion::Le);
        assert_eq!(s.get_rank(5.0), 1.0);
        assert_eq!(s.get_quantile(0.5).unwrap(), 5.0);
        assert!(!s.is_estimation_mode());
    }

    #[test]
    fn scenario_sequential_thousand() {
        let mut s = ReqSketch::new(12, true);
        for i in 1..=1000 {
            s.update(i as f32);
        }
        let rank = s.get_rank(500.0);
        assert!((0.49..=0.51).contains(&rank), "rank={}", rank);
        let q = s.get_quantile(0.5).unwrap();
        assert!((480.0..=520.0).contains(&q), "q={}", q);
        assert_eq!(s.get_n(), 1000);
        assert_eq!(s.get_min_value(), 1.0);
        assert_eq!(s.get_max_value(), 1000.0);
    }

    #[test]
    fn scenario_merge_matches_sequential() {
        let mut s1 = ReqSketch::new(12, true);
        for i in 1..=500 {
            s1.update(i as f32);
        }
        let mut s2 = ReqSketch::new(12, true);
        for i in 501..=1000 {
            s2.update(i as f32);
        }
        let mut merged = s1.merge(s2);
        assert_eq!(merged.get_n(), 1000);
        let rank = merged.get_rank(500.0);
        assert!((0.49..=0.51).contains(&rank), "rank={}", rank);
    }

    #[test]
    fn scenario_nan_is_dropped() {
        let mut s = ReqSketch::new(12, true);
        s.update(f32::NAN);
        s.update(3.0);
        assert_eq!(s.get_n(), 1);
        assert_eq!(s.get_min_value(), 3.0);
        assert_eq!(s.get_max_value(), 3.0);
    }

    #[test]
    fn scenario_large_stream_round_trips() {
        let mut s = ReqSketch::new(4, true);
        for i in 1..=100_000 {
            s.update(i as f32);
        }
        assert!(s.compactors.len() >= 2);
        assert!(s.retained < s.max_nominal_size);

        let bytes = s.to_byte_array();
        let mut restored = ReqSketch::heapify(&bytes).expect("could not heapify sketch");
        let probes = [1.0f32, 1000.0, 50000.0, 99000.0, 100000.0];
        assert_eq!(
            s.get_ranks(&probes),
            restored.get_ranks(&probes),
        );
    }

    #[test]
    fn empty_sketch_cdf_is_empty() {
        let mut s = ReqSketch::new(12, true);
        assert_eq!(s.get_cdf(&[0.0]).unwrap(), Vec::<f64>::new());
    }

    #[test]
    fn empty_sketch_quantile_errors() {
        let mut s = ReqSketch::new(12, true);
        assert_eq!(s.get_quantile(0.5), Err(SketchError::EmptySketch));
    }

    #[test]
    fn out_of_range_rank_errors() {
        let mut s = ReqSketch::new(12, true);
        s.update(1.0);
        assert_eq!(s.get_quantile(1.5), Err(SketchError::RankOutOfRange(1.5)));
    }

    #[test]
    fn heapify_rejects_bad_header() {
        let buf = vec![0xFFu8; 32];
        match ReqSketch::heapify(&buf) {
            Err(DecodeError::BadHeader(_)) => {}
            other => panic!("expected bad header, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn heapify_rejects_absurd_compactor_count_before_allocating() {
        // A hostile/corrupt image claiming ~4 billion compactors must be
        // rejected by a bound check, not by trying to allocate a Vec
        // sized from the untrusted count.
        let mut buf = Vec::new();
        PREAMBLE_LONGS.encode(&mut buf).unwrap();
        SER_VER.encode(&mut buf).unwrap();
        FAMILY_ID.encode(&mut buf).unwrap();
        0u8.encode(&mut buf).unwrap(); // flags: not empty
        12u32.encode(&mut buf).unwrap(); // k
        0u64.encode(&mut buf).unwrap(); // total_n
        0.0f32.encode(&mut buf).unwrap(); // min_value
        0.0f32.encode(&mut buf).unwrap(); // max_value
        u32::MAX.encode(&mut buf).unwrap(); // num_compactors

        match ReqSketch::heapify(&buf) {
            Err(DecodeError::BadCompactorCount(_)) => {}
            other => panic!("expected bad compactor count, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn deterministic_bits_drive_reproducible_compaction() {
        let mut s = ReqSketch::with_parts(
            4,
            true,
            true,
            Criterion::Lt,
            Box::new(FixedBits::new(vec![false, true])),
            Box::new(NullObserver),
        );
        for i in 1..=200 {
            s.update(i as f32);
        }
        assert!(s.retained < s.max_nominal_size);
    }
}
