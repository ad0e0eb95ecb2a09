use crate::quantile::criterion::Criterion;

/// A one-shot sorted, weighted view across every compactor level, built
/// lazily the first time a quantile is requested after a mutation.
///
/// Mirrors the shape of the teacher's `WeightedQuerySketch`: values are
/// deduplicated during construction and each distinct value carries a
/// cumulative-weight boundary, but ranks here are continuous in [0, 1]
/// (normalized by `total_n`) rather than the teacher's raw integer ranks,
/// since quantile queries answer against a normalized rank argument.
pub struct AuxiliaryView {
    values: Vec<f32>,
    // cumulative_weight[i] = total weight of every item <= values[i].
    cumulative_weight: Vec<u64>,
    // The sketch's own running total_n, not the sum of buffer weights
    // collected above: the two agree only in expectation once compaction
    // has run, so every normalized quantity is anchored to total_n, the
    // authoritative count the rest of the sketch (get_rank, get_cdf) uses.
    total_n: u64,
}

impl AuxiliaryView {
    /// Builds the view from every level's items, each tagged with its
    /// weight `2^level`, normalizing against the sketch's authoritative
    /// `total_n` rather than the weight sum collected here. `levels` is
    /// `(lg_weight, sorted values)` pairs; the caller (the sketch) is
    /// responsible for having sorted each buffer already.
    pub fn build<'a, I>(levels: I, total_n: u64) -> AuxiliaryView
    where
        I: IntoIterator<Item = (u8, &'a [f32])>,
    {
        let mut entries: Vec<(f32, u64)> = Vec::new();
        for (lg_weight, values) in levels {
            let weight = 1u64 << lg_weight;
            entries.extend(values.iter().map(|&v| (v, weight)));
        }
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut values = Vec::with_capacity(entries.len());
        let mut cumulative_weight = Vec::with_capacity(entries.len());
        let mut running: u64 = 0;
        for (value, weight) in entries {
            running += weight;
            if let Some(&last) = values.last() {
                if last == value {
                    let n = cumulative_weight.len();
                    cumulative_weight[n - 1] = running;
                    continue;
                }
            }
            values.push(value);
            cumulative_weight.push(running);
        }

        AuxiliaryView {
            values,
            cumulative_weight,
            total_n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total_n(&self) -> u64 {
        self.total_n
    }

    /// Number of items comparing to `v` under `crit`, via the cumulative
    /// column's boundary index (mirrors `FloatBuffer::count_with_criterion`
    /// but over the deduplicated, weighted view). The GT/GE complement is
    /// taken against `total_n`, matching `ReqSketch::count_with_criterion`.
    pub fn count_with_criterion(&self, v: f32, crit: Criterion) -> u64 {
        if self.values.is_empty() {
            return 0;
        }
        match crit {
            Criterion::Lt => {
                let idx = self.values.partition_point(|&x| x < v);
                if idx == 0 {
                    0
                } else {
                    self.cumulative_weight[idx - 1]
                }
            }
            Criterion::Le => {
                let idx = self.values.partition_point(|&x| x <= v);
                if idx == 0 {
                    0
                } else {
                    self.cumulative_weight[idx - 1]
                }
            }
            Criterion::Gt => self.total_n - self.count_with_criterion(v, Criterion::Le),
            Criterion::Ge => self.total_n - self.count_with_criterion(v, Criterion::Lt),
        }
    }

    /// Locates the value at normalized rank `r` under `crit`.
    ///
    /// LT/LE semantics: first row whose normalized cumulative rank is
    /// `>= r`. GT/GE semantics: first row whose rank is `> r` (the
    /// complementary lower criterion drives which side of the boundary
    /// counts, matching `Criterion::complementary_lower`). The rank is
    /// normalized by `total_n` per the spec, not by the view's own
    /// (possibly slightly different, post-compaction) weight sum.
    pub fn quantile(&self, r: f64, crit: Criterion) -> Option<f32> {
        if self.values.is_empty() || self.total_n == 0 {
            return None;
        }
        let target = r * self.total_n as f64;
        let idx = if crit.is_lower() {
            self.cumulative_weight
                .partition_point(|&w| (w as f64) < target)
        } else {
            self.cumulative_weight
                .partition_point(|&w| (w as f64) <= target)
        };
        self.values.get(idx).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_empty_view() {
        let view = AuxiliaryView::build(std::iter::empty(), 0);
        assert!(view.is_empty());
        assert_eq!(view.total_n(), 0);
        assert_eq!(view.quantile(0.5, Criterion::Lt), None);
    }

    #[test]
    fn dedupes_repeated_values_across_levels() {
        let lvl0 = vec![1.0f32, 1.0, 2.0];
        let lvl1 = vec![1.0f32];
        // weight: 1.0 -> 2*1 + 1*2 = 4, 2.0 -> 1
        let view = AuxiliaryView::build(vec![(0, lvl0.as_slice()), (1, lvl1.as_slice())], 5);
        assert_eq!(view.total_n(), 5);
        assert_eq!(view.count_with_criterion(1.0, Criterion::Le), 4);
        assert_eq!(view.count_with_criterion(1.0, Criterion::Lt), 0);
        assert_eq!(view.count_with_criterion(2.0, Criterion::Ge), 1);
    }

    #[test]
    fn quantile_locates_boundary_row() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0];
        let view = AuxiliaryView::build(vec![(0, data.as_slice())], 5);
        assert_eq!(view.quantile(0.0, Criterion::Lt), Some(1.0));
        assert_eq!(view.quantile(1.0, Criterion::Le), Some(5.0));
        assert_eq!(view.quantile(1.0, Criterion::Ge), None);
        assert_eq!(view.quantile(0.5, Criterion::Lt), Some(3.0));
    }

    #[test]
    fn count_with_criterion_matches_manual_count() {
        let data = vec![1.0f32, 1.0, 2.0, 3.0, 3.0, 3.0];
        let view = AuxiliaryView::build(vec![(0, data.as_slice())], 6);
        assert_eq!(view.count_with_criterion(3.0, Criterion::Lt), 3);
        assert_eq!(view.count_with_criterion(3.0, Criterion::Le), 6);
        assert_eq!(view.count_with_criterion(3.0, Criterion::Gt), 0);
        assert_eq!(view.count_with_criterion(3.0, Criterion::Ge), 3);
    }

    #[test]
    fn quantile_normalizes_against_total_n_not_view_weight() {
        // Simulates a post-compaction view where the collected weight sum
        // (3) diverges from the sketch's authoritative total_n (4): the
        // normalized rank of each row must shift accordingly.
        let data = vec![1.0f32, 2.0, 3.0];
        let view = AuxiliaryView::build(vec![(0, data.as_slice())], 4);
        assert_eq!(view.quantile(0.5, Criterion::Le), Some(2.0));
        assert_eq!(view.quantile(0.7, Criterion::Le), Some(3.0));
    }
}
