/// Comparator used by rank and count queries.
///
/// `Lt`/`Le` are the two "lower" criteria: a count under either can be
/// read directly off a sorted buffer. `Gt`/`Ge` are their complements and
/// are always answered as `total - count_under(complementary_lower)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Criterion {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Default for Criterion {
    fn default() -> Criterion {
        Criterion::Lt
    }
}

impl Criterion {
    /// True for the two criteria answered directly (not by complement).
    pub(crate) fn is_lower(self) -> bool {
        matches!(self, Criterion::Lt | Criterion::Le)
    }

    /// The lower criterion used to compute a complemented count:
    /// `Gt` counts via `Le`, `Ge` counts via `Lt`.
    pub(crate) fn complementary_lower(self) -> Criterion {
        match self {
            Criterion::Lt | Criterion::Le => self,
            Criterion::Gt => Criterion::Le,
            Criterion::Ge => Criterion::Lt,
        }
    }

    /// LE-vs-LT bit persisted in the wire format; GT/GE are runtime-only.
    pub(crate) fn is_le_flag(self) -> bool {
        matches!(self, Criterion::Le | Criterion::Ge)
    }

    pub(crate) fn from_le_flag(is_le: bool) -> Criterion {
        if is_le {
            Criterion::Le
        } else {
            Criterion::Lt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lt() {
        assert_eq!(Criterion::default(), Criterion::Lt);
    }

    #[test]
    fn complementary_lower_maps_upper_criteria() {
        assert_eq!(Criterion::Gt.complementary_lower(), Criterion::Le);
        assert_eq!(Criterion::Ge.complementary_lower(), Criterion::Lt);
        assert_eq!(Criterion::Lt.complementary_lower(), Criterion::Lt);
        assert_eq!(Criterion::Le.complementary_lower(), Criterion::Le);
    }

    #[test]
    fn is_lower_flags_lt_and_le_only() {
        assert!(Criterion::Lt.is_lower());
        assert!(Criterion::Le.is_lower());
        assert!(!Criterion::Gt.is_lower());
        assert!(!Criterion::Ge.is_lower());
    }

    #[test]
    fn le_flag_round_trips() {
        assert_eq!(Criterion::from_le_flag(Criterion::Le.is_le_flag()), Criterion::Le);
        assert_eq!(Criterion::from_le_flag(Criterion::Lt.is_le_flag()), Criterion::Lt);
    }
}
