use crate::encode::{Decodable, DecodeError, Encodable};
use crate::quantile::bits::BitSource;
use crate::quantile::buffer::FloatBuffer;
use std::io::{Read, Write};

/// Floor on `section_size`; halving `section_size_flt` by `sqrt(2)` on
/// every doubling of `num_sections` would otherwise eventually round to
/// zero and stall the capacity schedule.
pub const MIN_K: u32 = 4;

pub(crate) const INIT_NUM_SECTIONS: u32 = 3;

const COMPACTOR_PREAMBLE_LONGS: u8 = 1;
const COMPACTOR_SER_VER: u8 = 1;

const FLAG_HRA: u8 = 1 << 0;
const FLAG_EMPTY: u8 = 1 << 1;

/// A single weight-class level of the compactor stack.
///
/// Every stored value in a level-`h` compactor represents `2^h` items of
/// the original stream. The compactor decides, via its own capacity
/// schedule, when it has accumulated enough samples to halve and
/// promote survivors to level `h + 1`.
#[derive(Clone, Debug)]
pub struct Compactor {
    lg_weight: u8,
    hra: bool,
    section_size_flt: f64,
    num_sections: u32,
    num_compactions: u64,
    state: u64,
    buffer: FloatBuffer,
}

impl Compactor {
    pub fn new(lg_weight: u8, hra: bool, k: u32) -> Compactor {
        Compactor {
            lg_weight,
            hra,
            section_size_flt: k as f64,
            num_sections: INIT_NUM_SECTIONS,
            num_compactions: 0,
            state: 0,
            buffer: FloatBuffer::new(),
        }
    }

    pub fn lg_weight(&self) -> u8 {
        self.lg_weight
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &FloatBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut FloatBuffer {
        &mut self.buffer
    }

    pub fn section_size(&self) -> u32 {
        section_size_from_flt(self.section_size_flt)
    }

    pub fn nom_capacity(&self) -> usize {
        2 * self.num_sections as usize * self.section_size() as usize
    }

    pub fn is_overflowing(&self) -> bool {
        self.buffer.len() >= self.nom_capacity()
    }

    /// Halves the over-capacity portion of this compactor and returns the
    /// promoted survivors (sorted, ready to merge into the next level).
    ///
    /// Precondition: `buffer` is sorted ascending and `buffer.len() >=
    /// nom_capacity()`.
    pub fn compact(&mut self, bits: &mut dyn BitSource) -> FloatBuffer {
        debug_assert!(self.buffer.is_sorted());
        debug_assert!(self.buffer.len() >= self.nom_capacity());

        let section_size = self.section_size() as usize;
        let submitted_len = 2 * self.num_sections as usize * section_size;
        let n = self.buffer.len();
        let retain_len = n - submitted_len;

        let secs_to_compact =
            (trailing_zero_count(self.state) + 1).min(self.num_sections) as usize;
        self.state += 1;
        self.advance_schedule();

        let span_len = secs_to_compact * section_size * 2;
        let data = self.buffer.as_slice();

        let (kept, span): (Vec<f32>, &[f32]) = if self.hra {
            // Low end retained; the chosen span sits at the extreme high
            // (far) tip of the buffer, closest to the newest, least-seen
            // data; everything below it that wasn't chosen this round
            // stays in the buffer for next time.
            let span_start = n - span_len;
            (data[..span_start].to_vec(), &data[span_start..n])
        } else {
            // High end retained; the chosen span sits at the extreme low
            // (far) tip.
            let span_end = span_len;
            (data[span_end..n].to_vec(), &data[..span_end])
        };
        debug_assert_eq!(kept.len(), n - span_len);
        debug_assert!(retain_len <= kept.len());

        let offset = bits.next_bit() as usize;
        let promoted: Vec<f32> = span.iter().skip(offset).step_by(2).copied().collect();

        self.buffer.set_sorted(kept);
        FloatBuffer::with_values(promoted)
    }

    fn advance_schedule(&mut self) {
        self.num_compactions += 1;
        if self.num_compactions >= 1u64 << (self.num_sections - 1) {
            self.num_sections *= 2;
            self.section_size_flt /= std::f64::consts::SQRT_2;
            self.state = 0;
        }
    }

    /// Absorbs `other`'s buffer into this one and adopts the coarser of
    /// the two capacity schedules, matching the teacher's
    /// `insert_from_other`/`merge_sorted` shape but generalized to carry
    /// the schedule state across the merge.
    pub fn merge(&mut self, mut other: Compactor) {
        debug_assert_eq!(self.lg_weight, other.lg_weight);
        other.buffer.sort();
        self.buffer.sort();
        self.buffer.merge_sort_in(other.buffer.as_slice());
        self.state |= other.state;
        self.num_compactions = self.num_compactions.max(other.num_compactions);
        if other.num_sections > self.num_sections {
            self.num_sections = other.num_sections;
        }
        if other.section_size_flt < self.section_size_flt {
            self.section_size_flt = other.section_size_flt;
        }
    }
}

fn section_size_from_flt(section_size_flt: f64) -> u32 {
    let rounded = section_size_flt.round() as i64;
    rounded.max((MIN_K / 2) as i64) as u32
}

fn trailing_zero_count(state: u64) -> u32 {
    if state == 0 {
        0
    } else {
        state.trailing_zeros()
    }
}

impl<W> Encodable<W> for Compactor
where
    W: Write,
{
    fn encode(&self, writer: &mut W) -> Result<(), DecodeError> {
        COMPACTOR_PREAMBLE_LONGS.encode(writer)?;
        COMPACTOR_SER_VER.encode(writer)?;

        let mut flags = 0u8;
        if self.hra {
            flags |= FLAG_HRA;
        }
        if self.buffer.is_empty() {
            flags |= FLAG_EMPTY;
        }
        flags.encode(writer)?;

        self.lg_weight.encode(writer)?;
        (self.section_size_flt as f32).encode(writer)?;
        self.num_sections.encode(writer)?;
        self.num_compactions.encode(writer)?;
        self.state.encode(writer)?;

        let mut sorted = self.buffer.clone();
        sorted.sort();
        sorted.as_slice().to_vec().encode(writer)?;
        Ok(())
    }
}

impl<R> Decodable<Compactor, R> for Compactor
where
    R: Read,
{
    fn decode(reader: &mut R) -> Result<Compactor, DecodeError> {
        let preamble_longs = u8::decode(reader)?;
        let ser_ver = u8::decode(reader)?;
        if preamble_longs != COMPACTOR_PREAMBLE_LONGS || ser_ver != COMPACTOR_SER_VER {
            return Err(DecodeError::BadHeader("unexpected compactor preamble"));
        }

        let flags = u8::decode(reader)?;
        let hra = flags & FLAG_HRA != 0;

        let lg_weight = u8::decode(reader)?;
        let section_size_flt = f32::decode(reader)? as f64;
        let num_sections = u32::decode(reader)?;
        let num_compactions = u64::decode(reader)?;
        let state = u64::decode(reader)?;
        let values = Vec::<f32>::decode(reader)?;

        Ok(Compactor {
            lg_weight,
            hra,
            section_size_flt,
            num_sections,
            num_compactions,
            state,
            buffer: FloatBuffer::with_values(values),
        })
    }
}
