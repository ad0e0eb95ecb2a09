/// Optional debug-emitter collaborator, fired at points of interest during
/// a sketch's lifetime. Every method takes `&self`/shared event data only —
/// an observer cannot reach back into the sketch and mutate it.
///
/// Mirrors the teacher's use of a plain trait object collaborator (cf. the
/// `Sink`/logging call sites in `processor.rs`) rather than a closure-per-
/// event design; one trait with several default no-op methods keeps call
/// sites at each event small.
pub trait SketchObserver {
    fn on_start(&self, _k: u32, _hra: bool) {}
    fn on_new_compactor(&self, _level: u8) {}
    fn on_compress_start(&self, _retained: usize, _max_nominal_size: usize) {}
    fn on_compress_done(&self, _retained: usize) {}
    fn on_must_add_compactor(&self, _level: u8) {}
    fn on_serialize(&self, _num_compactors: usize, _byte_len: usize) {}
}

/// The default observer: records nothing, costs nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SketchObserver for NullObserver {}
