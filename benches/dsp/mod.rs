//! Benchmarks for per-voice DSP primitives.

mod envelope;
mod filter;
mod mix;
mod modulators;
mod oscillator;

pub use envelope::bench_envelope;
pub use filter::bench_filter;
pub use mix::bench_mix;
pub use modulators::bench_modulators;
pub use oscillator::bench_oscillator;
