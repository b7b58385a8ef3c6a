//! # Operator Catalog
//!
//! Built-in node behaviors. Each operator reads its upstreams through
//! [`CycleContext`](crate::node::CycleContext) and reports whether it produced.
//!
//! | operator | produces when |
//! |---|---|
//! | [`Constant`] | every cycle |
//! | [`Ticker`] | its period has elapsed (value is the tick time) |
//! | [`Replay`] | its next recorded event is due |
//! | [`Map`] | upstream produced |
//! | [`Filter`] | upstream produced and the predicate holds |
//! | [`Distinct`] | upstream produced a value different from the last one propagated |
//! | [`Delay`] | a buffered value's delay has elapsed (one per cycle) |
//! | [`Buffer`] | upstream produced and the window is full |
//! | [`Sample`] | the trigger produced and the sampled stream has a value |
//! | [`Limit`] | upstream produced, for the first `n` values |
//! | [`Collect`] | upstream produced |
//! | [`Bimap`] | either side produced and both have a value |
//! | [`Average`] | upstream produced |
//! | [`Logged`] | upstream produced |
//! | [`Count`] | upstream produced |
//! | [`Fold`] | upstream produced |
//! | [`ForEach`] | upstream produced |
//! | [`Finally`] | upstream produced (callback at run end) |
//! | [`Merge`] | any input produced |

pub mod average;
pub mod bimap;
pub mod buffer;
pub mod collect;
pub mod constant;
pub mod count;
pub mod delay;
pub mod distinct;
pub mod filter;
pub mod finally;
pub mod fold;
pub mod limit;
pub mod logged;
pub mod map;
pub mod merge;
pub mod replay;
pub mod sample;
pub mod ticker;

pub use average::Average;
pub use bimap::Bimap;
pub use buffer::Buffer;
pub use collect::Collect;
pub use constant::Constant;
pub use count::Count;
pub use delay::{Delay, DelayConfig, DelayOverflow, OverflowPolicy};
pub use distinct::Distinct;
pub use filter::Filter;
pub use finally::Finally;
pub use fold::{Fold, ForEach};
pub use limit::Limit;
pub use logged::{LogRecord, Logged};
pub use map::Map;
pub use merge::Merge;
pub use replay::{OutOfOrder, Replay};
pub use sample::Sample;
pub use ticker::Ticker;
