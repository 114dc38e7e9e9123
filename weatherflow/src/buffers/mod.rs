//! Accumulator buffers shared between the stages of one pipeline invocation.
//!
//! Every buffer is a cheap `Clone` handle over shared state, so a buffer can
//! be handed to the producing stage and to any number of consuming stages
//! before any of them runs. The scheduler's dependency ordering guarantees a
//! consumer never starts before its producer has settled.

mod bytes;
mod errors;
mod list;
mod slot;

pub use bytes::ByteBuffer;
pub use errors::ErrorAccumulator;
pub use list::SharedList;
pub use slot::Slot;
