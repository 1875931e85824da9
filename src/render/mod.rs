//! Render replies: gap filling and the pickle wire format.

pub mod fill;
pub mod pickle;
pub mod reply;

pub use fill::AlignedSeries;
pub use pickle::{PickleWriter, WireWriter, EMPTY_LIST};
pub use reply::{
    AliasMap, AliasResolver, ReplyEncoder, ReplyStats, RollupMode, DEFAULT_BUFFER_SIZE,
};
