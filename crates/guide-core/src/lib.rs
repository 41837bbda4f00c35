//! Guide core: windowed rendering math, incremental program cache, the
//! time/pixel coordinate system and the search/filter pipeline behind a
//! scrollable channel-by-time grid.
//!
//! Everything here is synchronous except the day fetch in `date_loader`
//! and the ticking in `now_line::NowLineTask`. State lives in one owned
//! `GuideState` that each component borrows from; nothing is global.

pub mod catalog;
pub mod collab;
pub mod date_loader;
pub mod error;
pub mod feed;
pub mod filter;
pub mod now_line;
pub mod program_cache;
pub mod rows;
pub mod search;
pub mod state;
pub mod throttle;
pub mod timeline;
pub mod virtualizer;

pub use error::GuideError;
pub use state::GuideState;
