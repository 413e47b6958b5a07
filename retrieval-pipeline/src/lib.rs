pub mod fts;

pub use fts::{group_by_original, search, HitGroup, SearchHit, HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};
