//! Component F — the Session Store: concurrent, bounded-history session
//! state keyed by session id, plus a periodic reaper (spec §4.F).

pub mod reaper;
pub mod store;

pub use reaper::spawn_reaper;
pub use store::SessionStore;
