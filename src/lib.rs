// Party-game engine for the bucket-list app: phase state machine, vote
// tallies, room-scoped persistence, cross-instance broadcast, and the
// board display bridge.

pub mod board;
pub mod bus;
pub mod engine;
pub mod room;
pub mod store;
pub mod tally;
pub mod themes;
pub mod types;
