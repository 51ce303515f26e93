pub mod ring;

pub use ring::{MoveOutcome, RingStore, StoreOutcome};
