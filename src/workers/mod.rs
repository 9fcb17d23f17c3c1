mod slot_clock;

pub use slot_clock::*;
