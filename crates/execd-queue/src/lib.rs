mod ring;
mod slab;

pub use ring::{Ring, RingFull};
pub use slab::{Slab, DEFAULT_SIZE_CLASSES};
