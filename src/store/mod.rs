pub mod atomic;

pub use atomic::{AtomicFile, atomic_write};
