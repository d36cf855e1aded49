// In-memory sources
pub mod buffered;
pub mod vec;

pub use buffered::{BufferedSource, Pusher, buffered};
pub use vec::VecSource;
