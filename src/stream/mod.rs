mod publisher;

pub use publisher::*;
