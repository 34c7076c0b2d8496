mod key_builder;

pub use key_builder::*;
