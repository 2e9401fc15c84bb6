pub mod cancel;
pub mod fs;
pub mod hasher;
