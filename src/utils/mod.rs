pub mod compression;
pub mod fs;
pub mod path;
pub mod progress;
pub mod stream;
