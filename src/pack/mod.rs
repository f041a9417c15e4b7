pub mod archive;
pub mod locate;
pub mod writer;
