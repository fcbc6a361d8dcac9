pub mod audio;
pub mod overlay;
pub mod paths;
pub mod sequence;
