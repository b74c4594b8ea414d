//! Filesystem, logging and input validation helpers

pub mod file_utils;
pub mod logging;
pub mod validation;

pub use file_utils::{ensure_writable_dir, find_media_file, non_empty_file, remove_video_dir};
pub use logging::init_tracing;
pub use validation::{extract_video_id, validate_resolution};
