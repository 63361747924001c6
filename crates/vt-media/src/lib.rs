//! FFmpeg CLI wrapper for transcode tasks.
//!
//! This crate provides:
//! - FFmpeg command building from free-form argument strings
//! - Progress parsing from FFmpeg's diagnostic output
//! - Cancellation and timeout support via tokio

pub mod command;
pub mod error;
pub mod progress;

pub use command::{check_ffmpeg, ffmpeg_version, split_args, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use progress::ProgressParser;
