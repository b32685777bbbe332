pub mod listener;
pub mod parse;

pub use listener::{DeviceSource, DeviceStreamConfig, DeviceStreamListener, DeviceStreamStats};
pub use parse::{clean_line, frame_lines, parse_share_difficulty, ShareParseError};
