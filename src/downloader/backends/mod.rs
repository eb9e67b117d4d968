// Media engine implementations

pub mod ytdlp;

pub use ytdlp::YtDlpEngine;
