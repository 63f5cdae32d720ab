use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{ThreadId, DEFAULT_MAX_FRAMES};

/// How the histogram is written out at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `<signature>\t<count>` per line.
    Collapsed,
    Json,
    Speedscope,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Format> {
        match s {
            "collapsed" => Ok(Format::Collapsed),
            "json" => Ok(Format::Json),
            "speedscope" => Ok(Format::Speedscope),
            other => Err(Error::InvalidConfig(format!("unknown format {:?}", other))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Format::Collapsed => "collapsed",
            Format::Json => "json",
            Format::Speedscope => "speedscope",
        })
    }
}

/// Settings for one profiling run.
#[derive(Debug, Clone)]
pub struct Config {
    pub pid: ThreadId,
    /// Pause between the end of one sample and the start of the next.
    pub interval: Duration,
    pub max_frames: usize,
    pub demangle: bool,
    pub format: Format,
}

impl Config {
    pub fn new(pid: ThreadId) -> Self {
        Config {
            pid,
            interval: Duration::from_millis(1),
            max_frames: DEFAULT_MAX_FRAMES,
            demangle: true,
            format: Format::Collapsed,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pid.as_raw() <= 0 {
            return Err(Error::InvalidConfig(format!("bad pid: {}", self.pid)));
        }
        if self.max_frames == 0 {
            return Err(Error::InvalidConfig(
                "max frames must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
