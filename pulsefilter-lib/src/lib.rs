//! # Pulse filter for multi-channel waveform acquisition
//!
//! Search waveforms for detector pulses by correlating them with
//! a reference pulse. The analysis runs event by event in three 
//! steps:
//!
//! 1. validation of the pulse on the trigger channel
//! 2. coincidences on the other channels near the validated pulse
//! 3. search for subsequent (double) pulses on any channel
//!
//! Results go to text log files and to a set of single slot
//! output feeds for live monitoring.
//!

pub mod constants;
pub mod errors;
pub mod events;
pub mod reference_pulse;
pub mod peak_search;
pub mod trigger;
pub mod coincidence;
pub mod double_pulse;
pub mod feeds;
pub mod statistics;
pub mod pulse_log;
pub mod processor;
pub mod settings;
pub mod source;

#[macro_use] extern crate log;
extern crate env_logger;

use std::io::Write;

use colored::{Colorize, ColoredString};
use log::Level;

pub use errors::{
    ConfigurationError,
    AnalysisError,
    PulseFilterError,
};
pub use events::Event;
pub use reference_pulse::{
    PulseShape,
    ReferencePulse,
};
pub use processor::{
    PulseProcessor,
    DetectionResult,
};
pub use settings::PulseFilterSettings;
pub use source::{
    EventSource,
    DiagnosticLog,
};

/// Make sure that the loglevel is in color, even though not using pretty_env logger
pub fn color_log(level : &Level) -> ColoredString {
  match level {
    Level::Error    => String::from(" ERROR!").red(),
    Level::Warn     => String::from(" WARN  ").yellow(),
    Level::Info     => String::from(" Info  ").green(),
    Level::Debug    => String::from(" debug ").blue(),
    Level::Trace    => String::from(" trace ").cyan(),
  }
}

/// Set up the environmental (env) logger
/// with our format
///
/// Ensure that the lines and module paths
/// are printed in the logging output
pub fn init_env_logger() {
  env_logger::builder()
    .format(|buf, record| {
    writeln!( buf, "[{level}][{module_path}:{line}] {args}",
      level = color_log(&record.level()),
      module_path = record.module_path().unwrap_or("<unknown>"),
      line = record.line().unwrap_or(0),
      args = record.args()
      )
    }).init();
}
