//! Configuration of a pulse filter run
//!
//! The settings are read from a toml file. Every field 
//! has a default, so a partial file is fine as well.

use std::fmt;
use std::fs::File;
use std::io::{
    Read,
    Write,
};
use std::path::Path;

use crate::constants::DEFAULT_SAMPLE_OFFSET;
use crate::errors::ConfigurationError;
use crate::reference_pulse::PulseShape;

/// Template of the reference pulse
#[derive(Debug, Copy, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum PulseShapeKind {
  Trapezoid,
  Muonic,
}

/// Parameters of the reference pulse
#[derive(Debug, Copy, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct PulseShapeSettings {
  pub shape        : PulseShapeKind,
  /// rise time (s)
  pub rise_time    : f64,
  /// time at full pulse height (s)
  pub on_time      : f64,
  /// fall time (s)
  pub fall_time    : f64,
  /// pulse height (V), negative for downward going pulses
  pub pulse_height : f64,
}

impl PulseShapeSettings {
  pub fn new() -> Self {
    Self {
      shape        : PulseShapeKind::Muonic,
      rise_time    : 20e-9,
      on_time      : 12e-9,
      fall_time    : 128e-9,
      pulse_height : -0.035,
    }
  }

  pub fn to_shape(&self) -> PulseShape {
    match self.shape {
      PulseShapeKind::Trapezoid => PulseShape::Trapezoid {
        rise_time : self.rise_time,
        on_time   : self.on_time,
        fall_time : self.fall_time,
      },
      PulseShapeKind::Muonic => PulseShape::Muonic {
        rise_time : self.rise_time,
        on_time   : self.on_time,
        fall_time : self.fall_time,
      },
    }
  }
}

impl Default for PulseShapeSettings {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct PulseFilterSettings {
  /// time between two samples (s)
  pub sampling_interval : f64,
  /// number of samples per trace
  pub n_samples         : usize,
  /// fraction of the trace before the trigger point
  pub pretrigger        : f64,
  /// channel names in the order of the traces
  pub channels          : Vec<String>,
  /// name of the trigger channel. Without trigger
  /// channel, the first channel is used as anchor, 
  /// but its pulse shape is not enforced.
  /// Absent from a file means no trigger channel.
  #[serde(default)]
  pub trigger_channel   : Option<String>,
  /// slack of the search windows (samples)
  pub sample_offset     : usize,
  /// 0 : quiet, 1 : periodic summaries, 2 : every event
  pub verbosity         : u8,
  /// id used to register with the event source
  pub consumer_id       : String,
  /// write accepted events to text files
  pub log_pulses        : bool,
  /// directory for the text files
  pub log_dir           : String,
  pub pulse             : PulseShapeSettings,
}

impl PulseFilterSettings {
  pub fn new() -> Self {
    Self {
      sampling_interval : 4e-9,
      n_samples         : 200,
      pretrigger        : 0.25,
      channels          : vec![String::from("A"),
                               String::from("B"),
                               String::from("C")],
      trigger_channel   : Some(String::from("A")),
      sample_offset     : DEFAULT_SAMPLE_OFFSET,
      verbosity         : 1,
      consumer_id       : String::from("PulseFilter"),
      log_pulses        : false,
      log_dir           : String::from("pulseLogs"),
      pulse             : PulseShapeSettings::new(),
    }
  }

  /// Sample number of the trigger point
  pub fn trigger_index(&self) -> usize {
    (self.n_samples as f64 * self.pretrigger) as usize
  }

  pub fn n_channels(&self) -> usize {
    self.channels.len()
  }

  /// Position of the trigger channel in the channel 
  /// list, None for trigger-less mode
  pub fn trigger_channel_index(&self) -> Result<Option<usize>, ConfigurationError> {
    match &self.trigger_channel {
      None       => Ok(None),
      Some(name) => {
        match self.channels.iter().position(|ch| ch == name) {
          Some(idx) => Ok(Some(idx)),
          None      => {
            error!("Trigger channel {} is not in {:?}!", name, self.channels);
            Err(ConfigurationError::TriggerChannelNotFound)
          }
        }
      }
    }
  }

  /// Write the settings to a toml file
  pub fn to_toml(&self, filename : &Path) -> Result<(), ConfigurationError> {
    info!("Will write to file {}!", filename.display());
    let toml_string = match toml::to_string_pretty(&self) {
      Err(err) => {
        error!("Unable to serialize toml! {err}");
        return Err(ConfigurationError::TomlDecodingError);
      }
      Ok(toml_string) => toml_string,
    };
    let mut file = match File::create(filename) {
      Err(err) => {
        error!("Unable to open file {}! {}", filename.display(), err);
        return Err(ConfigurationError::IoError);
      }
      Ok(file) => file,
    };
    match file.write_all(toml_string.as_bytes()) {
      Err(err) => {
        error!("Unable to write to file {}! {}", filename.display(), err);
        Err(ConfigurationError::IoError)
      }
      Ok(_) => {
        debug!("Wrote settings to {}!", filename.display());
        Ok(())
      }
    }
  }

  /// Read the settings from a toml file
  pub fn from_toml(filename : &Path) -> Result<PulseFilterSettings, ConfigurationError> {
    let mut file = match File::open(filename) {
      Err(err) => {
        error!("Unable to open {}! {}", filename.display(), err);
        return Err(ConfigurationError::IoError);
      }
      Ok(file) => file,
    };
    let mut toml_string = String::from("");
    if let Err(err) = file.read_to_string(&mut toml_string) {
      error!("Unable to read {}! {}", filename.display(), err);
      return Err(ConfigurationError::IoError);
    }
    match toml::from_str(&toml_string) {
      Err(err) => {
        error!("Can't interpret toml! {}", err);
        Err(ConfigurationError::TomlDecodingError)
      }
      Ok(settings) => Ok(settings),
    }
  }
}

impl fmt::Display for PulseFilterSettings {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : String;
    match toml::to_string(self) {
      Err(err) => {
        error!("Serialization error! {err}");
        disp = String::from("-- SERIALIZATION ERROR! --");
      }
      Ok(_disp) => {
        disp = _disp;
      }
    }
    write!(f, "<PulseFilterSettings :\n{}>", disp)
  }
}

impl Default for PulseFilterSettings {
  fn default() -> Self {
    Self::new()
  }
}
