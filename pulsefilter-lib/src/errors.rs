//! Error types of the pulse filter
//!
//! Configuration errors are fatal when the processor
//! is built, analysis errors indicate events which 
//! violate the geometry the processor was configured
//! for.

use std::error::Error;
use std::fmt;
use std::io;

/// Issues with the settings or the reference pulse 
/// parameters. Never retried.
#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum ConfigurationError {
  NonMonotonicAnchors,
  ZeroPulseHeight,
  InvalidSamplingInterval,
  KernelTooShort,
  TriggerChannelNotFound,
  NoChannels,
  TriggerIndexOutOfRange,
  TomlDecodingError,
  IoError,
  InvalidNoiseLevel,
}

impl ConfigurationError {
  pub fn to_string(&self) -> String {
    match self {
      ConfigurationError::NonMonotonicAnchors     => {return String::from("NonMonotonicAnchors");},
      ConfigurationError::ZeroPulseHeight         => {return String::from("ZeroPulseHeight");},
      ConfigurationError::InvalidSamplingInterval => {return String::from("InvalidSamplingInterval");},
      ConfigurationError::KernelTooShort          => {return String::from("KernelTooShort");},
      ConfigurationError::TriggerChannelNotFound  => {return String::from("TriggerChannelNotFound");},
      ConfigurationError::NoChannels              => {return String::from("NoChannels");},
      ConfigurationError::TriggerIndexOutOfRange  => {return String::from("TriggerIndexOutOfRange");},
      ConfigurationError::TomlDecodingError       => {return String::from("TomlDecodingError");},
      ConfigurationError::IoError                 => {return String::from("IoError");},
      ConfigurationError::InvalidNoiseLevel       => {return String::from("InvalidNoiseLevel");},
    }
  }
}

impl fmt::Display for ConfigurationError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = self.to_string();
    write!(f, "<ConfigurationError : {}>", repr)
  }
}

impl Error for ConfigurationError {
}

/*************************************/

/// Events or search windows which do not fit 
/// the configured geometry
#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum AnalysisError {
  /// The upper bound of a search window is 
  /// beyond the end of the trace
  OutOfRangeUpperBound,
  /// The search window can not hold the 
  /// reference pulse
  WindowTooShort,
  WrongChannelCount,
  TraceTooShort,
}

impl AnalysisError {
  pub fn to_string(&self) -> String {
    match self {
      AnalysisError::OutOfRangeUpperBound => {return String::from("OutOfRangeUpperBound");},
      AnalysisError::WindowTooShort       => {return String::from("WindowTooShort");},
      AnalysisError::WrongChannelCount    => {return String::from("WrongChannelCount");},
      AnalysisError::TraceTooShort        => {return String::from("TraceTooShort");},
    }
  }
}

impl fmt::Display for AnalysisError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = self.to_string();
    write!(f, "<AnalysisError : {}>", repr)
  }
}

impl Error for AnalysisError {
}

/*************************************/

/// Anything which can go wrong while building
/// or running a pulse processor
#[derive(Debug)]
pub enum PulseFilterError {
  Configuration(ConfigurationError),
  Analysis(AnalysisError),
  Io(io::Error),
}

impl fmt::Display for PulseFilterError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      PulseFilterError::Configuration(err) => write!(f, "{}", err),
      PulseFilterError::Analysis(err)      => write!(f, "{}", err),
      PulseFilterError::Io(err)            => write!(f, "<IoError : {}>", err),
    }
  }
}

impl Error for PulseFilterError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      PulseFilterError::Configuration(err) => Some(err),
      PulseFilterError::Analysis(err)      => Some(err),
      PulseFilterError::Io(err)            => Some(err),
    }
  }
}

impl From<ConfigurationError> for PulseFilterError {
  fn from(err : ConfigurationError) -> Self {
    PulseFilterError::Configuration(err)
  }
}

impl From<AnalysisError> for PulseFilterError {
  fn from(err : AnalysisError) -> Self {
    PulseFilterError::Analysis(err)
  }
}

impl From<io::Error> for PulseFilterError {
  fn from(err : io::Error) -> Self {
    PulseFilterError::Io(err)
  }
}
