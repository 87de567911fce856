//! Waveform events as delivered by the event source
//!

use std::fmt;

/// One multi-channel voltage trace plus metadata.
///
/// The samples are indexed `[channel][sample]` and 
/// given in Volt.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Event {
  pub event_id  : u64,
  /// time the event was recorded (s)
  pub timestamp : f64,
  pub samples   : Vec<Vec<f64>>,
}

impl Event {
  pub fn new(event_id : u64, timestamp : f64, samples : Vec<Vec<f64>>) -> Self {
    Self {
      event_id,
      timestamp,
      samples,
    }
  }

  pub fn n_channels(&self) -> usize {
    self.samples.len()
  }

  /// Length of the shortest trace in the event
  pub fn min_trace_len(&self) -> usize {
    self.samples.iter().map(|ch| ch.len()).min().unwrap_or(0)
  }
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<Event:");
    repr += &(format!("\n  event id   : {}", self.event_id));
    repr += &(format!("\n  timestamp  : {:.3}", self.timestamp));
    repr += &(format!("\n  n channels : {}", self.n_channels()));
    for (ch, trace) in self.samples.iter().enumerate() {
      let vmin = trace.iter().cloned().fold(f64::INFINITY, f64::min);
      let vmax = trace.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
      repr += &(format!("\n  -- ch {} : {} samples, [{:.4}, {:.4}] V", ch, trace.len(), vmin, vmax));
    }
    write!(f, "{}>", repr)
  }
}
