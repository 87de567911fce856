//! Running statistics of a pulse processor
//!
//! Owned and mutated by exactly one processor. The 
//! accumulator lists only grow, until they are 
//! successfully handed over to the histogram feed.

use std::fmt;
use std::mem;

use crate::feeds::HistogramBatch;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStatistics {
  /// all events seen
  pub event_count              : usize,
  /// events with a valid pulse on the trigger channel
  pub valid_count              : usize,
  /// accepted events
  pub coincidence_count        : usize,
  /// accepted events with exactly two channels
  pub double_coincidence_count : usize,
  /// accepted events with exactly three channels
  pub triple_coincidence_count : usize,
  /// accepted events with at least one secondary pulse
  pub double_pulse_count       : usize,
  pub noise_trigger_signals    : Vec<f64>,
  pub valid_trigger_signals    : Vec<f64>,
  pub voltage_signals          : Vec<f64>,
  pub double_pulse_taus        : Vec<f64>,
}

impl RunningStatistics {

  pub fn new() -> Self {
    Self::default()
  }

  /// Move the accumulators out, leaving them empty
  pub fn take_histogram_batch(&mut self) -> HistogramBatch {
    HistogramBatch {
      noise_amplitudes       : mem::take(&mut self.noise_trigger_signals),
      valid_amplitudes       : mem::take(&mut self.valid_trigger_signals),
      coincidence_amplitudes : mem::take(&mut self.voltage_signals),
      double_pulse_taus      : mem::take(&mut self.double_pulse_taus),
    }
  }

  /// Put back a batch which could not be delivered.
  /// Anything collected in the meantime is appended.
  pub fn restore_histogram_batch(&mut self, mut batch : HistogramBatch) {
    batch.noise_amplitudes.append(&mut self.noise_trigger_signals);
    batch.valid_amplitudes.append(&mut self.valid_trigger_signals);
    batch.coincidence_amplitudes.append(&mut self.voltage_signals);
    batch.double_pulse_taus.append(&mut self.double_pulse_taus);
    self.noise_trigger_signals = batch.noise_amplitudes;
    self.valid_trigger_signals = batch.valid_amplitudes;
    self.voltage_signals       = batch.coincidence_amplitudes;
    self.double_pulse_taus     = batch.double_pulse_taus;
  }

  /// The counters in the order of the summary lines
  pub fn summary(&self) -> String {
    format!("last evNR {}, Nval, Nacc, Nacc2, Nacc3: {}, {}, {}, {}",
            self.event_count,
            self.valid_count,
            self.coincidence_count,
            self.double_coincidence_count,
            self.triple_coincidence_count)
  }
}

impl fmt::Display for RunningStatistics {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<RunningStatistics:");
    repr += &(format!("\n  events seen          : {}", self.event_count));
    repr += &(format!("\n  valid trigger pulses : {}", self.valid_count));
    repr += &(format!("\n  accepted             : {}", self.coincidence_count));
    repr += &(format!("\n  -- 2-fold            : {}", self.double_coincidence_count));
    repr += &(format!("\n  -- 3-fold            : {}", self.triple_coincidence_count));
    repr += &(format!("\n  double pulses        : {}", self.double_pulse_count));
    repr += &(format!("\n  pending histo values : {}, {}, {}, {}>",
                      self.noise_trigger_signals.len(),
                      self.valid_trigger_signals.len(),
                      self.voltage_signals.len(),
                      self.double_pulse_taus.len()));
    write!(f, "{}", repr)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn take_and_restore() {
    let mut stats = RunningStatistics::new();
    stats.valid_trigger_signals.push(1.0);
    stats.double_pulse_taus.push(2.0);
    let batch = stats.take_histogram_batch();
    assert!(stats.valid_trigger_signals.is_empty());
    assert_eq!(batch.valid_amplitudes, vec![1.0]);
    stats.valid_trigger_signals.push(3.0);
    stats.restore_histogram_batch(batch);
    assert_eq!(stats.valid_trigger_signals, vec![1.0, 3.0]);
    assert_eq!(stats.double_pulse_taus, vec![2.0]);
  }
}
