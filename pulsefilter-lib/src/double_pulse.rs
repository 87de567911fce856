//! Search for subsequent pulses after the primary pulse
//!
//! Every channel, the trigger channel included, is searched 
//! from the end of the primary pulse to the end of the trace.
//! Instead of a single maximum, all local maxima of the 
//! correlation are candidates.

use crate::events::Event;
use crate::peak_search::{
    correlate,
    clamp_below,
    local_maxima,
    check_shape,
};
use crate::reference_pulse::ReferencePulse;
use crate::trigger::SearchGeometry;

/// A pulse found after the primary pulse
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SecondaryPulse {
  /// pulse height (V)
  pub voltage : f64,
  /// pulse time (µs)
  pub time    : f64,
}

/// All secondary pulses of an event, per channel 
/// in the order they were found
#[derive(Debug, Clone, PartialEq)]
pub struct DoublePulses {
  pub pulses : Vec<Vec<SecondaryPulse>>,
}

impl DoublePulses {

  pub fn has_double_pulse(&self) -> bool {
    self.pulses.iter().any(|ch| !ch.is_empty())
  }

  /// Number of channels with at least one secondary pulse
  pub fn n_channels_with_pulses(&self) -> usize {
    self.pulses.iter().filter(|ch| !ch.is_empty()).count()
  }

  /// Time difference of the last secondary pulse to the
  /// event time, per channel. 0 for channels without
  /// secondary pulse.
  pub fn last_delta_ts(&self, event_time : f64) -> Vec<f64> {
    self.pulses.iter()
               .map(|ch| ch.last().map_or(0.0, |p| p.time - event_time))
               .collect()
  }
  
  /// Height of the last secondary pulse per channel
  pub fn last_voltages(&self) -> Vec<f64> {
    self.pulses.iter()
               .map(|ch| ch.last().map_or(0.0, |p| p.voltage))
               .collect()
  }

  /// Mean of the last time differences over all channels
  /// which have a secondary pulse
  pub fn mean_tau(&self, event_time : f64) -> Option<f64> {
    let n = self.n_channels_with_pulses();
    if n == 0 {
      return None;
    }
    let sum : f64 = self.last_delta_ts(event_time).iter().sum();
    Some(sum/(n as f64))
  }
}

/// Search all channels for pulses after the primary pulse
///
/// # Arguments
///
/// * event    : the event to analyse
/// * peak     : sample index of the primary pulse
/// * geometry : for the sample times
/// * pulse    : reference pulse
pub fn find_double_pulses(event    : &Event,
                          peak     : usize,
                          geometry : &SearchGeometry,
                          pulse    : &ReferencePulse) -> DoublePulses {
  let offset = peak + pulse.len();
  let mut pulses = Vec::<Vec<SecondaryPulse>>::with_capacity(event.n_channels());
  for samples in event.samples.iter() {
    let mut found = Vec::<SecondaryPulse>::new();
    if offset < samples.len() {
      let mut correlation = correlate(&samples[offset..], pulse.kernel());
      clamp_below(&mut correlation, pulse.raw_threshold());
      for candidate in local_maxima(&correlation) {
        let index = candidate + offset;
        // by construction the candidate leaves room for the pulse
        if let Ok((true, voltage)) = check_shape(samples, index, pulse) {
          found.push(SecondaryPulse {
            voltage,
            time : geometry.sample_time(index),
          });
        }
      }
    }
    pulses.push(found);
  }
  DoublePulses { pulses }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::reference_pulse::PulseShape;

  fn setup() -> (SearchGeometry, ReferencePulse) {
    let shape = PulseShape::Trapezoid {
      rise_time : 8e-9,
      on_time   : 4e-9,
      fall_time : 16e-9,
    };
    let pulse    = ReferencePulse::synthesize(4e-9, &shape, -0.05).unwrap();
    let geometry = SearchGeometry::new(50, 2, 4e-9, &shape, pulse.len());
    (geometry, pulse)
  }

  fn add_pulse(trace : &mut Vec<f64>, pulse : &ReferencePulse, at : usize, scale : f64) {
    for (k, v) in pulse.kernel().iter().enumerate() {
      trace[at + k] += scale*v;
    }
  }

  #[test]
  fn finds_all_secondaries_in_order() {
    let (geometry, pulse) = setup();
    let mut samples = vec![vec![0.0; 300]; 2];
    add_pulse(&mut samples[0], &pulse, 50,  1.2);
    add_pulse(&mut samples[0], &pulse, 100, 1.5);
    add_pulse(&mut samples[0], &pulse, 150, 1.3);
    add_pulse(&mut samples[0], &pulse, 220, 1.6);
    let event  = Event::new(7, 0.0, samples);
    let result = find_double_pulses(&event, 50, &geometry, &pulse);
    assert!(result.has_double_pulse());
    assert_eq!(result.n_channels_with_pulses(), 1);
    let times : Vec<f64> = result.pulses[0].iter().map(|p| p.time).collect();
    assert_eq!(times.len(), 3);
    assert_eq!(times[0], geometry.sample_time(100));
    assert_eq!(times[1], geometry.sample_time(150));
    assert_eq!(times[2], geometry.sample_time(220));
    assert!(result.pulses[1].is_empty());
    // only the last pulse counts for the time difference
    let event_time = geometry.sample_time(50);
    let delta_ts   = result.last_delta_ts(event_time);
    assert!((delta_ts[0] - (geometry.sample_time(220) - event_time)).abs() < 1e-12);
    assert_eq!(delta_ts[1], 0.0);
    assert_eq!(result.mean_tau(event_time), Some(delta_ts[0]));
    assert!((result.last_voltages()[0] - 0.08).abs() < 1e-9);
  }

  #[test]
  fn quiet_trace_has_no_double_pulse() {
    let (geometry, pulse) = setup();
    let mut samples = vec![vec![0.0; 300]; 1];
    add_pulse(&mut samples[0], &pulse, 50,  1.2);
    let event  = Event::new(7, 0.0, samples);
    let result = find_double_pulses(&event, 50, &geometry, &pulse);
    assert!(!result.has_double_pulse());
    assert_eq!(result.mean_tau(0.0), None);
  }

  #[test]
  fn primary_at_end_of_trace() {
    let (geometry, pulse) = setup();
    let event  = Event::new(7, 0.0, vec![vec![0.0; 60]; 2]);
    let result = find_double_pulses(&event, 50, &geometry, &pulse);
    assert_eq!(result.pulses.len(), 2);
    assert!(!result.has_double_pulse());
  }
}
