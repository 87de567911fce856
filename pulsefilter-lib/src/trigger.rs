//! Validation of the pulse on the trigger channel
//!
//! The search window is anchored on the pretrigger
//! position of the trace. A candidate found too late 
//! after the trigger point is noise, otherwise the
//! shape check decides if the pulse is accepted.

use std::fmt;

use crate::constants::SECONDS_TO_MICROSECONDS;
use crate::errors::AnalysisError;
use crate::feeds::DisplayTag;
use crate::peak_search::{
    find_peak,
    check_shape,
};
use crate::reference_pulse::{
    PulseShape,
    ReferencePulse,
};

/// Sample positions of the search windows
///
/// All indices in samples, times in seconds
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SearchGeometry {
  /// sample number of the trigger point
  pub trigger_index     : usize,
  /// slack of the search windows
  pub sample_offset     : usize,
  /// rise time of the reference pulse in samples 
  pub rise_samples      : usize,
  /// candidates with a peak index larger than this
  /// are not associated with the trigger
  pub max_peak_index    : f64,
  pub sampling_interval : f64,
  /// length of the reference pulse
  pub pulse_len         : usize,
}

impl SearchGeometry {

  pub fn new(trigger_index     : usize,
             sample_offset     : usize,
             sampling_interval : f64,
             shape             : &PulseShape,
             pulse_len         : usize) -> Self {
    let rise_samples   = (shape.rise_time()/sampling_interval) as usize;
    let max_peak_index = trigger_index as f64
                       + (shape.rise_time() + shape.on_time())/sampling_interval
                       + sample_offset as f64;
    Self {
      trigger_index,
      sample_offset,
      rise_samples,
      max_peak_index,
      sampling_interval,
      pulse_len,
    }
  }

  /// The window `[lo, hi)` for the trigger pulse search
  pub fn trigger_window(&self) -> (usize, usize) {
    let lo = self.trigger_index.saturating_sub(self.rise_samples + self.sample_offset);
    (lo, self.window_end())
  }
  
  /// The window `[lo, hi)` for the coincidence search
  /// around an already validated peak
  pub fn coincidence_window(&self, peak : usize) -> (usize, usize) {
    (peak.saturating_sub(self.sample_offset), self.window_end())
  }

  fn window_end(&self) -> usize {
    self.trigger_index + self.sample_offset + self.pulse_len
  }

  /// Every trace has to be at least this long
  pub fn required_trace_len(&self) -> usize {
    self.window_end()
  }

  /// Is the peak close enough to the trigger point
  pub fn is_admissible(&self, peak : usize) -> bool {
    peak as f64 <= self.max_peak_index
  }

  /// Time of a sample in microseconds
  pub fn sample_time(&self, index : usize) -> f64 {
    index as f64 * self.sampling_interval * SECONDS_TO_MICROSECONDS
  }
}

/// The two terminal states of the trigger validation
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TriggerOutcome {
  /// No pulse near the trigger point
  Noise    { peak : usize },
  /// Pulse candidate with the wrong shape
  Rejected { peak : usize, amplitude : f64 },
  Accepted { peak : usize, amplitude : f64 },
}

impl TriggerOutcome {
  
  pub fn peak(&self) -> usize {
    match self {
      TriggerOutcome::Noise    {peak}       => *peak,
      TriggerOutcome::Rejected {peak, ..}   => *peak,
      TriggerOutcome::Accepted {peak, ..}   => *peak,
    }
  }

  /// Signal height, 0 for noise
  pub fn amplitude(&self) -> f64 {
    match self {
      TriggerOutcome::Noise    {..}           => 0.0,
      TriggerOutcome::Rejected {amplitude, ..} => *amplitude,
      TriggerOutcome::Accepted {amplitude, ..} => *amplitude,
    }
  }

  pub fn is_accepted(&self) -> bool {
    matches!(self, TriggerOutcome::Accepted {..})
  }

  pub fn display_tag(&self) -> DisplayTag {
    match self {
      TriggerOutcome::Noise    {..} => DisplayTag::Noise,
      TriggerOutcome::Rejected {..} => DisplayTag::Rejected,
      TriggerOutcome::Accepted {..} => DisplayTag::Accepted,
    }
  }

  /// The part of the trace which is shown on the display:
  /// the full search window for noise, the pulse otherwise
  pub fn snapshot(&self, samples : &[f64], geometry : &SearchGeometry) -> Vec<f64> {
    let (lo, hi) = match self {
      TriggerOutcome::Noise {..} => geometry.trigger_window(),
      _                          => (self.peak(), self.peak() + geometry.pulse_len),
    };
    let hi = usize::min(hi, samples.len());
    let lo = usize::min(lo, hi);
    samples[lo..hi].to_vec()
  }
}

impl fmt::Display for TriggerOutcome {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      TriggerOutcome::Noise    {peak} => write!(f, "<TriggerOutcome : Noise (peak {})>", peak),
      TriggerOutcome::Rejected {peak, amplitude} => write!(f, "<TriggerOutcome : Rejected (peak {}, {:.4} V)>", peak, amplitude),
      TriggerOutcome::Accepted {peak, amplitude} => write!(f, "<TriggerOutcome : Accepted (peak {}, {:.4} V)>", peak, amplitude),
    }
  }
}

/// Search the trigger channel for the primary pulse
///
/// # Arguments
///
/// * samples  : trace of the trigger channel
/// * geometry : search windows
/// * pulse    : reference pulse
pub fn validate_trigger(samples  : &[f64],
                        geometry : &SearchGeometry,
                        pulse    : &ReferencePulse)
  -> Result<TriggerOutcome, AnalysisError> {
  let (lo, hi) = geometry.trigger_window();
  let (peak, _) = find_peak(samples, lo, hi, pulse)?;
  trace!("Trigger peak at {} in window [{}, {})", peak, lo, hi);
  if !geometry.is_admissible(peak) {
    return Ok(TriggerOutcome::Noise {peak});
  }
  let (passed, amplitude) = check_shape(samples, peak, pulse)?;
  if passed {
    Ok(TriggerOutcome::Accepted {peak, amplitude})
  } else {
    Ok(TriggerOutcome::Rejected {peak, amplitude})
  }
}
