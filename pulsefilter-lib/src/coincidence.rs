//! Coincidences on the non-trigger channels
//!
//! Every channel other than the trigger channel is searched
//! in a window starting shortly before the validated trigger
//! peak. The trigger channel itself always counts as one.

use crate::errors::AnalysisError;
use crate::events::Event;
use crate::peak_search::{
    find_peak,
    check_shape,
};
use crate::reference_pulse::ReferencePulse;
use crate::trigger::SearchGeometry;

/// Pulses found in coincidence with the trigger pulse
#[derive(Debug, Clone, PartialEq)]
pub struct Coincidences {
  /// number of channels with a pulse, trigger included
  pub count      : usize,
  /// pulse height per channel, 0 where no pulse was found
  pub voltages   : Vec<f64>,
  /// pulse time per channel (µs), 0 where no pulse was found
  pub times      : Vec<f64>,
  /// mean time of all pulses (µs)
  pub event_time : f64,
}

impl Coincidences {

  /// Pulse heights on the channels which are not the trigger 
  pub fn coincident_voltages(&self, trigger_channel : usize) -> Vec<f64> {
    self.voltages.iter()
                 .enumerate()
                 .filter(|(ch, v)| *ch != trigger_channel && **v > 0.0)
                 .map(|(_, v)| *v)
                 .collect()
  }
}

/// Search all non-trigger channels for pulses near the trigger peak
///
/// # Arguments
///
/// * event             : the event to analyse
/// * trigger_channel   : index of the channel the trigger pulse was found in
/// * peak              : sample index of the trigger pulse
/// * trigger_amplitude : height of the trigger pulse
/// * geometry          : search windows
/// * pulse             : reference pulse
pub fn find_coincidences(event             : &Event,
                         trigger_channel   : usize,
                         peak              : usize,
                         trigger_amplitude : f64,
                         geometry          : &SearchGeometry,
                         pulse             : &ReferencePulse)
  -> Result<Coincidences, AnalysisError> {
  let n_channels   = event.n_channels();
  let mut voltages = vec![0.0; n_channels];
  let mut times    = vec![0.0; n_channels];
  let mut count    = 1usize;
  voltages[trigger_channel] = trigger_amplitude;
  times[trigger_channel]    = geometry.sample_time(peak);
  let mut time_sum          = times[trigger_channel];
  let (lo, hi) = geometry.coincidence_window(peak);
  for ch in 0..n_channels {
    if ch == trigger_channel {
      continue;
    }
    let samples = &event.samples[ch];
    let candidate = match find_peak(samples, lo, hi, pulse) {
      Ok((candidate, _)) => candidate,
      Err(AnalysisError::WindowTooShort) => {
        trace!("Coincidence window [{}, {}) too short for ch {}", lo, hi, ch);
        continue;
      }
      Err(err) => {
        return Err(err);
      }
    };
    if !geometry.is_admissible(candidate) {
      trace!("No pulse near trigger in ch {}", ch);
      continue;
    }
    let (passed, amplitude) = check_shape(samples, candidate, pulse)?;
    if passed {
      trace!("Coincidence in channel {}", ch);
      count        += 1;
      voltages[ch]  = amplitude;
      times[ch]     = geometry.sample_time(candidate);
      time_sum     += times[ch];
    }
  }
  Ok(Coincidences {
    count,
    voltages,
    times,
    event_time : time_sum/(count as f64),
  })
}
