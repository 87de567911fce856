//! Reference pulse for the correlation based pulse search
//!
//! The reference pulse is built from a piecewise linear
//! template, normalized to a pulse height of one:
//!
//! ```text
//!         ______
//!        /      \
//!   _ _ /_ _ _ _ \_ _ _ _ 
//!       r   on    f
//! ```
//!
//! The template is sampled with the sampling interval of 
//! the digitizer and scaled with the (typically negative)
//! pulse height.

use std::fmt;

use crate::constants::{
    MUONIC_LIFETIME_FRACTION,
    MUONIC_DECAY_STEPS,
};
use crate::errors::ConfigurationError;

/// Template shapes for the reference pulse. 
///
/// All times in seconds.
#[derive(Debug, Copy, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum PulseShape {
  /// Linear rise, flat top, linear fall
  Trapezoid {
    rise_time : f64,
    on_time   : f64,
    fall_time : f64,
  },
  /// Linear rise, flat top, then an exponential 
  /// decay with a lifetime of 0.3 x fall time, 
  /// linearly interpolated between the lifetimes
  Muonic {
    rise_time : f64,
    on_time   : f64,
    fall_time : f64,
  },
}

impl PulseShape {

  pub fn rise_time(&self) -> f64 {
    match self {
      PulseShape::Trapezoid {rise_time, ..} => *rise_time,
      PulseShape::Muonic    {rise_time, ..} => *rise_time,
    }
  }
  
  pub fn on_time(&self) -> f64 {
    match self {
      PulseShape::Trapezoid {on_time, ..} => *on_time,
      PulseShape::Muonic    {on_time, ..} => *on_time,
    }
  }

  /// The time span the reference pulse is sampled over
  pub fn duration(&self) -> f64 {
    match self {
      PulseShape::Trapezoid {rise_time, on_time, fall_time} |
      PulseShape::Muonic    {rise_time, on_time, fall_time} => {
        rise_time + on_time + fall_time
      }
    }
  }

  /// Anchor times and (normalized) amplitudes of the 
  /// piecewise linear template
  pub fn anchors(&self) -> (Vec<f64>, Vec<f64>) {
    match self {
      PulseShape::Trapezoid {rise_time, on_time, fall_time} => {
        let times  = vec![0.0,
                          *rise_time,
                          rise_time + on_time,
                          rise_time + on_time + fall_time];
        let values = vec![0.0, 1.0, 1.0, 0.0];
        (times, values)
      }
      PulseShape::Muonic {rise_time, on_time, fall_time} => {
        let lifetime   = MUONIC_LIFETIME_FRACTION*fall_time;
        let mut times  = vec![0.0, *rise_time, rise_time + on_time];
        let mut values = vec![0.0, 1.0, 1.0];
        for k in 1..MUONIC_DECAY_STEPS + 1 {
          times.push(rise_time + on_time + (k as f64)*lifetime);
          values.push(f64::exp(-(k as f64)));
        }
        (times, values)
      }
    }
  }
}

impl fmt::Display for PulseShape {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let name = match self {
      PulseShape::Trapezoid {..} => "Trapezoid",
      PulseShape::Muonic    {..} => "Muonic",
    };
    write!(f, "<PulseShape ({}) : rise {:.3e} s, on {:.3e} s, duration {:.3e} s>",
           name, self.rise_time(), self.on_time(), self.duration())
  }
}

/// Linear interpolation on sorted anchor points. 
/// Arguments outside of the anchor range are clamped.
fn interpolate(times : &[f64], values : &[f64], t : f64) -> f64 {
  let last = times.len() - 1;
  if t <= times[0] {
    return values[0];
  }
  if t >= times[last] {
    return values[last];
  }
  let mut k = 1;
  while times[k] < t {
    k += 1;
  }
  let frac = (t - times[k-1])/(times[k] - times[k-1]);
  values[k-1] + frac*(values[k] - values[k-1])
}

/// The discrete correlation kernel together with
/// the two acceptance thresholds derived from it.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePulse {
  kernel          : Vec<f64>,
  /// kernel with its own mean subtracted
  zero_normalized : Vec<f64>,
  /// sum of the squared kernel
  raw_threshold   : f64,
  /// sum of the squared mean-subtracted kernel
  shape_threshold : f64,
}

impl ReferencePulse {

  /// Build the reference pulse from a template shape.
  ///
  /// # Arguments
  ///
  /// * sampling_interval : time between two samples (s)
  /// * shape             : pulse template
  /// * pulse_height      : pulse height in Volt, negative
  ///                       for downward going pulses
  pub fn synthesize(sampling_interval : f64,
                    shape             : &PulseShape,
                    pulse_height      : f64)
    -> Result<ReferencePulse, ConfigurationError> {
    if !sampling_interval.is_finite() || sampling_interval <= 0.0 {
      return Err(ConfigurationError::InvalidSamplingInterval);
    }
    if !pulse_height.is_finite() || pulse_height == 0.0 {
      return Err(ConfigurationError::ZeroPulseHeight);
    }
    let (times, values) = shape.anchors();
    if times.iter().any(|t| !t.is_finite()) {
      return Err(ConfigurationError::NonMonotonicAnchors);
    }
    for k in 1..times.len() {
      if times[k] <= times[k-1] {
        return Err(ConfigurationError::NonMonotonicAnchors);
      }
    }
    let duration  = shape.duration();
    let n_samples = (duration/sampling_interval + 0.5) as usize + 1;
    if n_samples < 2 {
      return Err(ConfigurationError::KernelTooShort);
    }
    let step = duration/((n_samples - 1) as f64);
    let kernel : Vec<f64> = (0..n_samples)
      .map(|k| pulse_height*interpolate(&times, &values, (k as f64)*step))
      .collect();
    Self::from_kernel(kernel)
  }
  
  /// Use an arbitrary kernel as reference pulse
  pub fn from_kernel(kernel : Vec<f64>) -> Result<ReferencePulse, ConfigurationError> {
    if kernel.len() < 2 {
      return Err(ConfigurationError::KernelTooShort);
    }
    let mean = kernel.iter().sum::<f64>()/(kernel.len() as f64);
    let zero_normalized : Vec<f64> = kernel.iter().map(|k| k - mean).collect();
    let raw_threshold   = kernel.iter().map(|k| k*k).sum();
    let shape_threshold = zero_normalized.iter().map(|k| k*k).sum();
    Ok(ReferencePulse {
      kernel,
      zero_normalized,
      raw_threshold,
      shape_threshold,
    })
  }

  pub fn len(&self) -> usize {
    self.kernel.len()
  }

  pub fn kernel(&self) -> &[f64] {
    &self.kernel
  }

  pub fn zero_normalized(&self) -> &[f64] {
    &self.zero_normalized
  }

  pub fn raw_threshold(&self) -> f64 {
    self.raw_threshold
  }

  pub fn shape_threshold(&self) -> f64 {
    self.shape_threshold
  }
}

impl fmt::Display for ReferencePulse {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let kernel : Vec<String> = self.kernel.iter().map(|k| format!("{:.4}", k)).collect();
    let mut repr = String::from("<ReferencePulse:");
    repr += &(format!("\n  length     : {}", self.len()));
    repr += &(format!("\n  kernel     : [{}]", kernel.join(", ")));
    repr += &(format!("\n  thresholds : {:.2e}, {:.2e}>", self.raw_threshold, self.shape_threshold));
    write!(f, "{}", repr)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn trapezoid() -> PulseShape {
    PulseShape::Trapezoid {
      rise_time : 8e-9,
      on_time   : 4e-9,
      fall_time : 16e-9,
    }
  }

  #[test]
  fn trapezoid_is_sampled_on_a_uniform_grid() {
    let pulse = ReferencePulse::synthesize(4e-9, &trapezoid(), -1.0).unwrap();
    let expected = [0.0, -0.5, -1.0, -1.0, -0.75, -0.5, -0.25, 0.0];
    assert_eq!(pulse.len(), expected.len());
    for (k, e) in pulse.kernel().iter().zip(expected.iter()) {
      assert!((k - e).abs() < 1e-9, "{} != {}", k, e);
    }
    assert!((pulse.raw_threshold() - 3.125).abs() < 1e-9);
  }

  #[test]
  fn thresholds_are_ordered() {
    let shapes = [trapezoid(),
                  PulseShape::Muonic { rise_time : 20e-9, on_time : 12e-9, fall_time : 128e-9 }];
    for shape in shapes {
      for height in [-0.035, -1.0, 0.2] {
        let pulse = ReferencePulse::synthesize(4e-9, &shape, height).unwrap();
        assert!(pulse.raw_threshold() >= pulse.shape_threshold());
        assert!(pulse.shape_threshold() >= 0.0);
        let kmax = pulse.kernel().iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let kmin = pulse.kernel().iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(kmax <= height.abs() + 1e-12);
        assert!(kmin >= f64::min(0.0, height) - 1e-12);
      }
    }
  }

  #[test]
  fn muonic_tail_decays() {
    let shape = PulseShape::Muonic { rise_time : 20e-9, on_time : 12e-9, fall_time : 128e-9 };
    let pulse = ReferencePulse::synthesize(4e-9, &shape, 1.0).unwrap();
    // rise is 5 samples, flat top ends at sample 8
    let tail = &pulse.kernel()[8..];
    for k in 1..tail.len() {
      assert!(tail[k] < tail[k-1]);
    }
    assert!(*tail.last().unwrap() > 0.0);
  }

  #[test]
  fn invalid_parameters_are_rejected() {
    assert_eq!(ReferencePulse::synthesize(4e-9, &trapezoid(), 0.0),
               Err(ConfigurationError::ZeroPulseHeight));
    assert_eq!(ReferencePulse::synthesize(0.0, &trapezoid(), -1.0),
               Err(ConfigurationError::InvalidSamplingInterval));
    let flat = PulseShape::Trapezoid { rise_time : 8e-9, on_time : 0.0, fall_time : 16e-9 };
    assert_eq!(ReferencePulse::synthesize(4e-9, &flat, -1.0),
               Err(ConfigurationError::NonMonotonicAnchors));
    let backwards = PulseShape::Trapezoid { rise_time : 8e-9, on_time : 4e-9, fall_time : -16e-9 };
    assert_eq!(ReferencePulse::synthesize(4e-9, &backwards, -1.0),
               Err(ConfigurationError::NonMonotonicAnchors));
    assert_eq!(ReferencePulse::from_kernel(vec![1.0]),
               Err(ConfigurationError::KernelTooShort));
  }
}
