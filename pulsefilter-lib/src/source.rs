//! Event sources the pulse processor can consume from
//!
//! A source hands out one event at a time and signals 
//! the end of the stream with `None`. Sources are also 
//! the place where diagnostic messages of the processor 
//! end up.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{
    self,
    BufRead,
    BufReader,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use crate::events::Event;

/// Receiver of human readable status messages
pub trait DiagnosticLog {
  fn prlog(&self, message : &str) {
    info!("{}", message);
  }
}

/// Forward diagnostic messages to the logger
#[derive(Debug, Default, Copy, Clone)]
pub struct LogCrateSink;

impl DiagnosticLog for LogCrateSink {}

/// Provider of waveform events
pub trait EventSource : DiagnosticLog {
  /// The next event, None once the stream is exhausted
  fn next_event(&mut self, consumer_id : &str) -> Option<Event>;
  /// False, once the source has been shut down
  fn is_active(&self) -> bool;
}

/// Events from memory
#[derive(Debug, Default, Clone)]
pub struct VecEventSource {
  events : VecDeque<Event>,
}

impl VecEventSource {
  pub fn new(events : Vec<Event>) -> Self {
    Self {
      events : VecDeque::from(events),
    }
  }

  pub fn push(&mut self, event : Event) {
    self.events.push_back(event);
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }
  
  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }
}

impl DiagnosticLog for VecEventSource {}

impl EventSource for VecEventSource {
  fn next_event(&mut self, _consumer_id : &str) -> Option<Event> {
    self.events.pop_front()
  }

  fn is_active(&self) -> bool {
    true
  }
}

/// Events from a file with one json encoded event per line
pub struct JsonEventSource {
  lines     : io::Lines<BufReader<File>>,
  stop_flag : Arc<AtomicBool>,
  n_read    : usize,
}

impl JsonEventSource {
  
  pub fn open(filename : &Path) -> io::Result<Self> {
    let file = File::open(filename)?;
    info!("Reading events from {}", filename.display());
    Ok(Self {
      lines     : BufReader::new(file).lines(),
      stop_flag : Arc::new(AtomicBool::new(false)),
      n_read    : 0,
    })
  }

  /// Setting this flag shuts the source down
  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    self.stop_flag.clone()
  }

  /// Number of events decoded so far
  pub fn n_read(&self) -> usize {
    self.n_read
  }
}

impl DiagnosticLog for JsonEventSource {}

impl EventSource for JsonEventSource {
  fn next_event(&mut self, consumer_id : &str) -> Option<Event> {
    loop {
      let line = match self.lines.next()? {
        Err(err) => {
          error!("Unable to read line for {}! {}", consumer_id, err);
          return None;
        }
        Ok(line) => line,
      };
      if line.trim().is_empty() {
        continue;
      }
      match serde_json::from_str::<Event>(&line) {
        Err(err) => {
          error!("Unable to decode event! {}", err);
        }
        Ok(event) => {
          self.n_read += 1;
          return Some(event);
        }
      }
    }
  }

  fn is_active(&self) -> bool {
    !self.stop_flag.load(Ordering::Relaxed)
  }
}

#[cfg(feature = "random")]
pub use simulation::SimulatedEventSource;

#[cfg(feature = "random")]
mod simulation {
  use super::*;
  use rand::Rng;
  use rand_distr::{
      Distribution,
      Normal,
  };

  use crate::errors::ConfigurationError;
  use crate::reference_pulse::ReferencePulse;

  /// Toy detector with noise, primary pulses around the 
  /// trigger point and occasional delayed secondary pulses
  pub struct SimulatedEventSource {
    pulse             : Vec<f64>,
    n_channels        : usize,
    n_samples         : usize,
    trigger_index     : usize,
    sampling_interval : f64,
    /// baseline noise (V)
    noise             : Normal<f64>,
    /// probability for a secondary pulse per event
    pub decay_prob    : f64,
    /// probability for a channel to see the primary pulse
    pub efficiency    : f64,
    n_events          : Option<u64>,
    event_id          : u64,
    stop_flag         : Arc<AtomicBool>,
  }

  impl SimulatedEventSource {

    /// # Arguments
    ///
    /// * pulse             : pulse shape to inject
    /// * n_channels        : channels per event
    /// * n_samples         : samples per trace
    /// * trigger_index     : sample the primary pulse is placed at
    /// * sampling_interval : time between samples (s)
    /// * noise_level       : standard deviation of the baseline noise (V)
    /// * n_events          : stop after this many events, None for endless
    pub fn new(pulse             : &ReferencePulse,
               n_channels        : usize,
               n_samples         : usize,
               trigger_index     : usize,
               sampling_interval : f64,
               noise_level       : f64,
               n_events          : Option<u64>) -> Result<Self, ConfigurationError> {
      if n_channels == 0 {
        return Err(ConfigurationError::NoChannels);
      }
      let noise = match Normal::new(0.0, noise_level) {
        Err(err) => {
          error!("Can not simulate noise with sigma {}! {}", noise_level, err);
          return Err(ConfigurationError::InvalidNoiseLevel);
        }
        Ok(noise) => noise,
      };
      Ok(Self {
        pulse         : pulse.kernel().to_vec(),
        n_channels,
        n_samples,
        trigger_index,
        sampling_interval,
        noise,
        decay_prob    : 0.1,
        efficiency    : 0.9,
        n_events,
        event_id      : 0,
        stop_flag     : Arc::new(AtomicBool::new(false)),
      })
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
      self.stop_flag.clone()
    }

    fn add_pulse(&self, trace : &mut [f64], start : usize, scale : f64) {
      for (k, v) in self.pulse.iter().enumerate() {
        if start + k >= trace.len() {
          break;
        }
        trace[start + k] += scale*v;
      }
    }

    pub fn generate(&mut self) -> Event {
      let mut rng   = rand::thread_rng();
      self.event_id += 1;
      let mut samples = Vec::<Vec<f64>>::with_capacity(self.n_channels);
      for _ in 0..self.n_channels {
        let trace : Vec<f64> = self.noise.sample_iter(&mut rng)
                                         .take(self.n_samples)
                                         .collect();
        samples.push(trace);
      }
      let start = self.trigger_index - usize::min(self.trigger_index, 1);
      for (ch, trace) in samples.iter_mut().enumerate() {
        // the first channel triggered the readout
        if ch == 0 || rng.gen::<f64>() < self.efficiency {
          let scale = rng.gen_range(1.2..3.0);
          self.add_pulse(trace, start, scale);
        }
      }
      if rng.gen::<f64>() < self.decay_prob {
        let tail  = self.n_samples.saturating_sub(start + 2*self.pulse.len());
        if tail > 0 {
          let delay = self.pulse.len() + rng.gen_range(0..tail);
          let ch    = rng.gen_range(0..self.n_channels);
          let scale = rng.gen_range(1.2..2.0);
          self.add_pulse(&mut samples[ch], start + delay, scale);
        }
      }
      let timestamp = self.event_id as f64 * 1000.0 * self.sampling_interval;
      Event::new(self.event_id, timestamp, samples)
    }
  }

  impl DiagnosticLog for SimulatedEventSource {}

  impl EventSource for SimulatedEventSource {
    fn next_event(&mut self, _consumer_id : &str) -> Option<Event> {
      if let Some(n_events) = self.n_events {
        if self.event_id >= n_events {
          return None;
        }
      }
      Some(self.generate())
    }

    fn is_active(&self) -> bool {
      !self.stop_flag.load(Ordering::Relaxed)
    }
  }
}
