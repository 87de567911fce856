//! Single slot output feeds for live monitoring
//!
//! A push only succeeds if the consumer has already taken
//! the previous value, otherwise the new value is dropped.
//! Staleness is acceptable for the monitoring consumers,
//! the text log files are the lossless record.
//!
//! The feeds are independent, a full display feed never 
//! affects the histogram feed and vice versa.

use std::fmt;

use crossbeam_channel::{
    bounded,
    Sender,
    Receiver,
    TrySendError,
};

/// A push which did not go through. The
/// value is handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedError<T> {
  /// The consumer did not take the previous value yet
  Full(T),
  /// The consumer went away
  Disconnected(T),
}

impl<T> FeedError<T> {
  pub fn into_inner(self) -> T {
    match self {
      FeedError::Full(item)         => item,
      FeedError::Disconnected(item) => item,
    }
  }
}

impl<T> fmt::Display for FeedError<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      FeedError::Full(_)         => write!(f, "<FeedError : Full>"),
      FeedError::Disconnected(_) => write!(f, "<FeedError : Disconnected>"),
    }
  }
}

/// Something which takes values without ever blocking
pub trait Sink<T> : Send {
  fn offer(&self, item : T) -> Result<(), FeedError<T>>;
}

/// Capacity one handoff slot
#[derive(Debug, Clone)]
pub struct SlotFeed<T> {
  sender : Sender<T>,
}

impl<T : Send> Sink<T> for SlotFeed<T> {
  fn offer(&self, item : T) -> Result<(), FeedError<T>> {
    match self.sender.try_send(item) {
      Ok(_)                               => Ok(()),
      Err(TrySendError::Full(item))         => Err(FeedError::Full(item)),
      Err(TrySendError::Disconnected(item)) => Err(FeedError::Disconnected(item)),
    }
  }
}

/// Create a new feed and the receiving end for its consumer
pub fn slot_feed<T>() -> (SlotFeed<T>, Receiver<T>) {
  let (sender, receiver) = bounded(1);
  (SlotFeed { sender }, receiver)
}

/// Information for a rate meter
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RateUpdate {
  /// number of accepted events so far
  pub n_accepted : usize,
  /// timestamp of the last accepted event (s)
  pub event_time : f64,
}

/// Quantities to be histogrammed, collected since
/// the last successful handoff
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramBatch {
  /// pulse heights of rejected trigger candidates
  pub noise_amplitudes       : Vec<f64>,
  /// pulse heights of validated triggers
  pub valid_amplitudes       : Vec<f64>,
  /// pulse heights on the non-trigger channels
  pub coincidence_amplitudes : Vec<f64>,
  /// time differences of double pulses (µs)
  pub double_pulse_taus      : Vec<f64>,
}

impl fmt::Display for HistogramBatch {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<HistogramBatch : {} noise, {} valid, {} coincident, {} double pulses>",
           self.noise_amplitudes.len(),
           self.valid_amplitudes.len(),
           self.coincidence_amplitudes.len(),
           self.double_pulse_taus.len())
  }
}

/// What a waveform on the display feed shows
#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum DisplayTag {
  Noise     = 0,
  Rejected  = 1,
  Accepted  = 2,
  Reference = 3,
}

impl fmt::Display for DisplayTag {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = match self {
      DisplayTag::Noise     => "Noise",
      DisplayTag::Rejected  => "Rejected",
      DisplayTag::Accepted  => "Accepted",
      DisplayTag::Reference => "Reference",
    };
    write!(f, "{}", repr)
  }
}

/// A tagged waveform for the pulse display
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySnapshot {
  pub tag      : DisplayTag,
  pub waveform : Vec<f64>,
}

/// The four feeds a pulse processor serves. Feeds which
/// are not connected are simply skipped.
#[derive(Default)]
pub struct OutputFeeds {
  pub rate      : Option<Box<dyn Sink<RateUpdate>>>,
  pub histogram : Option<Box<dyn Sink<HistogramBatch>>>,
  pub voltages  : Option<Box<dyn Sink<Vec<f64>>>>,
  pub display   : Option<Box<dyn Sink<DisplaySnapshot>>>,
}

impl OutputFeeds {

  /// No consumers at all
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_rate(&self, update : RateUpdate) -> bool {
    match &self.rate {
      None       => false,
      Some(sink) => sink.offer(update).is_ok(),
    }
  }

  /// If the batch could not be delivered, it is handed
  /// back. Without a consumer the feed counts as 
  /// disconnected.
  pub fn push_histogram(&self, batch : HistogramBatch) -> Result<(), FeedError<HistogramBatch>> {
    match &self.histogram {
      None       => Err(FeedError::Disconnected(batch)),
      Some(sink) => sink.offer(batch),
    }
  }

  pub fn push_voltages(&self, voltages : Vec<f64>) -> bool {
    match &self.voltages {
      None       => false,
      Some(sink) => sink.offer(voltages).is_ok(),
    }
  }

  pub fn push_display(&self, tag : DisplayTag, waveform : Vec<f64>) -> bool {
    match &self.display {
      None       => false,
      Some(sink) => {
        match sink.offer(DisplaySnapshot {tag, waveform}) {
          Ok(_)    => true,
          Err(err) => {
            trace!("Dropped {} waveform, {}", tag, err);
            false
          }
        }
      }
    }
  }
}
