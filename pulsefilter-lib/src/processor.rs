//! The event processor drives the analysis of a single event
//! through trigger validation, coincidence and double pulse 
//! search and takes care of all the bookkeeping.
//!
//! The analysis itself (`detect`) is a pure function of the
//! event. Everything with side effects (counters, log files,
//! output feeds) happens in `process`.

use std::fmt;
use std::path::Path;

use crate::coincidence::{
    Coincidences,
    find_coincidences,
};
use crate::constants::PROGRESS_INTERVAL;
use crate::double_pulse::{
    DoublePulses,
    find_double_pulses,
};
use crate::errors::{
    AnalysisError,
    ConfigurationError,
    PulseFilterError,
};
use crate::events::Event;
use crate::feeds::{
    DisplayTag,
    FeedError,
    OutputFeeds,
    RateUpdate,
};
use crate::pulse_log::{
    PulseLogs,
    format_pulse_line,
    format_double_pulse_line,
};
use crate::reference_pulse::ReferencePulse;
use crate::settings::PulseFilterSettings;
use crate::source::{
    DiagnosticLog,
    EventSource,
};
use crate::statistics::RunningStatistics;
use crate::trigger::{
    SearchGeometry,
    TriggerOutcome,
    validate_trigger,
};

/// Everything the analysis found out about one event
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
  pub trigger            : TriggerOutcome,
  /// the trigger pulse passed the shape check
  pub validated          : bool,
  /// sample index of the validated trigger pulse
  pub first_peak_index   : Option<usize>,
  pub first_peak_voltage : f64,
  /// only searched for validated events, or without
  /// trigger channel if there are other channels
  pub coincidences       : Option<Coincidences>,
  pub accepted           : bool,
  /// only searched for accepted events
  pub double_pulses      : Option<DoublePulses>,
}

impl DetectionResult {
  
  /// Number of channels with a pulse, 
  /// the trigger channel always counts
  pub fn coincidence_count(&self) -> usize {
    self.coincidences.as_ref().map_or(1, |c| c.count)
  }

  /// Mean pulse time (µs)
  pub fn event_time(&self) -> Option<f64> {
    self.coincidences.as_ref().map(|c| c.event_time)
  }
}

impl fmt::Display for DetectionResult {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<DetectionResult:");
    repr += &(format!("\n  trigger     : {}", self.trigger));
    repr += &(format!("\n  validated   : {}", self.validated));
    repr += &(format!("\n  accepted    : {}", self.accepted));
    repr += &(format!("\n  coincidence : {}", self.coincidence_count()));
    if let Some(dp) = &self.double_pulses {
      repr += &(format!("\n  double pulse channels : {}", dp.n_channels_with_pulses()));
    }
    write!(f, "{}>", repr)
  }
}

/// Analysis of the events of a single consumer
///
/// Each processor owns its statistics and log files,
/// independent processors share nothing.
pub struct PulseProcessor {
  pulse           : ReferencePulse,
  geometry        : SearchGeometry,
  n_channels      : usize,
  /// None for trigger-less mode
  trigger_channel : Option<usize>,
  consumer_id     : String,
  verbosity       : u8,
  stats           : RunningStatistics,
  feeds           : OutputFeeds,
  logs            : Option<PulseLogs>,
}

impl PulseProcessor {

  /// Build the reference pulse and the search windows.
  /// 
  /// The reference kernel is sent to the display feed
  /// right away. If `log_pulses` is set, the log files are
  /// created in `log_dir`.
  pub fn new(settings : &PulseFilterSettings,
             feeds    : OutputFeeds) -> Result<PulseProcessor, PulseFilterError> {
    let n_channels = settings.n_channels();
    if n_channels == 0 {
      return Err(ConfigurationError::NoChannels.into());
    }
    let trigger_channel = settings.trigger_channel_index()?;
    let shape    = settings.pulse.to_shape();
    let pulse    = ReferencePulse::synthesize(settings.sampling_interval,
                                              &shape,
                                              settings.pulse.pulse_height)?;
    let geometry = SearchGeometry::new(settings.trigger_index(),
                                       settings.sample_offset,
                                       settings.sampling_interval,
                                       &shape,
                                       pulse.len());
    if geometry.required_trace_len() > settings.n_samples {
      error!("Search window ends at {}, but traces have only {} samples!",
             geometry.required_trace_len(), settings.n_samples);
      return Err(ConfigurationError::TriggerIndexOutOfRange.into());
    }
    let logs = if settings.log_pulses {
      Some(PulseLogs::create(Path::new(&settings.log_dir))?)
    } else {
      None
    };
    if settings.verbosity > 1 {
      info!("{}", shape);
      info!("{}", pulse);
      info!("Trigger window [{}, {}), max peak index {:.1}",
            geometry.trigger_window().0,
            geometry.trigger_window().1,
            geometry.max_peak_index);
    }
    feeds.push_display(DisplayTag::Reference, pulse.kernel().to_vec());
    Ok(PulseProcessor {
      pulse,
      geometry,
      n_channels,
      trigger_channel,
      consumer_id : settings.consumer_id.clone(),
      verbosity   : settings.verbosity,
      stats       : RunningStatistics::new(),
      feeds,
      logs,
    })
  }

  /// Write to the given log files instead
  pub fn with_logs(mut self, logs : PulseLogs) -> Self {
    self.logs = Some(logs);
    self
  }

  /// Use different search windows, e.g. a tighter
  /// limit for the trigger peak
  pub fn with_geometry(mut self, geometry : SearchGeometry) -> Self {
    self.geometry = geometry;
    self
  }

  pub fn statistics(&self) -> &RunningStatistics {
    &self.stats
  }

  pub fn reference_pulse(&self) -> &ReferencePulse {
    &self.pulse
  }

  pub fn geometry(&self) -> &SearchGeometry {
    &self.geometry
  }

  /// The channel the primary pulse is searched in
  fn anchor_channel(&self) -> usize {
    self.trigger_channel.unwrap_or(0)
  }

  /// Events have to match the configured channels and 
  /// hold the full search windows
  pub fn check_event(&self, event : &Event) -> Result<(), AnalysisError> {
    if event.n_channels() != self.n_channels {
      error!("Event {} has {} channels, expected {}!", event.event_id, event.n_channels(), self.n_channels);
      return Err(AnalysisError::WrongChannelCount);
    }
    if event.min_trace_len() < self.geometry.required_trace_len() {
      error!("Event {} has traces with {} samples, need at least {}!",
             event.event_id, event.min_trace_len(), self.geometry.required_trace_len());
      return Err(AnalysisError::TraceTooShort);
    }
    Ok(())
  }

  /// Analyse an event without touching any state
  pub fn detect(&self, event : &Event) -> Result<DetectionResult, AnalysisError> {
    self.check_event(event)?;
    let anchor  = self.anchor_channel();
    let trigger = validate_trigger(&event.samples[anchor], &self.geometry, &self.pulse)?;
    let mut result = DetectionResult {
      trigger,
      validated          : false,
      first_peak_index   : None,
      first_peak_voltage : trigger.amplitude(),
      coincidences       : None,
      accepted           : false,
      double_pulses      : None,
    };
    if let TriggerOutcome::Noise {..} = trigger {
      return Ok(result);
    }
    result.validated = trigger.is_accepted();
    if result.validated {
      result.first_peak_index = Some(trigger.peak());
    }
    // without trigger channel the shape is not enforced,
    // as long as other channels can confirm the pulse
    let confirmable = self.trigger_channel.is_none() && self.n_channels > 1;
    if !result.validated && !confirmable {
      return Ok(result);
    }
    let peak  = trigger.peak();
    let coinc = find_coincidences(event,
                                  anchor,
                                  peak,
                                  trigger.amplitude(),
                                  &self.geometry,
                                  &self.pulse)?;
    result.accepted = self.n_channels == 1 || coinc.count >= 2;
    result.coincidences = Some(coinc);
    if result.accepted {
      result.double_pulses = Some(find_double_pulses(event, peak, &self.geometry, &self.pulse));
    }
    Ok(result)
  }

  /// Analyse an event and update statistics, logs and feeds
  ///
  /// # Returns
  ///
  /// true if the event is accepted
  pub fn process(&mut self,
                 event  : &Event,
                 prlog  : &dyn DiagnosticLog) -> Result<bool, PulseFilterError> {
    self.stats.event_count += 1;
    let result = self.detect(event)?;
    let anchor = self.anchor_channel();
    let snapshot = result.trigger.snapshot(&event.samples[anchor], &self.geometry);
    self.feeds.push_display(result.trigger.display_tag(), snapshot);
    if self.verbosity > 1 {
      prlog.prlog(&format!("** {} event {}, {}", self.consumer_id, event.event_id, result.trigger));
    }
    let accepted = self.record(event, &result, prlog)?;
    if self.verbosity > 0 && self.stats.event_count % PROGRESS_INTERVAL == 0 {
      prlog.prlog(&format!("** {} evNR {}, Nval, Nacc, Nacc2, Nacc3: {}, {}, {}, {}",
                           self.consumer_id,
                           self.stats.event_count,
                           self.stats.valid_count,
                           self.stats.coincidence_count,
                           self.stats.double_coincidence_count,
                           self.stats.triple_coincidence_count));
    }
    Ok(accepted)
  }

  /// Book the result of the analysis into counters, 
  /// log files and output feeds
  fn record(&mut self,
            event  : &Event,
            result : &DetectionResult,
            prlog  : &dyn DiagnosticLog) -> Result<bool, PulseFilterError> {
    let anchor = self.anchor_channel();
    if result.validated {
      self.stats.valid_count += 1;
      self.stats.valid_trigger_signals.push(result.first_peak_voltage);
    } else {
      self.stats.noise_trigger_signals.push(result.trigger.amplitude());
    }

    let coinc = match &result.coincidences {
      Some(coinc) => coinc,
      None        => return Ok(false),
    };
    if self.verbosity > 1 {
      for (ch, v) in coinc.voltages.iter().enumerate() {
        if ch != anchor && *v > 0.0 {
          prlog.prlog(&format!("** {} coincidence in channel {}, {:.3} V", self.consumer_id, ch, v));
        }
      }
    }
    self.stats.voltage_signals.extend(coinc.coincident_voltages(anchor));
    if !result.accepted {
      return Ok(false);
    }
    self.stats.coincidence_count += 1;
    match coinc.count {
      2 => self.stats.double_coincidence_count += 1,
      3 => self.stats.triple_coincidence_count += 1,
      _ => (),
    }
    if self.verbosity > 1 {
      prlog.prlog(&self.accepted_summary(event, coinc));
    }

    let double_pulses = result.double_pulses.as_ref().filter(|dp| dp.has_double_pulse());
    if let Some(dp) = double_pulses {
      self.stats.double_pulse_count += 1;
      let tau = dp.mean_tau(coinc.event_time).unwrap_or(0.0);
      self.stats.double_pulse_taus.push(tau);
      if self.verbosity > 0 {
        prlog.prlog(&format!("** {} double pulse in event {}, tau {:.3} µs, {} of {} double pulses",
                             self.consumer_id,
                             event.event_id,
                             tau,
                             self.stats.double_pulse_count,
                             self.stats.coincidence_count));
      }
      if let Some(logs) = self.logs.as_mut() {
        let line = format_double_pulse_line(self.stats.coincidence_count,
                                            self.stats.double_pulse_count,
                                            tau,
                                            &dp.last_delta_ts(coinc.event_time),
                                            &dp.last_voltages());
        logs.record_double_pulse(&line)?;
      }
    }
    if let Some(logs) = self.logs.as_mut() {
      let line = format_pulse_line(event.event_id,
                                   event.timestamp,
                                   coinc.event_time,
                                   &coinc.voltages,
                                   &coinc.times,
                                   double_pulses);
      logs.record_accepted(&line)?;
    }

    self.feeds.push_rate(RateUpdate {
      n_accepted : self.stats.coincidence_count,
      event_time : event.timestamp,
    });
    if !self.stats.valid_trigger_signals.is_empty() {
      let batch = self.stats.take_histogram_batch();
      match self.feeds.push_histogram(batch) {
        Ok(_) => (),
        // the consumer is busy, keep the values for the next handoff
        Err(FeedError::Full(batch)) => self.stats.restore_histogram_batch(batch),
        Err(FeedError::Disconnected(batch)) => {
          trace!("No histogram consumer, dropping {}", batch);
        }
      }
    }
    self.feeds.push_voltages(coinc.voltages.clone());
    Ok(true)
  }

  fn accepted_summary(&self, event : &Event, coinc : &Coincidences) -> String {
    let voltages : Vec<String> = coinc.voltages.iter().map(|v| format!("{:.3}", v)).collect();
    match self.n_channels {
      1 => format!("** {} event {} accepted, V {}",
                   self.consumer_id, event.event_id, voltages.join(", ")),
      _ => format!("** {} event {} accepted, {}-fold coincidence of {} channels, V {}, T {:.3} µs",
                   self.consumer_id,
                   event.event_id,
                   coinc.count,
                   self.n_channels,
                   voltages.join(", "),
                   coinc.event_time),
    }
  }

  /// Process events until the source runs dry or 
  /// is shut down. The log files are closed in any case.
  pub fn run<S : EventSource>(&mut self, source : &mut S) -> Result<(), PulseFilterError> {
    info!("Starting pulse processor {}", self.consumer_id);
    while source.is_active() {
      let event = match source.next_event(&self.consumer_id) {
        None => {
          info!("End of stream for {}", self.consumer_id);
          break;
        }
        Some(event) => event,
      };
      if let Err(err) = self.process(&event, &*source) {
        error!("Processing of event {} failed! {}", event.event_id, err);
        if let Err(close_err) = self.close() {
          error!("Unable to close pulse logs! {}", close_err);
        }
        return Err(err);
      }
    }
    self.close()
  }

  /// Write the summaries and flush the log files.
  pub fn close(&mut self) -> Result<(), PulseFilterError> {
    if self.verbosity > 0 {
      info!("{}", self.stats);
    }
    if let Some(mut logs) = self.logs.take() {
      logs.close(&self.stats)?;
    }
    Ok(())
  }
}
