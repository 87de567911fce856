use std::io::{
    self,
    Write,
};
use std::sync::{
    Arc,
    Mutex,
};

use pulsefilter_lib::{
    Event,
    PulseProcessor,
    PulseFilterSettings,
    PulseFilterError,
    AnalysisError,
};
use pulsefilter_lib::constants::PULSE_LOG_HEADER;
use pulsefilter_lib::feeds::{
    slot_feed,
    OutputFeeds,
    RateUpdate,
    HistogramBatch,
    DisplayTag,
    DisplaySnapshot,
};
use pulsefilter_lib::pulse_log::PulseLogs;
use pulsefilter_lib::settings::PulseShapeKind;
use pulsefilter_lib::source::{
    LogCrateSink,
    VecEventSource,
};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
  fn write(&mut self, buf : &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }
  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl SharedBuffer {
  fn lines(&self) -> Vec<String> {
    let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
    text.lines().map(String::from).collect()
  }
}

/// Trapezoid reference pulse with 8 samples
fn trapezoid_settings(channels : &[&str], n_samples : usize) -> PulseFilterSettings {
  let mut settings = PulseFilterSettings::new();
  settings.channels           = channels.iter().map(|c| String::from(*c)).collect();
  settings.trigger_channel    = Some(String::from(channels[0]));
  settings.n_samples          = n_samples;
  settings.pretrigger         = 0.25;
  settings.verbosity          = 0;
  settings.pulse.shape        = PulseShapeKind::Trapezoid;
  settings.pulse.rise_time    = 8e-9;
  settings.pulse.on_time      = 4e-9;
  settings.pulse.fall_time    = 16e-9;
  settings.pulse.pulse_height = -0.05;
  settings
}

fn add_pulse(processor : &PulseProcessor, trace : &mut [f64], at : usize, scale : f64) {
  for (k, v) in processor.reference_pulse().kernel().iter().enumerate() {
    trace[at + k] += scale*v;
  }
}

#[test]
fn single_channel_end_to_end() {
  let (rate, rate_recv)           = slot_feed::<RateUpdate>();
  let (histogram, histogram_recv) = slot_feed::<HistogramBatch>();
  let (voltages, voltages_recv)   = slot_feed::<Vec<f64>>();
  let (display, display_recv)     = slot_feed::<DisplaySnapshot>();
  let feeds = OutputFeeds {
    rate      : Some(Box::new(rate)),
    histogram : Some(Box::new(histogram)),
    voltages  : Some(Box::new(voltages)),
    display   : Some(Box::new(display)),
  };
  let settings      = trapezoid_settings(&["A"], 160);
  assert_eq!(settings.trigger_index(), 40);
  let mut processor = PulseProcessor::new(&settings, feeds).unwrap();
  assert_eq!(processor.reference_pulse().len(), 8);
  assert_eq!(display_recv.try_recv().unwrap().tag, DisplayTag::Reference);

  let mut trace = vec![0.0; 160];
  add_pulse(&processor, &mut trace, 40, 1.2);
  let event = Event::new(42, 1.5, vec![trace]);
  let result = processor.detect(&event).unwrap();
  assert_eq!(result.first_peak_index, Some(40));
  assert!(result.validated);
  assert!(result.accepted);
  assert_eq!(result.coincidence_count(), 1);

  assert!(processor.process(&event, &LogCrateSink).unwrap());
  let stats = processor.statistics();
  assert_eq!(stats.event_count, 1);
  assert_eq!(stats.valid_count, 1);
  assert_eq!(stats.coincidence_count, 1);
  assert_eq!(stats.double_pulse_count, 0);
  assert_eq!(rate_recv.try_recv().unwrap(), RateUpdate {n_accepted : 1, event_time : 1.5});
  let batch = histogram_recv.try_recv().unwrap();
  assert_eq!(batch.valid_amplitudes.len(), 1);
  assert!((batch.valid_amplitudes[0] - 0.06).abs() < 1e-9);
  assert!(processor.statistics().valid_trigger_signals.is_empty());
  assert_eq!(voltages_recv.try_recv().unwrap().len(), 1);
  let snapshot = display_recv.try_recv().unwrap();
  assert_eq!(snapshot.tag, DisplayTag::Accepted);
  assert_eq!(snapshot.waveform.len(), 8);
}

#[test]
fn two_channels_without_coincidence() {
  let pulse_buf  = SharedBuffer::default();
  let double_buf = SharedBuffer::default();
  let logs = PulseLogs::from_writers(Box::new(pulse_buf.clone()),
                                     Box::new(double_buf.clone())).unwrap();
  let settings      = trapezoid_settings(&["A", "B"], 200);
  let mut processor = PulseProcessor::new(&settings, OutputFeeds::new()).unwrap()
                                    .with_logs(logs);
  let mut samples   = vec![vec![0.0; 200]; 2];
  add_pulse(&processor, &mut samples[0], 50, 1.2);
  let event = Event::new(1, 0.0, samples);
  let result = processor.detect(&event).unwrap();
  assert!(result.validated);
  assert_eq!(result.coincidence_count(), 1);
  assert!(!result.accepted);
  assert!(result.double_pulses.is_none());
  assert!(!processor.process(&event, &LogCrateSink).unwrap());
  assert_eq!(processor.statistics().valid_count, 1);
  assert_eq!(processor.statistics().coincidence_count, 0);
  assert_eq!(pulse_buf.lines(), vec![String::from(PULSE_LOG_HEADER)]);
}

#[test]
fn accepted_events_are_logged() {
  let pulse_buf  = SharedBuffer::default();
  let double_buf = SharedBuffer::default();
  let logs = PulseLogs::from_writers(Box::new(pulse_buf.clone()),
                                     Box::new(double_buf.clone())).unwrap();
  let settings      = trapezoid_settings(&["A", "B"], 200);
  let mut processor = PulseProcessor::new(&settings, OutputFeeds::new()).unwrap()
                                    .with_logs(logs);
  let mut samples   = vec![vec![0.0; 200]; 2];
  add_pulse(&processor, &mut samples[0], 50,  1.2);
  add_pulse(&processor, &mut samples[1], 50,  1.4);
  add_pulse(&processor, &mut samples[1], 120, 1.5);
  let mut source = VecEventSource::new(vec![Event::new(3, 0.25, samples)]);
  processor.run(&mut source).unwrap();
  assert_eq!(processor.statistics().coincidence_count, 1);
  assert_eq!(processor.statistics().double_coincidence_count, 1);
  assert_eq!(processor.statistics().double_pulse_count, 1);

  let lines = pulse_buf.lines();
  assert_eq!(lines.len(), 3);
  assert!(lines[1].starts_with("3, 0.25, 0.060, 0.000, 0.070, 0.000"));
  assert!(lines[2].starts_with("# PulseProcessor Summary: last evNR 1"));
  let lines = double_buf.lines();
  assert_eq!(lines.len(), 4);
  // secondary pulse 70 samples after the primary ones
  assert!(lines[1].starts_with("1, 1, 0.2800,   0.0000, 0.2800,   0.000, 0.075"));
  assert_eq!(lines[3], "#                      1 double pulses");
}

#[test]
fn detection_is_idempotent() {
  let settings      = trapezoid_settings(&["A", "B", "C"], 200);
  let mut processor = PulseProcessor::new(&settings, OutputFeeds::new()).unwrap();
  let mut samples   = vec![vec![0.0; 200]; 3];
  add_pulse(&processor, &mut samples[0], 50, 1.2);
  add_pulse(&processor, &mut samples[2], 51, 1.3);
  add_pulse(&processor, &mut samples[2], 150, 1.3);
  let event  = Event::new(9, 0.0, samples);
  let first  = processor.detect(&event).unwrap();
  assert!(processor.process(&event, &LogCrateSink).unwrap());
  let second = processor.detect(&event).unwrap();
  assert_eq!(first, second);
  assert!(processor.process(&event, &LogCrateSink).unwrap());
  assert_eq!(processor.statistics().coincidence_count, 2);
  assert_eq!(processor.statistics().double_pulse_count, 2);
}

#[test]
fn acceptance_law() {
  for n_channels in 1..4 {
    let names : Vec<String> = (0..n_channels).map(|k| format!("{}", k)).collect();
    let names : Vec<&str>   = names.iter().map(|n| n.as_str()).collect();
    let settings  = trapezoid_settings(&names, 200);
    let processor = PulseProcessor::new(&settings, OutputFeeds::new()).unwrap();
    // pulse on the trigger, and on every other channel except the last
    for with_trigger in [true, false] {
      let mut samples = vec![vec![0.0; 200]; n_channels];
      if with_trigger {
        add_pulse(&processor, &mut samples[0], 50, 1.2);
      }
      for ch in 1..n_channels.saturating_sub(1) {
        add_pulse(&processor, &mut samples[ch], 51, 1.2);
      }
      let result = processor.detect(&Event::new(1, 0.0, samples)).unwrap();
      if n_channels == 1 {
        assert_eq!(result.accepted, result.validated);
      } else {
        assert_eq!(result.accepted, result.validated && result.coincidence_count() >= 2);
      }
    }
  }
}

#[test]
fn run_stops_at_malformed_event() {
  let settings      = trapezoid_settings(&["A", "B"], 200);
  let mut processor = PulseProcessor::new(&settings, OutputFeeds::new()).unwrap();
  let mut source    = VecEventSource::new(vec![Event::new(1, 0.0, vec![vec![0.0; 200]; 2]),
                                               Event::new(2, 0.0, vec![vec![0.0; 20]; 2]),
                                               Event::new(3, 0.0, vec![vec![0.0; 200]; 2])]);
  let result = processor.run(&mut source);
  assert!(matches!(result, Err(PulseFilterError::Analysis(AnalysisError::TraceTooShort))));
  assert_eq!(processor.statistics().event_count, 2);
  assert_eq!(source.len(), 1);
}

#[test]
fn settings_toml_round_trip() {
  let dir = std::env::temp_dir().join(format!("pulsefilter-test-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("pulsefilter-config-test.toml");
  let mut settings = PulseFilterSettings::new();
  settings.trigger_channel = Some(String::from("B"));
  settings.pulse.shape     = PulseShapeKind::Trapezoid;
  println!("{}", settings);
  settings.to_toml(&path).unwrap();
  let read_back = PulseFilterSettings::from_toml(&path).unwrap();
  assert_eq!(settings, read_back);
  settings.trigger_channel = None;
  settings.to_toml(&path).unwrap();
  assert_eq!(PulseFilterSettings::from_toml(&path).unwrap().trigger_channel, None);
  std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn rejected_trigger_end_to_end() {
  let (display, display_recv) = slot_feed::<DisplaySnapshot>();
  let mut feeds = OutputFeeds::new();
  feeds.display = Some(Box::new(display));
  let settings      = trapezoid_settings(&["A", "B"], 200);
  let mut processor = PulseProcessor::new(&settings, feeds).unwrap();
  assert_eq!(display_recv.try_recv().unwrap().tag, DisplayTag::Reference);
  // flat baseline on the trigger channel, pulse on the other one
  let mut samples = vec![vec![-0.05; 200], vec![0.0; 200]];
  add_pulse(&processor, &mut samples[1], 50, 1.4);
  let event  = Event::new(7, 0.1, samples);
  let result = processor.detect(&event).unwrap();
  assert!(!result.validated);
  assert_eq!(result.first_peak_index, None);
  assert!(!processor.process(&event, &LogCrateSink).unwrap());
  let snapshot = display_recv.try_recv().unwrap();
  assert_eq!(snapshot.tag, DisplayTag::Rejected);
  assert_eq!(snapshot.waveform.len(), processor.reference_pulse().len());
  let stats = processor.statistics();
  assert_eq!(stats.valid_count, 0);
  assert_eq!(stats.noise_trigger_signals.len(), 1);
  assert!((stats.noise_trigger_signals[0] - 0.05).abs() < 1e-9);
  assert!(stats.valid_trigger_signals.is_empty());
}

#[test]
fn late_trigger_is_noise_end_to_end() {
  let (display, display_recv) = slot_feed::<DisplaySnapshot>();
  let mut feeds = OutputFeeds::new();
  feeds.display = Some(Box::new(display));
  let settings     = trapezoid_settings(&["A"], 200);
  let processor    = PulseProcessor::new(&settings, feeds).unwrap();
  let mut geometry = *processor.geometry();
  geometry.max_peak_index = 47.0;
  let mut processor = processor.with_geometry(geometry);
  assert_eq!(display_recv.try_recv().unwrap().tag, DisplayTag::Reference);
  let mut samples = vec![vec![0.0; 200]];
  add_pulse(&processor, &mut samples[0], 51, 2.0);
  let event = Event::new(1, 0.0, samples);
  assert!(!processor.process(&event, &LogCrateSink).unwrap());
  assert_eq!(display_recv.try_recv().unwrap().tag, DisplayTag::Noise);
  let stats = processor.statistics();
  assert_eq!(stats.noise_trigger_signals, vec![0.0]);
  assert_eq!(stats.valid_count, 0);
  assert_eq!(stats.coincidence_count, 0);
}

#[test]
fn full_histogram_slot_keeps_pending_values() {
  let (histogram, histogram_recv) = slot_feed::<HistogramBatch>();
  let mut feeds = OutputFeeds::new();
  feeds.histogram = Some(Box::new(histogram));
  let settings      = trapezoid_settings(&["A"], 200);
  let mut processor = PulseProcessor::new(&settings, feeds).unwrap();
  let event_with = |scale : f64| {
    let mut samples = vec![vec![0.0; 200]];
    add_pulse(&processor, &mut samples[0], 50, scale);
    Event::new(1, 0.0, samples)
  };
  let first  = event_with(1.2);
  let second = event_with(1.4);
  let third  = event_with(1.6);

  assert!(processor.process(&first, &LogCrateSink).unwrap());
  assert!(processor.statistics().valid_trigger_signals.is_empty());
  // nobody drained the slot, the values stay with the processor
  assert!(processor.process(&second, &LogCrateSink).unwrap());
  let pending = &processor.statistics().valid_trigger_signals;
  assert_eq!(pending.len(), 1);
  assert!((pending[0] - 0.07).abs() < 1e-9);

  let batch = histogram_recv.try_recv().unwrap();
  assert_eq!(batch.valid_amplitudes.len(), 1);
  assert!((batch.valid_amplitudes[0] - 0.06).abs() < 1e-9);

  assert!(processor.process(&third, &LogCrateSink).unwrap());
  assert!(processor.statistics().valid_trigger_signals.is_empty());
  let batch = histogram_recv.try_recv().unwrap();
  assert_eq!(batch.valid_amplitudes.len(), 2);
  assert!((batch.valid_amplitudes[0] - 0.07).abs() < 1e-9);
  assert!((batch.valid_amplitudes[1] - 0.08).abs() < 1e-9);
}
