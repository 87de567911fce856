//! Run the pulse filter over a stream of waveform events
//!
//! Events are read from a json-lines file (one event per
//! line) or, with the `random` feature, generated by a toy
//! detector simulation. The output feeds are drained by a
//! monitoring thread which reports what it sees.

#[macro_use] extern crate log;

use std::io;
use std::path::PathBuf;
use std::process::exit;
use std::thread;
use std::time::Duration;

extern crate crossbeam_channel;
use crossbeam_channel::{
    Receiver,
    TryRecvError,
};

extern crate clap;
use clap::Parser;

use signal_hook::consts::SIGINT;

use pulsefilter_lib::{
    init_env_logger,
    EventSource,
    PulseProcessor,
    PulseFilterError,
    PulseFilterSettings,
};
use pulsefilter_lib::feeds::{
    slot_feed,
    DisplaySnapshot,
    HistogramBatch,
    OutputFeeds,
    RateUpdate,
};
use pulsefilter_lib::source::JsonEventSource;

#[derive(Parser, Debug)]
#[command(author = "pulsefilter developers", version, about, long_about = None)]
struct Args {
  /// A toml file with the pulse filter settings
  #[arg(short, long)]
  config: Option<PathBuf>,
  /// A json-lines file with one event per line
  #[arg(short, long)]
  input: Option<PathBuf>,
  /// Generate this many simulated events instead 
  /// of reading them from a file
  #[cfg(feature = "random")]
  #[arg(short, long)]
  simulate: Option<u64>,
  /// Standard deviation of the simulated baseline noise (V)
  #[cfg(feature = "random")]
  #[arg(long, default_value_t = 0.002)]
  noise_level: f64,
  /// Write the (default) settings to this file and exit
  #[arg(long)]
  write_config: Option<PathBuf>,
  /// Write accepted events and double pulses to text files
  #[arg(short, long, default_value_t = false)]
  log_pulses: bool,
  /// Override the verbosity of the settings
  #[arg(short, long)]
  verbosity: Option<u8>,
}

/// Take whatever arrives on the feeds, until the 
/// processor goes away.
fn monitor_feeds(rate      : Receiver<RateUpdate>,
                 histogram : Receiver<HistogramBatch>,
                 voltages  : Receiver<Vec<f64>>,
                 display   : Receiver<DisplaySnapshot>) {
  let mut n_histo_values = 0usize;
  let mut n_snapshots    = 0usize;
  loop {
    let mut n_connected = 4u8;
    match rate.try_recv() {
      Ok(update) => debug!("{} accepted events, last at {:.3} s", update.n_accepted, update.event_time),
      Err(TryRecvError::Empty)        => (),
      Err(TryRecvError::Disconnected) => n_connected -= 1,
    }
    match histogram.try_recv() {
      Ok(batch) => {
        n_histo_values += batch.valid_amplitudes.len();
        trace!("Got {}", batch);
      }
      Err(TryRecvError::Empty)        => (),
      Err(TryRecvError::Disconnected) => n_connected -= 1,
    }
    match voltages.try_recv() {
      Ok(volts) => trace!("Pulse heights {:?}", volts),
      Err(TryRecvError::Empty)        => (),
      Err(TryRecvError::Disconnected) => n_connected -= 1,
    }
    match display.try_recv() {
      Ok(snapshot) => {
        n_snapshots += 1;
        trace!("{} waveform with {} samples", snapshot.tag, snapshot.waveform.len());
      }
      Err(TryRecvError::Empty)        => (),
      Err(TryRecvError::Disconnected) => n_connected -= 1,
    }
    if n_connected == 0 {
      break;
    }
    thread::sleep(Duration::from_millis(50));
  }
  info!("Feed monitor saw {} trigger amplitudes and {} waveforms", n_histo_values, n_snapshots);
}

fn run_source<S : EventSource>(processor : &mut PulseProcessor,
                               source    : &mut S) -> Result<(), PulseFilterError> {
  processor.run(source)
}

/// Is there anything to read events from
fn has_event_source(args : &Args) -> bool {
  cfg_if::cfg_if! {
    if #[cfg(feature = "random")] {
      args.input.is_some() || args.simulate.is_some()
    } else {
      args.input.is_some()
    }
  }
}

fn run(args      : &Args,
       settings  : &PulseFilterSettings,
       processor : &mut PulseProcessor) -> Result<(), PulseFilterError> {
  cfg_if::cfg_if! {
    if #[cfg(feature = "random")] {
      if let Some(n_events) = args.simulate {
        use pulsefilter_lib::source::SimulatedEventSource;
        info!("Will simulate {} events", n_events);
        let mut source = SimulatedEventSource::new(processor.reference_pulse(),
                                                   settings.n_channels(),
                                                   settings.n_samples,
                                                   settings.trigger_index(),
                                                   settings.sampling_interval,
                                                   args.noise_level,
                                                   Some(n_events))?;
        signal_hook::flag::register(SIGINT, source.stop_flag())?;
        return run_source(processor, &mut source);
      }
    }
  }
  let input = match &args.input {
    None => {
      processor.close()?;
      return Err(io::Error::new(io::ErrorKind::NotFound, "no input file given").into());
    }
    Some(input) => input,
  };
  debug!("Reading {} channels of {} samples", settings.n_channels(), settings.n_samples);
  let mut source = JsonEventSource::open(input)?;
  signal_hook::flag::register(SIGINT, source.stop_flag())?;
  let result = run_source(processor, &mut source);
  info!("Read {} events from {}", source.n_read(), input.display());
  result
}

fn main() {
  init_env_logger();
  let args = Args::parse();

  let mut settings = match &args.config {
    None => {
      info!("No config file given, using default settings");
      PulseFilterSettings::new()
    }
    Some(config) => {
      match PulseFilterSettings::from_toml(config) {
        Err(err) => {
          error!("Unable to load settings from {}! {}", config.display(), err);
          exit(1);
        }
        Ok(settings) => settings,
      }
    }
  };
  if let Some(path) = &args.write_config {
    match settings.to_toml(path) {
      Err(err) => {
        error!("Unable to write settings! {}", err);
        exit(1);
      }
      Ok(_) => {
        println!("==> Wrote settings to {}", path.display());
        exit(0);
      }
    }
  }
  if args.log_pulses {
    settings.log_pulses = true;
  }
  if let Some(verbosity) = args.verbosity {
    settings.verbosity = verbosity;
  }
  if settings.verbosity > 1 {
    println!("{}", settings);
  }
  if !has_event_source(&args) {
    error!("No input file given! Please provide an event file with --input or -i!");
    exit(1);
  }

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
  let monitor = thread::Builder::new()
    .name("feed-monitor".into())
    .spawn(move || {
      monitor_feeds(rate_recv, histogram_recv, voltages_recv, display_recv);
    });
  let monitor = match monitor {
    Err(err) => {
      error!("Unable to spawn feed monitor! {}", err);
      exit(1);
    }
    Ok(handle) => handle,
  };

  let mut processor = match PulseProcessor::new(&settings, feeds) {
    Err(err) => {
      error!("Unable to set up the pulse processor! {}", err);
      exit(1);
    }
    Ok(processor) => processor,
  };
  let result = run(&args, &settings, &mut processor);
  println!("{}", processor.statistics());
  // disconnects the feeds
  drop(processor);
  if monitor.join().is_err() {
    error!("Feed monitor panicked!");
  }
  if let Err(err) = result {
    error!("Pulse filter stopped! {}", err);
    exit(1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn input_is_required() {
    let args = Args::parse_from(["pulsefilter", "--log-pulses"]);
    assert!(!has_event_source(&args));
    let args = Args::parse_from(["pulsefilter", "--input", "events.jsonl"]);
    assert!(has_event_source(&args));
  }

  #[cfg(feature = "random")]
  #[test]
  fn simulation_is_a_source() {
    let args = Args::parse_from(["pulsefilter", "--simulate", "100"]);
    assert!(has_event_source(&args));
    assert_eq!(args.noise_level, 0.002);
  }
}
