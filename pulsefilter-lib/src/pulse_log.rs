//! Text log files of accepted events and double pulses
//!
//! These are the lossless record of a run, contrary to the
//! live feeds. One line per accepted event, one line per
//! event with at least one secondary pulse.

use std::fs::{
    self,
    File,
};
use std::io::{
    self,
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};

use chrono::Utc;

use crate::constants::{
    PULSE_LOG_HEADER,
    DOUBLE_PULSE_LOG_HEADER,
};
use crate::double_pulse::DoublePulses;
use crate::statistics::RunningStatistics;

/// Line for the accepted event log
///
/// Times are given relative to the event time for 
/// channels where a pulse was found (voltage > 0) and
/// are left as they are otherwise.
///
/// # Arguments
///
/// * event_id      : id of the event
/// * timestamp     : timestamp of the event (s)
/// * event_time    : mean pulse time of the event (µs)
/// * voltages      : primary pulse height per channel
/// * times         : primary pulse time per channel (µs)
/// * double_pulses : secondary pulses, if the event has any
pub fn format_pulse_line(event_id      : u64,
                         timestamp     : f64,
                         event_time    : f64,
                         voltages      : &[f64],
                         times         : &[f64],
                         double_pulses : Option<&DoublePulses>) -> String {
  let mut line = format!("{}, {:.2}", event_id, timestamp);
  for (v, t) in voltages.iter().zip(times) {
    let mut t = *t;
    if *v > 0.0 {
      t -= event_time;
    }
    line += &format!(", {:.3}, {:.3}", v, t);
  }
  if let Some(dp) = double_pulses.filter(|dp| dp.has_double_pulse()) {
    for ch_pulses in dp.pulses.iter() {
      let (v, mut t) = ch_pulses.first().map_or((0.0, 0.0), |p| (p.voltage, p.time));
      if v > 0.0 {
        t -= event_time;
      }
      line += &format!(", {:.3}, {:.3}", v, t);
    }
    for (ch, ch_pulses) in dp.pulses.iter().enumerate() {
      if ch_pulses.len() > 1 {
        line += &format!(", {}, {:.3}, {:.3}", ch, ch_pulses[1].voltage, ch_pulses[1].time);
      }
    }
  }
  line
}

/// Line for the double pulse log
///
/// # Arguments
///
/// * n_accepted : accepted events so far
/// * n_double   : double pulse events so far
/// * tau        : mean time difference of this event (µs)
/// * delta_ts   : time difference per channel (µs)
/// * voltages   : secondary pulse height per channel
pub fn format_double_pulse_line(n_accepted : usize,
                                n_double   : usize,
                                tau        : f64,
                                delta_ts   : &[f64],
                                voltages   : &[f64]) -> String {
  let delta_ts : Vec<String> = delta_ts.iter().map(|d| format!("{:.4}", d)).collect();
  let voltages : Vec<String> = voltages.iter().map(|v| format!("{:.3}", v)).collect();
  format!("{}, {}, {:.4},   {},   {}",
          n_accepted,
          n_double,
          tau,
          delta_ts.join(", "),
          voltages.join(", "))
}

/// The two log files of a pulse processor
pub struct PulseLogs {
  pulse_log        : Box<dyn Write + Send>,
  double_pulse_log : Box<dyn Write + Send>,
}

impl PulseLogs {

  /// Open new log files in the given directory, 
  /// named after the current (UTC) time.
  pub fn create(dir : &Path) -> io::Result<PulseLogs> {
    fs::create_dir_all(dir)?;
    let (pulse_path, double_pulse_path) = Self::file_names(dir);
    info!("Writing pulse logs to {} and {}", pulse_path.display(), double_pulse_path.display());
    let pulse_log        = BufWriter::new(File::create(pulse_path)?);
    let double_pulse_log = BufWriter::new(File::create(double_pulse_path)?);
    Self::from_writers(Box::new(pulse_log), Box::new(double_pulse_log))
  }

  /// The log file names for a run starting now
  pub fn file_names(dir : &Path) -> (PathBuf, PathBuf) {
    let datetime = Utc::now().format("%y%m%d-%H%M").to_string();
    (dir.join(format!("pFilt_{}.dat", datetime)),
     dir.join(format!("dpFilt_{}.dat", datetime)))
  }

  /// Use any writers as log files. The header lines
  /// are written immediately.
  pub fn from_writers(mut pulse_log        : Box<dyn Write + Send>,
                      mut double_pulse_log : Box<dyn Write + Send>) -> io::Result<PulseLogs> {
    writeln!(pulse_log, "{}", PULSE_LOG_HEADER)?;
    writeln!(double_pulse_log, "{}", DOUBLE_PULSE_LOG_HEADER)?;
    double_pulse_log.flush()?;
    Ok(PulseLogs {
      pulse_log,
      double_pulse_log,
    })
  }

  pub fn record_accepted(&mut self, line : &str) -> io::Result<()> {
    writeln!(self.pulse_log, "{}", line)
  }
  
  /// Double pulses are rare, so this log is flushed 
  /// after every line
  pub fn record_double_pulse(&mut self, line : &str) -> io::Result<()> {
    writeln!(self.double_pulse_log, "{}", line)?;
    self.double_pulse_log.flush()
  }

  /// Write the summary lines and flush both files
  pub fn close(&mut self, stats : &RunningStatistics) -> io::Result<()> {
    let summary = format!("# PulseProcessor Summary: {}", stats.summary());
    writeln!(self.pulse_log, "{}", summary)?;
    self.pulse_log.flush()?;
    writeln!(self.double_pulse_log, "{}", summary)?;
    writeln!(self.double_pulse_log, "#                      {} double pulses", stats.double_pulse_count)?;
    self.double_pulse_log.flush()
  }
}
