//! Numbers which do not change during a run

/// Default slack (in samples) of the peak search windows
pub const DEFAULT_SAMPLE_OFFSET     : usize = 2;

/// Conversion of sample times to microseconds
pub const SECONDS_TO_MICROSECONDS   : f64   = 1e6;

/// For the muonic pulse template, the decay 
/// lifetime is this fraction of the fall time
pub const MUONIC_LIFETIME_FRACTION  : f64   = 0.3;

/// Number of lifetimes the exponential tail of the
/// muonic template is sampled at
pub const MUONIC_DECAY_STEPS        : usize = 6;

/// Report progress every this many events
pub const PROGRESS_INTERVAL         : usize = 1000;

/// Header line of the accepted event log
pub const PULSE_LOG_HEADER          : &str  = "# EvNr, EvT, Vs ...., Ts ...T";
/// Header line of the double pulse log
pub const DOUBLE_PULSE_LOG_HEADER   : &str  = "# Nacc, Ndble, Tau, delT(iChan), ... V(iChan)";
