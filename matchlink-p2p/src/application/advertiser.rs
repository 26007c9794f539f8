use instant::{Duration, Instant};
use matchlink_core::{MatchInfo, Roster};

/// External discovery service that lists open matches
pub trait RosterAdvertiser {
    fn advertise(&mut self, info: &MatchInfo, roster: &Roster);
}

/// Advertiser for sessions nobody discovers
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAdvertiser;

impl RosterAdvertiser for NoopAdvertiser {
    fn advertise(&mut self, _info: &MatchInfo, _roster: &Roster) {}
}

impl<F> RosterAdvertiser for F
where
    F: FnMut(&MatchInfo, &Roster),
{
    fn advertise(&mut self, info: &MatchInfo, roster: &Roster) {
        self(info, roster)
    }
}

/// Trailing debounce: fires once `delay` after the last request
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn request(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// True once per burst of requests, after the quiet period
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}
