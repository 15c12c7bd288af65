use foundation::Time;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollDecision {
    Poll,
    NotDue,
    Dragging,
    Inactive,
    InFlight,
}

/// Rate limiter for scene metadata polls.
///
/// At most one poll is in flight. Dragging or an inactive viewer always
/// defers the poll. `invalidate` bypasses the interval; the forced poll stays
/// pending until it is actually issued.
#[derive(Debug, Clone)]
pub struct PollGate {
    interval_ms: f64,
    last_poll: Option<Time>,
    forced: bool,
    in_flight: bool,
}

impl PollGate {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_poll: None,
            forced: false,
            in_flight: false,
        }
    }

    pub fn invalidate(&mut self) {
        self.forced = true;
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn check(&self, now: Time, dragging: bool, active: bool) -> PollDecision {
        if self.in_flight {
            return PollDecision::InFlight;
        }
        if dragging {
            return PollDecision::Dragging;
        }
        if !active {
            return PollDecision::Inactive;
        }
        if self.forced {
            return PollDecision::Poll;
        }
        match self.last_poll {
            Some(last) if now.millis_since(last) < self.interval_ms => PollDecision::NotDue,
            _ => PollDecision::Poll,
        }
    }

    pub fn begin(&mut self, now: Time) {
        self.last_poll = Some(now);
        self.forced = false;
        self.in_flight = true;
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}
