use foundation::time::Time;

/// Metadata for one cooperative tick of the viewer.
///
/// The host drives ticks from its animation callback and supplies the clock,
/// so a sequence of frames can be replayed in tests with synthetic times.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Host time at the start of the frame.
    pub time: Time,
    /// Seconds since the previous frame (0 for the first one).
    pub dt_s: f64,
}

impl Frame {
    pub fn first(time: Time) -> Self {
        Self {
            index: 0,
            time,
            dt_s: 0.0,
        }
    }

    pub fn next(self, time: Time) -> Self {
        Self {
            index: self.index + 1,
            time,
            dt_s: (time.0 - self.time.0).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::first(Time(1.0));
        let f1 = f0.next(Time(1.5));
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(1.5));
        assert_eq!(f1.dt_s, 0.5);
    }

    #[test]
    fn backwards_clock_gives_zero_dt() {
        let f = Frame::first(Time(2.0)).next(Time(1.0));
        assert_eq!(f.dt_s, 0.0);
    }
}
