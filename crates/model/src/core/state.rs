use serde::Serialize;
use std::fmt;

/// Global run state shared by the driver and all workers.
///
/// Transitions are monotonic within a phase and `Done` is terminal for
/// the whole run: once a worker observes `Done` it stays observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum GlobalState {
    /// Transactions run but nothing is measured.
    Warmup = 0,
    /// A latency-run query executes once, unmeasured, to warm caches.
    ColdQuery = 1,
    /// The measurement window: samples are recorded.
    Measure = 2,
    /// A serial latency phase has exhausted its query list.
    LatencyComplete = 3,
    /// The schedule is over; workers drain and stop fetching work.
    Exit = 4,
    /// Terminal. Workers acknowledge and shut down.
    Done = 5,
}

impl GlobalState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => GlobalState::Warmup,
            1 => GlobalState::ColdQuery,
            2 => GlobalState::Measure,
            3 => GlobalState::LatencyComplete,
            4 => GlobalState::Exit,
            _ => GlobalState::Done,
        }
    }

    /// True for the states in which a worker must not record results.
    pub fn is_draining(self) -> bool {
        matches!(
            self,
            GlobalState::Done | GlobalState::Exit | GlobalState::LatencyComplete
        )
    }
}

impl fmt::Display for GlobalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GlobalState::Warmup => "warmup",
            GlobalState::ColdQuery => "cold-query",
            GlobalState::Measure => "measure",
            GlobalState::LatencyComplete => "latency-complete",
            GlobalState::Exit => "exit",
            GlobalState::Done => "done",
        };
        f.write_str(name)
    }
}
