use std::time::{ Duration, Instant };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running {
        started: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Started,
    AlreadyRunning,
    Stopped {
        total: Duration,
    },
    NotRunning,
}

/// Study timer with an elapsed-time accumulator that survives stop/start cycles.
#[derive(Debug, Clone)]
pub struct StudyTimer {
    state: TimerState,
    elapsed: Duration,
}

impl Default for StudyTimer {
    fn default() -> Self {
        Self { state: TimerState::Idle, elapsed: Duration::ZERO }
    }
}

impl StudyTimer {
    pub fn start(&mut self) -> TimerEvent {
        self.start_at(Instant::now())
    }

    pub fn stop(&mut self) -> TimerEvent {
        self.stop_at(Instant::now())
    }

    pub fn start_at(&mut self, now: Instant) -> TimerEvent {
        match self.state {
            TimerState::Idle => {
                self.state = TimerState::Running { started: now };
                TimerEvent::Started
            }
            TimerState::Running { .. } => TimerEvent::AlreadyRunning,
        }
    }

    pub fn stop_at(&mut self, now: Instant) -> TimerEvent {
        match self.state {
            TimerState::Running { started } => {
                self.elapsed += now.saturating_duration_since(started);
                self.state = TimerState::Idle;
                TimerEvent::Stopped { total: self.elapsed }
            }
            TimerState::Idle => TimerEvent::NotRunning,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Whole minutes and leftover seconds, truncating sub-second time.
pub fn minutes_and_seconds(total: Duration) -> (u64, u64) {
    let secs = total.as_secs();
    (secs / 60, secs % 60)
}
