//! Guards a single in-flight retraining run and tracks consecutive
//! failures so the caller can pause after `TRAINING_FAILURE_STREAK_PAUSE`.

use parking_lot::Mutex;
use tracing::info;

struct TrainingState {
    running: bool,
    failure_streak: u32,
}

pub struct TrainerAgent {
    min_outcomes: usize,
    state: Mutex<TrainingState>,
}

impl TrainerAgent {
    pub fn new(min_outcomes: usize) -> Self {
        Self { min_outcomes, state: Mutex::new(TrainingState { running: false, failure_streak: 0 }) }
    }

    pub fn should_trigger(&self, outcome_ready_count: usize) -> bool {
        outcome_ready_count >= self.min_outcomes
    }

    /// Attempts to claim the run lock. Returns `false` if a run is already
    /// in flight.
    pub fn begin_run(&self) -> bool {
        let mut state = self.state.lock();
        if state.running {
            return false;
        }
        state.running = true;
        true
    }

    pub fn complete_run(&self, succeeded: bool) {
        let mut state = self.state.lock();
        state.running = false;
        if succeeded {
            state.failure_streak = 0;
        } else {
            state.failure_streak += 1;
        }
        info!(succeeded, failure_streak = state.failure_streak, "training_run_completed");
    }

    pub fn failure_streak(&self) -> u32 {
        self.state.lock().failure_streak
    }

    /// Called by the promoter when a candidate is promoted: a successful
    /// promotion clears any accumulated failure streak regardless of how
    /// the run that produced it was scored.
    pub fn reset_failure_streak(&self) {
        self.state.lock().failure_streak = 0;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_run_can_be_in_flight() {
        let trainer = TrainerAgent::new(500);
        assert!(trainer.begin_run());
        assert!(!trainer.begin_run());
        trainer.complete_run(true);
        assert!(trainer.begin_run());
    }

    #[test]
    fn failure_streak_increments_and_resets() {
        let trainer = TrainerAgent::new(500);
        trainer.begin_run();
        trainer.complete_run(false);
        assert_eq!(trainer.failure_streak(), 1);
        trainer.begin_run();
        trainer.complete_run(false);
        assert_eq!(trainer.failure_streak(), 2);
        trainer.begin_run();
        trainer.complete_run(true);
        assert_eq!(trainer.failure_streak(), 0);
    }

    #[test]
    fn should_trigger_respects_threshold() {
        let trainer = TrainerAgent::new(500);
        assert!(!trainer.should_trigger(499));
        assert!(trainer.should_trigger(500));
    }
}
