//! Match lifecycle state machine
//!
//! Runs only on the authority, once per tick:
//!
//! ```text
//!   Lobby --(teams populated, all assigned, all ready)--> Starting
//!   Starting --(precondition lost)--> Lobby
//!   Starting --(countdown elapsed, level load)--> Playing
//!   Playing --(time limit / end_match)--> Ending
//!   Ending --(display elapsed)--> Lobby
//!   any non-Lobby --(a team emptied by disconnect, one tick later)--> Lobby
//! ```
//!
//! Delayed transitions are explicit timers stored next to the phase they
//! guard, so cancelling is just clearing the handle.

use log::{debug, info};
use shared::{GamePhase, TeamTally};
use std::time::Duration;

/// Tuning for the lifecycle timers and level rotation
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Delay between Starting and the level load
    pub countdown: Duration,
    /// Playing time before the match ends; zero disables the limit
    pub match_time_limit: Duration,
    /// How long Ending is shown before returning to the lobby
    pub ending_display: Duration,
    /// Levels loaded for successive matches
    pub levels: Vec<String>,
    /// Level loaded when returning to the lobby
    pub lobby_level: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(5),
            match_time_limit: Duration::from_secs(600),
            ending_display: Duration::from_secs(10),
            levels: vec!["arena".to_string()],
            lobby_level: "lobby".to_string(),
        }
    }
}

/// Observable results of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    PhaseChanged { from: GamePhase, to: GamePhase },
    CountdownStarted,
    CountdownCanceled,
    LoadLevel(String),
}

/// Handle for the pending match start
#[derive(Debug, Clone, PartialEq)]
pub struct Countdown {
    pub remaining: Duration,
}

pub struct MatchLifecycle {
    config: MatchConfig,
    phase: GamePhase,
    countdown: Option<Countdown>,
    /// Time left in Playing or Ending
    phase_timer: Option<Duration>,
    return_scheduled: bool,
    rotation_index: usize,
}

impl MatchLifecycle {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            phase: GamePhase::Lobby,
            countdown: None,
            phase_timer: None,
            return_scheduled: false,
            rotation_index: 0,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn return_scheduled(&self) -> bool {
        self.return_scheduled
    }

    /// Level the next match start will load
    pub fn next_level(&self) -> String {
        if self.config.levels.is_empty() {
            return self.config.lobby_level.clone();
        }
        self.config.levels[self.rotation_index % self.config.levels.len()].clone()
    }

    /// Level a joining peer should be in right now
    pub fn current_level(&self) -> String {
        match self.phase {
            GamePhase::Playing | GamePhase::Ending => self.next_level(),
            GamePhase::Lobby | GamePhase::Starting => self.config.lobby_level.clone(),
        }
    }

    /// Called after every disconnect with the remaining tally
    pub fn on_disconnect(&mut self, tally: &TeamTally) {
        if self.phase != GamePhase::Lobby && tally.team_empty() && !self.return_scheduled {
            info!("A team emptied during {}, returning to lobby", self.phase);
            self.return_scheduled = true;
        }
    }

    /// Ends a running match early
    pub fn end_match(&mut self) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        if self.phase == GamePhase::Playing {
            self.enter_ending(&mut events);
        }
        events
    }

    /// Advances the state machine by one tick
    pub fn evaluate(&mut self, tally: &TeamTally, dt: Duration) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();

        if self.return_scheduled {
            self.return_scheduled = false;
            if self.phase != GamePhase::Lobby {
                self.return_to_lobby(&mut events);
            }
        }

        match self.phase {
            GamePhase::Lobby => {
                if tally.ready_to_start() {
                    self.start_countdown(&mut events);
                }
            }
            GamePhase::Starting => {
                if !tally.ready_to_start() {
                    self.return_to_lobby(&mut events);
                } else if self.countdown_elapsed(dt) {
                    self.begin_match(&mut events);
                }
            }
            GamePhase::Playing => {
                if self.timer_elapsed(dt) {
                    self.enter_ending(&mut events);
                }
            }
            GamePhase::Ending => {
                if self.timer_elapsed(dt) {
                    self.return_to_lobby(&mut events);
                }
            }
        }

        events
    }

    fn set_phase(&mut self, to: GamePhase, events: &mut Vec<LifecycleEvent>) {
        let from = self.phase;
        if from == to {
            return;
        }
        info!("Match phase {} -> {}", from, to);
        self.phase = to;
        events.push(LifecycleEvent::PhaseChanged { from, to });
    }

    /// Idempotent: an existing countdown is left untouched
    fn start_countdown(&mut self, events: &mut Vec<LifecycleEvent>) {
        if self.countdown.is_none() {
            info!("Everyone ready, starting in {:?}", self.config.countdown);
            self.countdown = Some(Countdown {
                remaining: self.config.countdown,
            });
            events.push(LifecycleEvent::CountdownStarted);
        }
        self.set_phase(GamePhase::Starting, events);
    }

    fn cancel_countdown(&mut self, events: &mut Vec<LifecycleEvent>) {
        if self.countdown.take().is_some() {
            info!("Match start canceled");
            events.push(LifecycleEvent::CountdownCanceled);
        }
    }

    fn countdown_elapsed(&mut self, dt: Duration) -> bool {
        match self.countdown.as_mut() {
            Some(countdown) => {
                countdown.remaining = countdown.remaining.saturating_sub(dt);
                debug!("Countdown {:?} left", countdown.remaining);
                countdown.remaining.is_zero()
            }
            None => true,
        }
    }

    fn timer_elapsed(&mut self, dt: Duration) -> bool {
        match self.phase_timer.as_mut() {
            Some(left) => {
                *left = left.saturating_sub(dt);
                left.is_zero()
            }
            None => false,
        }
    }

    fn begin_match(&mut self, events: &mut Vec<LifecycleEvent>) {
        self.countdown = None;
        let level = self.next_level();
        info!("Loading level {}", level);
        events.push(LifecycleEvent::LoadLevel(level));
        self.phase_timer =
            Some(self.config.match_time_limit).filter(|limit| !limit.is_zero());
        self.set_phase(GamePhase::Playing, events);
    }

    fn enter_ending(&mut self, events: &mut Vec<LifecycleEvent>) {
        self.phase_timer = Some(self.config.ending_display);
        self.set_phase(GamePhase::Ending, events);
    }

    fn return_to_lobby(&mut self, events: &mut Vec<LifecycleEvent>) {
        let from = self.phase;
        self.cancel_countdown(events);
        self.phase_timer = None;
        if matches!(from, GamePhase::Playing | GamePhase::Ending) {
            if !self.config.levels.is_empty() {
                self.rotation_index = (self.rotation_index + 1) % self.config.levels.len();
            }
            events.push(LifecycleEvent::LoadLevel(self.config.lobby_level.clone()));
        }
        self.set_phase(GamePhase::Lobby, events);
    }
}
