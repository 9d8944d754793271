//! Episode/action counters and the restart/exit handshake with the emulator.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Running,
    /// `restart` is raised and waits for the emulator to read it.
    RestartPending,
    /// Terminal.
    Exiting,
}

#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: LifecycleState,
    actions: u64,
    episodes: u64,
    restart: bool,
    exit: bool,
}

impl Lifecycle {
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn actions(&self) -> u64 {
        self.actions
    }

    #[must_use]
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    #[must_use]
    pub fn restart(&self) -> bool {
        self.restart
    }

    #[must_use]
    pub fn exit(&self) -> bool {
        self.exit
    }

    /// One `UPDATE` tick. Returns the new action count.
    pub fn tick(&mut self) -> u64 {
        self.actions = self.actions.saturating_add(1);
        self.actions
    }

    /// Wire `RESET`. An exiting bridge stays exiting.
    pub fn reset(&mut self) {
        self.actions = 0;
        self.episodes = 0;
        self.restart = false;
        self.exit = false;
        if self.state != LifecycleState::Exiting {
            self.state = LifecycleState::Running;
        }
    }

    /// Returns `false` when already exiting.
    pub fn new_episode(&mut self) -> bool {
        if self.state == LifecycleState::Exiting {
            return false;
        }
        self.restart = true;
        self.actions = 0;
        self.episodes = self.episodes.saturating_add(1);
        self.state = LifecycleState::RestartPending;
        true
    }

    pub fn exit_client(&mut self) {
        if self.state != LifecycleState::Exiting {
            self.episodes = self.episodes.saturating_add(1);
        }
        self.exit = true;
        self.state = LifecycleState::Exiting;
    }

    /// `SET restart <bool>` from the wire or the decision callback.
    pub fn set_restart(&mut self, restart: bool) {
        self.restart = restart;
        match (restart, self.state) {
            (_, LifecycleState::Exiting) => {}
            (true, _) => self.state = LifecycleState::RestartPending,
            (false, _) => self.state = LifecycleState::Running,
        }
    }

    /// `GET restart`: read-and-clear.
    pub fn take_restart(&mut self) -> bool {
        let restart = std::mem::take(&mut self.restart);
        if self.state == LifecycleState::RestartPending {
            self.state = LifecycleState::Running;
        }
        restart
    }

    /// `GET exit`: read-and-clear. The lifecycle stays `Exiting`.
    pub fn take_exit(&mut self) -> bool {
        std::mem::take(&mut self.exit)
    }
}
