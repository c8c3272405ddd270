//! Install/activate state machine.
//!
//! `Lifecycle` is a plain value. Every transition consumes the current value
//! and returns the next one, or `Error::InvalidTransition` if the move is not
//! allowed from the current state. The worker keeps the latest value behind a
//! lock; nothing else about the lifecycle is stored, because the generation
//! names in the cache store are enough to rebuild it.

use serde::Serialize;
use std::fmt;
use trailcache_core::Error;
use trailcache_core::cache::GenerationInfo;

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Created, nothing attempted yet.
    Parsed,
    /// Manifest assets are being fetched and stored.
    Installing,
    /// Installed and waiting for skip-waiting before activation.
    Installed,
    /// Old generations are being purged.
    Activating,
    /// Controlling all requests.
    Active,
    /// Install failed; the next registration starts over.
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one worker generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lifecycle {
    generation: String,
    state: LifecycleState,
    controlling: Option<String>,
    skip_waiting: bool,
}

impl Lifecycle {
    /// A fresh lifecycle for `generation` with nothing controlling requests.
    pub fn new(generation: impl Into<String>) -> Self {
        Self { generation: generation.into(), state: LifecycleState::Parsed, controlling: None, skip_waiting: false }
    }

    /// Generation this worker installs.
    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Generation currently answering requests, if any.
    pub fn controlling(&self) -> Option<&str> {
        self.controlling.as_deref()
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    /// Installed and allowed to activate right away.
    pub fn should_activate(&self) -> bool {
        self.state == LifecycleState::Installed && self.skip_waiting
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition { action, state: self.state.to_string() }
    }

    /// Rebuild state from the generations present in the store.
    ///
    /// Our generation is only ever stored complete, so if it is present it
    /// resumes as active; leftovers from older generations are purged by the
    /// caller. Otherwise the newest other generation keeps serving while ours
    /// installs.
    pub fn recover(self, generations: &[GenerationInfo]) -> Result<Self, Error> {
        if !matches!(self.state, LifecycleState::Parsed | LifecycleState::Redundant) {
            return Err(self.invalid("recover"));
        }

        if generations.iter().any(|info| info.name == self.generation) {
            let controlling = Some(self.generation.clone());
            return Ok(Self { state: LifecycleState::Active, controlling, ..self });
        }

        let previous = generations
            .iter()
            .rev()
            .find(|info| info.name != self.generation)
            .map(|info| info.name.clone());
        Ok(Self { state: LifecycleState::Parsed, controlling: previous, ..self })
    }

    pub fn begin_install(self) -> Result<Self, Error> {
        match self.state {
            LifecycleState::Parsed | LifecycleState::Installed | LifecycleState::Redundant => {
                Ok(Self { state: LifecycleState::Installing, ..self })
            }
            _ => Err(self.invalid("install")),
        }
    }

    pub fn install_succeeded(self) -> Result<Self, Error> {
        match self.state {
            LifecycleState::Installing => Ok(Self { state: LifecycleState::Installed, ..self }),
            _ => Err(self.invalid("finish install")),
        }
    }

    /// Install failed: the generation can never activate.
    pub fn install_failed(self) -> Self {
        Self { state: LifecycleState::Redundant, ..self }
    }

    /// Skip the waiting period once installed.
    pub fn request_skip_waiting(self) -> Self {
        Self { skip_waiting: true, ..self }
    }

    /// Our generation becomes current before anything older is purged.
    pub fn begin_activate(self) -> Result<Self, Error> {
        match self.state {
            LifecycleState::Installed => {
                let controlling = Some(self.generation.clone());
                Ok(Self { state: LifecycleState::Activating, controlling, ..self })
            }
            _ => Err(self.invalid("activate")),
        }
    }

    /// Purge done; claim every client.
    pub fn activated(self) -> Result<Self, Error> {
        match self.state {
            LifecycleState::Activating => Ok(Self { state: LifecycleState::Active, skip_waiting: false, ..self }),
            _ => Err(self.invalid("finish activate")),
        }
    }

    /// Purge failed: back to waiting, with `previous` serving again.
    pub fn activation_failed(self, previous: Option<String>) -> Self {
        Self { state: LifecycleState::Installed, controlling: previous, skip_waiting: false, ..self }
    }
}
