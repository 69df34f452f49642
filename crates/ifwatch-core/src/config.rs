//! Configuration types for the interface watcher system

use serde::{Deserialize, Serialize};

use crate::classify::AddressPropertiesInterest;

fn default_watcher_queue_capacity() -> usize {
    128
}

fn default_registration_channel_capacity() -> usize {
    16
}

/// Event loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLoopConfig {
    /// Maximum number of unconsumed events per watcher before it is
    /// considered unresponsive and closed
    #[serde(default = "default_watcher_queue_capacity")]
    pub watcher_queue_capacity: usize,

    /// Buffer size of the registration gateway
    #[serde(default = "default_registration_channel_capacity")]
    pub registration_channel_capacity: usize,
}

impl EventLoopConfig {
    pub fn new() -> Self {
        Self {
            watcher_queue_capacity: default_watcher_queue_capacity(),
            registration_channel_capacity: default_registration_channel_capacity(),
        }
    }

    pub fn with_watcher_queue_capacity(mut self, capacity: usize) -> Self {
        self.watcher_queue_capacity = capacity;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.watcher_queue_capacity == 0 {
            return Err(crate::Error::config("watcher queue capacity must be > 0"));
        }
        if self.registration_channel_capacity == 0 {
            return Err(crate::Error::config(
                "registration channel capacity must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What a watcher wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WatcherOptions {
    /// Address lifetime properties to report; unsubscribed ones are
    /// cleared from delivered addresses
    #[serde(default)]
    pub address_properties_interest: AddressPropertiesInterest,

    /// Report tentative and disabled addresses too
    #[serde(default)]
    pub include_non_assigned_addresses: bool,
}

impl WatcherOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interest(mut self, interest: AddressPropertiesInterest) -> Self {
        self.address_properties_interest = interest;
        self
    }

    pub fn include_non_assigned(mut self, include: bool) -> Self {
        self.include_non_assigned_addresses = include;
        self
    }
}
