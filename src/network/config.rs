// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Registry and transport configuration

use std::time::Duration;

/// Interception registry configuration
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Prefix prepended to minted interception ids
    pub id_prefix: String,
}

impl RegistryConfig {
    /// Create a new registry config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set id prefix
    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }
}

/// Intercepting transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a job waits for a decision before continuing unchanged
    pub decision_timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: u32,
    /// Ask the handler about 401/407 challenges
    pub intercept_auth_challenges: bool,
    /// Maximum request body bytes copied into notifications
    pub max_body_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            decision_timeout: Duration::from_secs(30),
            max_redirects: 10,
            intercept_auth_challenges: true,
            max_body_size: 64 * 1024,
        }
    }
}

impl TransportConfig {
    /// Create a new transport config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set decision timeout
    pub fn decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }

    /// Set max redirects
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    /// Enable/disable auth challenge interception
    pub fn intercept_auth_challenges(mut self, enabled: bool) -> Self {
        self.intercept_auth_challenges = enabled;
        self
    }

    /// Set notification body limit
    pub fn max_body_size(mut self, max: usize) -> Self {
        self.max_body_size = max;
        self
    }

    /// Config for an automated policy that answers immediately
    pub fn for_automation() -> Self {
        Self {
            decision_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Config for a human in the loop
    pub fn for_manual_review() -> Self {
        Self {
            decision_timeout: Duration::from_secs(300),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config() {
        let config = TransportConfig::new()
            .decision_timeout(Duration::from_millis(250))
            .max_redirects(3)
            .intercept_auth_challenges(false);

        assert_eq!(config.decision_timeout, Duration::from_millis(250));
        assert_eq!(config.max_redirects, 3);
        assert!(!config.intercept_auth_challenges);
    }

    #[test]
    fn test_presets() {
        assert!(TransportConfig::for_manual_review().decision_timeout
            > TransportConfig::for_automation().decision_timeout);
        assert_eq!(RegistryConfig::new().id_prefix("id-").id_prefix, "id-");
    }
}
