//! Network gate module
//!
//! Makes sure the VPN link is up before any remote host is contacted and tears
//! it down afterwards.
//!
//! # Overview
//!
//! The gate is built from two capabilities so tests can swap either one:
//! - `LinkProbe` - answers "is the link up right now"
//! - `GateController` - launches and disconnects the connection manager
//!
//! `NetworkGate` owns the bounded polling loop on top of them.

mod process;

pub use process::{GlobalProtectController, RouteTableProbe};

use crate::config::GateConfig;
use crate::error::Result;
use std::time::Duration;
use tracing::{error, info, warn};

/// Best-effort check of the link state
pub trait LinkProbe {
    /// True when the gate link is currently up. Failures read as `false`.
    fn is_connected(&self) -> bool;
}

/// Drives the external connection manager
pub trait GateController {
    /// Start the manager without waiting for it
    fn launch(&self) -> Result<()>;

    /// Ask the manager to disconnect, waiting at most `timeout`
    fn disconnect(&self, timeout: Duration) -> Result<()>;
}

/// Precondition link that must be up before any transfer
pub struct NetworkGate {
    probe: Box<dyn LinkProbe>,
    controller: Box<dyn GateController>,
    config: GateConfig,
}

impl NetworkGate {
    /// Create a gate from its capabilities
    pub fn new(
        probe: Box<dyn LinkProbe>,
        controller: Box<dyn GateController>,
        config: GateConfig,
    ) -> Self {
        Self {
            probe,
            controller,
            config,
        }
    }

    /// Gate backed by the routing table and the GlobalProtect executable
    pub fn global_protect(config: GateConfig) -> Self {
        let probe = RouteTableProbe::new(config.adapter_name.clone());
        let controller = GlobalProtectController::new(config.manager_path.clone());
        Self::new(Box::new(probe), Box::new(controller), config)
    }

    /// Gate configuration
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Bring the link up, waiting up to `max_polls * poll_interval`.
    ///
    /// Returns immediately when the link is already up. Returns `false` when
    /// the manager cannot be launched or the wait expires.
    pub fn ensure_connected(&self) -> bool {
        info!("Checking VPN connection");

        if self.probe.is_connected() {
            info!("VPN already connected");
            return true;
        }

        info!(
            manager = %self.config.manager_path.display(),
            "VPN not connected, launching connection manager"
        );
        if let Err(e) = self.controller.launch() {
            error!("{e}");
            return false;
        }

        info!("{}", "=".repeat(50));
        info!("PLEASE CONNECT TO THE VPN ({})", self.config.portal);
        info!("Click 'Connect' in the GlobalProtect window");
        info!("(MFA confirmation may be required)");
        info!("{}", "=".repeat(50));
        info!(
            "Waiting for VPN (checking every {}s)",
            self.config.poll_interval.as_secs()
        );

        for attempt in 1..=self.config.max_polls {
            std::thread::sleep(self.config.poll_interval);

            if self.probe.is_connected() {
                info!("VPN connected");
                return true;
            }

            if self.config.progress_every > 0 && attempt % self.config.progress_every == 0 {
                info!(
                    "Still waiting for VPN ({}s)",
                    (self.config.poll_interval * attempt).as_secs()
                );
            }
        }

        error!(
            "Timeout: VPN not connected after {}s",
            self.config.max_wait().as_secs()
        );
        false
    }

    /// Tear the link down. Failures are logged, never escalated.
    pub fn ensure_disconnected(&self) -> bool {
        info!("Disconnecting VPN");
        match self.controller.disconnect(self.config.disconnect_timeout) {
            Ok(()) => {
                info!("VPN disconnected");
                true
            }
            Err(e) => {
                warn!("Failed to disconnect VPN: {e}");
                false
            }
        }
    }
}
