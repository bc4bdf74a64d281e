//! Network state monitoring.
//!
//! `NetworkMonitor` holds the last known connectivity state, probes it on
//! demand, and fans changes out to registered callbacks and a watch channel.

pub mod monitor;
pub mod probe;

pub use monitor::{NetworkMonitor, Subscription};
pub use probe::{ConnectivityProbe, HttpProbe};
