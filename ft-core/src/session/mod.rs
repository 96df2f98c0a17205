//! Firewall sessions: what a device remembers about a flow so it can fast-path return traffic.
mod action;
mod info;
pub mod scope;

pub use self::action::SessionAction;
pub use self::info::{
    FirewallSessionTraceInfo,
    SessionReturn,
};
pub use self::scope::SessionScope;
