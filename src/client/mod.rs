//! Client-side route guard.
//!
//! Mirrors the server's authorization decisions for a frontend: given the locally
//! stored auth state, a route's requirements and the platform's maintenance flag, it
//! decides what a guarded region renders. The decision itself is a pure ordered rule
//! table ([`guard::evaluate`]); [`guard::MountedGuard`] adds the asynchronous parts
//! (settings fetch, countdown timer) scoped to the guard's lifetime.

pub mod countdown;
pub mod guard;
pub mod settings;

pub use countdown::Countdown;
pub use guard::{
    AuthState, GuardConfig, GuardDecision, GuardInput, MountedGuard, RouteRequirements,
    SettingsStatus, evaluate,
};
pub use settings::{HttpSettingsClient, SettingsError, SettingsSource};
