use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant},
};
use ts_rs::TS;

use super::{
    countdown::{Countdown, DEFAULT_COUNTDOWN_SEED},
    settings::SettingsSource,
};
use crate::models::ADMIN_ROLE;

pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_PATH: &str = "/admin";
pub const DASHBOARD_PATH: &str = "/dashboard";

const SPLASH_TITLE: &str = "Loading...";
const SPLASH_SUBTITLE: &str = "Please wait while we set things up.";

// --- Inputs ---

/// AuthState
///
/// What the client knows locally about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    pub role: Option<String>,
}

impl AuthState {
    pub fn signed_in(role: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            role: Some(role.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// RouteRequirements
///
/// Declared by each guarded route. By default a route needs a signed-in user, is not
/// admin-only, and sends anonymous visitors to `/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequirements {
    pub require_auth: bool,
    pub require_admin: bool,
    pub redirect_to: String,
}

impl Default for RouteRequirements {
    fn default() -> Self {
        Self {
            require_auth: true,
            require_admin: false,
            redirect_to: LOGIN_PATH.to_string(),
        }
    }
}

impl RouteRequirements {
    pub fn admin() -> Self {
        Self {
            require_admin: true,
            ..Self::default()
        }
    }

    pub fn public() -> Self {
        Self {
            require_auth: false,
            ..Self::default()
        }
    }
}

/// SettingsStatus
///
/// Progress of the settings fetch started when the guard mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsStatus {
    Loading,
    Ready { maintenance_mode: bool },
}

/// GuardInput
///
/// Everything one evaluation looks at.
#[derive(Debug, Clone)]
pub struct GuardInput<'a> {
    pub auth: &'a AuthState,
    pub route: &'a RouteRequirements,
    /// The location being rendered.
    pub path: &'a str,
    pub settings: SettingsStatus,
    pub countdown: Countdown,
}

// --- Output ---

/// GuardDecision
///
/// What the guarded region renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GuardDecision {
    /// Replace the location with the login page; `from` is where to return afterwards.
    RedirectToLogin { to: String, from: Option<String> },
    /// Full-page placeholder while settings load, so no guarded content flashes through.
    Splash { title: String, subtitle: String },
    RedirectToAdmin,
    RedirectToDashboard,
    /// Maintenance notice with the countdown text and the logout target.
    Maintenance { countdown: String, logout: String },
    RenderChildren,
}

impl GuardDecision {
    /// Target location when the decision is a redirect.
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GuardDecision::RedirectToLogin { to, .. } => Some(to),
            GuardDecision::RedirectToAdmin => Some(ADMIN_PATH),
            GuardDecision::RedirectToDashboard => Some(DASHBOARD_PATH),
            _ => None,
        }
    }
}

// --- Ordered rules ---

struct Rule {
    name: &'static str,
    decide: fn(&GuardInput<'_>) -> Option<GuardDecision>,
}

/// The rule table. Order is significant: the first rule that fires decides.
static RULES: [Rule; 5] = [
    Rule {
        name: "login-required",
        decide: login_required,
    },
    Rule {
        name: "settings-loading",
        decide: settings_loading,
    },
    Rule {
        name: "admin-home",
        decide: admin_home,
    },
    Rule {
        name: "admin-only",
        decide: admin_only,
    },
    Rule {
        name: "maintenance",
        decide: maintenance,
    },
];

fn login_required(input: &GuardInput<'_>) -> Option<GuardDecision> {
    (input.route.require_auth && !input.auth.is_authenticated).then(|| {
        GuardDecision::RedirectToLogin {
            to: input.route.redirect_to.clone(),
            from: Some(input.path.to_string()),
        }
    })
}

fn settings_loading(input: &GuardInput<'_>) -> Option<GuardDecision> {
    (input.settings == SettingsStatus::Loading).then(|| GuardDecision::Splash {
        title: SPLASH_TITLE.to_string(),
        subtitle: SPLASH_SUBTITLE.to_string(),
    })
}

// Admins only ever see the admin root among regular pages.
fn admin_home(input: &GuardInput<'_>) -> Option<GuardDecision> {
    (!input.route.require_admin && input.auth.is_admin() && input.path != ADMIN_PATH)
        .then_some(GuardDecision::RedirectToAdmin)
}

fn admin_only(input: &GuardInput<'_>) -> Option<GuardDecision> {
    (input.route.require_admin && !input.auth.is_admin())
        .then_some(GuardDecision::RedirectToDashboard)
}

fn maintenance(input: &GuardInput<'_>) -> Option<GuardDecision> {
    let maintenance_mode = matches!(
        input.settings,
        SettingsStatus::Ready {
            maintenance_mode: true
        }
    );
    (maintenance_mode && input.route.require_auth && !input.auth.is_admin()).then(|| {
        GuardDecision::Maintenance {
            countdown: input.countdown.format(),
            logout: LOGIN_PATH.to_string(),
        }
    })
}

/// evaluate
///
/// Runs the rule table against `input`; renders the children when no rule fires.
pub fn evaluate(input: &GuardInput<'_>) -> GuardDecision {
    RULES
        .iter()
        .find_map(|rule| {
            let decision = (rule.decide)(input)?;
            tracing::trace!(rule = rule.name, path = input.path, "guard rule fired");
            Some(decision)
        })
        .unwrap_or(GuardDecision::RenderChildren)
}

/// Names of the rules in evaluation order.
pub fn rule_order() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|rule| rule.name)
}

// --- Mounted guard ---

/// GuardConfig
///
/// `poll_interval` re-reads the settings periodically while mounted; without it the
/// flag is read once per mount, so a maintenance switch is only seen on the next mount.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub countdown_seed: Duration,
    pub poll_interval: Option<Duration>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            countdown_seed: DEFAULT_COUNTDOWN_SEED,
            poll_interval: None,
        }
    }
}

/// MountedGuard
///
/// A guard instance for one mounted region. Mounting starts two independent tasks,
/// the settings fetch and the one-second countdown timer; dropping the guard aborts
/// both so neither acts on a discarded view.
pub struct MountedGuard {
    auth: AuthState,
    settings: watch::Receiver<SettingsStatus>,
    countdown: watch::Receiver<Countdown>,
    tasks: Vec<JoinHandle<()>>,
}

impl MountedGuard {
    /// mount
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn mount(
        source: Arc<dyn SettingsSource>,
        auth: AuthState,
        credential: Option<String>,
        config: &GuardConfig,
    ) -> Self {
        let (settings_tx, settings) = watch::channel(SettingsStatus::Loading);
        let (countdown_tx, countdown) = watch::channel(Countdown::new(config.countdown_seed));

        let timer = tokio::spawn(run_countdown(countdown_tx));
        let fetch = tokio::spawn(run_settings_fetch(
            source,
            credential,
            config.poll_interval,
            settings_tx,
        ));

        Self {
            auth,
            settings,
            countdown,
            tasks: vec![timer, fetch],
        }
    }

    /// Decision for rendering `path` under `route` right now.
    pub fn decide(&self, route: &RouteRequirements, path: &str) -> GuardDecision {
        let input = GuardInput {
            auth: &self.auth,
            route,
            path,
            settings: self.settings_status(),
            countdown: *self.countdown.borrow(),
        };
        evaluate(&input)
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn settings_status(&self) -> SettingsStatus {
        *self.settings.borrow()
    }

    /// Seconds left on the maintenance countdown.
    pub fn time_left(&self) -> u64 {
        self.countdown.borrow().remaining()
    }

    /// Subscribes to countdown ticks, e.g. to re-render the maintenance page. The
    /// channel closes when the guard is dropped.
    pub fn countdown_updates(&self) -> watch::Receiver<Countdown> {
        self.countdown.clone()
    }

    /// Waits until the first settings fetch has finished.
    pub async fn settings_loaded(&mut self) -> SettingsStatus {
        let _ = self
            .settings
            .wait_for(|status| *status != SettingsStatus::Loading)
            .await;
        self.settings_status()
    }

    /// logout
    ///
    /// The maintenance page's logout action: forgets the local auth state and sends
    /// the user to the login page.
    pub fn logout(&mut self) -> GuardDecision {
        self.auth = AuthState::anonymous();
        GuardDecision::RedirectToLogin {
            to: LOGIN_PATH.to_string(),
            from: None,
        }
    }

    /// True once every background task has stopped.
    pub fn is_idle(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }
}

impl Drop for MountedGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn run_countdown(tx: watch::Sender<Countdown>) {
    let period = Duration::from_secs(1);
    let mut ticker = time::interval_at(Instant::now() + period, period);

    loop {
        ticker.tick().await;
        let mut finished = false;
        tx.send_modify(|countdown| finished = countdown.tick() == 0);
        if finished {
            break;
        }
    }
}

async fn run_settings_fetch(
    source: Arc<dyn SettingsSource>,
    credential: Option<String>,
    poll_interval: Option<Duration>,
    tx: watch::Sender<SettingsStatus>,
) {
    loop {
        let maintenance_mode = match source.fetch(credential.as_deref()).await {
            Ok(settings) => settings.maintenance_mode,
            Err(e) => {
                // Non-critical signal: never block navigation on it.
                tracing::warn!(error = %e, "system settings unavailable; assuming no maintenance");
                false
            }
        };
        tx.send_replace(SettingsStatus::Ready { maintenance_mode });

        match poll_interval {
            Some(every) => time::sleep(every).await,
            None => break,
        }
    }
}
