//! Mining run loop.
//!
//! Each cycle follows the same steps:
//! 1. Exchange the Telegram session for init-data if none is held
//! 2. Fetch the profile; without it the cycle ends early
//! 3. Fetch both price tables and the farm
//! 4. Claim if the cooldown elapsed, then re-read the farm
//! 5. Try each upgrade track independently
//! 6. Sleep until the next claim (or the default sleep)
//!
//! Failed requests are logged, followed by a fixed backoff, and the work
//! depending on them is skipped for this cycle. Only an invalid Telegram
//! session stops the loop.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::policy::{self, LevelTables, UpgradeDecision, UpgradeTrack};
use crate::config::MinerSettings;
use crate::game::{ApiError, FarmInfo, GameApi};
use crate::telegram::{AuthError, InitData, InitDataProvider};

/// Errors that end a mining run.
#[derive(Debug, Error)]
pub enum MinerError {
    #[error("Invalid session: {0}")]
    InvalidSession(String),
}

/// A successful upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub track: UpgradeTrack,
    pub level: u32,
}

/// What happened during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Whether the cycle ran with valid init-data.
    pub authenticated: bool,
    pub claimed: bool,
    pub upgrades: Vec<UpgradeOutcome>,
    /// Last known balance, if the profile could be read.
    pub balance: Option<f64>,
    /// How long to wait before the next cycle.
    pub sleep: Duration,
}

impl CycleReport {
    const fn new(sleep: Duration) -> Self {
        Self {
            authenticated: false,
            claimed: false,
            upgrades: Vec::new(),
            balance: None,
            sleep,
        }
    }
}

/// Single-account miner.
pub struct Miner<A> {
    /// Account name used as the log prefix.
    name: String,

    /// Credential exchanger.
    auth: A,

    /// Game backend client.
    api: GameApi,

    settings: MinerSettings,

    /// Current init-data, `None` until exchanged or after rejection.
    session: Option<InitData>,
}

impl<A: InitDataProvider> Miner<A> {
    #[must_use]
    pub fn new(name: impl Into<String>, auth: A, api: GameApi, settings: MinerSettings) -> Self {
        Self {
            name: name.into(),
            auth,
            api,
            settings,
            session: None,
        }
    }

    /// Whether init-data is currently held.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Runs until the session turns out to be invalid.
    pub async fn run(&mut self) -> Result<(), MinerError> {
        if self.settings.proxy.is_some() {
            self.check_proxy().await;
        }

        loop {
            let report = self.run_cycle().await?;

            if report.authenticated {
                info!(
                    "{} | Sleeping for the next claim {}s",
                    self.name,
                    report.sleep.as_secs()
                );
            } else {
                info!(
                    "{} | Retrying authorization in {}s",
                    self.name,
                    report.sleep.as_secs()
                );
            }
            tokio::time::sleep(report.sleep).await;
        }
    }

    /// Logs the public IP seen through the proxy. Never fails the run.
    pub async fn check_proxy(&self) -> Option<String> {
        let proxy = self
            .settings
            .proxy
            .as_ref()
            .map_or_else(|| "none".to_owned(), ToString::to_string);

        match self.api.check_proxy().await {
            Ok(ip) => {
                info!("{} | Proxy IP: {}", self.name, ip);
                Some(ip)
            }
            Err(e) => {
                error!("{} | Proxy: {} | Error: {}", self.name, proxy, e);
                None
            }
        }
    }

    /// Performs one cycle and reports how long to sleep afterwards.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, MinerError> {
        let Some(session) = self.ensure_session().await? else {
            return Ok(CycleReport::new(self.settings.error_backoff()));
        };

        // Request futures borrow this handle while `attempt` borrows `self`.
        let api = self.api.clone();

        let mut report = CycleReport::new(self.settings.default_sleep());
        report.authenticated = true;

        let Some(profile) = self
            .attempt("getting profile", api.profile(&session))
            .await
        else {
            error!("{} | Cannot get profile info", self.name);
            return Ok(report);
        };

        let mut balance = profile.tokens;
        report.balance = Some(balance);
        info!("{} | Balance is {:.6}", self.name, balance);

        let tables = LevelTables {
            toolkit: self
                .attempt("getting toolkit settings", api.toolkit_settings(&session))
                .await
                .unwrap_or_default(),
            workbench: self
                .attempt(
                    "getting workbench settings",
                    api.workbench_settings(&session),
                )
                .await
                .unwrap_or_default(),
        };

        let Some(mut farm) = self
            .attempt("getting farm", api.farm(&session))
            .await
        else {
            error!("{} | Cannot get farm info", self.name);
            return Ok(report);
        };

        if policy::is_claim_possible(Some(&farm))
            && let Some(claim) = self.attempt("claiming", api.claim(&session)).await
        {
            balance = claim.tokens;
            report.claimed = true;
            report.balance = Some(balance);
            info!(
                "{} | Claimed successfully, new balance is {:.6}",
                self.name, balance
            );

            let refreshed = self.attempt("getting farm", api.farm(&session)).await;
            report.sleep =
                policy::sleep_time_to_claim(refreshed.as_ref(), self.settings.default_sleep());
            if let Some(refreshed) = refreshed {
                farm = refreshed;
            }
        }

        for track in UpgradeTrack::ALL {
            let Some((level, upgraded)) = self
                .try_upgrade(&session, track, &farm, &tables, balance)
                .await
            else {
                continue;
            };

            let level = track.level(&upgraded).unwrap_or(level);
            report.upgrades.push(UpgradeOutcome { track, level });
            report.sleep =
                policy::sleep_time_to_claim(Some(&upgraded), self.settings.default_sleep());

            // The next track must be priced against the post-upgrade balance.
            let Some(profile) = self
                .attempt("getting profile", api.profile(&session))
                .await
            else {
                error!(
                    "{} | {} upgraded to level {}, but the new balance is unknown",
                    self.name, track, level
                );
                break;
            };

            balance = profile.tokens;
            report.balance = Some(balance);
            info!(
                "{} | {} upgraded successfully to level {}, new balance is {:.6}",
                self.name, track, level, balance
            );
        }

        Ok(report)
    }

    /// Returns the held init-data, exchanging a new one when needed.
    ///
    /// `Ok(None)` means the exchange failed but may be retried.
    async fn ensure_session(&mut self) -> Result<Option<InitData>, MinerError> {
        if let Some(session) = &self.session {
            return Ok(Some(session.clone()));
        }

        match self.auth.init_data().await {
            Ok(session) => {
                info!("{} | Authorized in the mini-app", self.name);
                self.session = Some(session.clone());
                Ok(Some(session))
            }
            Err(AuthError::InvalidSession(name)) => {
                error!("{} | Invalid Session", self.name);
                Err(MinerError::InvalidSession(name))
            }
            Err(AuthError::Failed(e)) => {
                error!("{} | Unknown error during Authorization: {}", self.name, e);
                Ok(None)
            }
        }
    }

    /// Upgrades `track` if the policy allows it.
    ///
    /// Returns the purchased level and the farm state from the response.
    async fn try_upgrade(
        &mut self,
        session: &InitData,
        track: UpgradeTrack,
        farm: &FarmInfo,
        tables: &LevelTables,
        balance: f64,
    ) -> Option<(u32, FarmInfo)> {
        match policy::decide_upgrade(track, farm, tables, balance, &self.settings) {
            UpgradeDecision::Disabled => None,
            UpgradeDecision::LevelUnknown => {
                error!("{} | Cannot upgrade {}, current level unknown", self.name, track);
                None
            }
            UpgradeDecision::CappedBySettings => {
                info!(
                    "{} | {} upgraded to maximum level due settings",
                    self.name, track
                );
                None
            }
            UpgradeDecision::NotConfigured => {
                error!("{} | Cannot upgrade {}, error in settings", self.name, track);
                None
            }
            UpgradeDecision::MaxLevelReached => {
                info!("{} | {} upgraded to maximum level", self.name, track);
                None
            }
            UpgradeDecision::InsufficientFunds { price } => {
                info!(
                    "{} | Cannot upgrade {}, not enough tokens ({:.6} < {:.6})",
                    self.name, track, balance, price
                );
                None
            }
            UpgradeDecision::Upgrade { level, price } => {
                info!(
                    "{} | {} upgrade to level {} for {:.6} is possible, trying to upgrade",
                    self.name, track, level, price
                );
                let api = self.api.clone();
                let upgraded = match track {
                    UpgradeTrack::Speed => {
                        self.attempt("upgrading speed (workbench)", api.upgrade_workbench(session))
                            .await
                    }
                    UpgradeTrack::Storage => {
                        self.attempt("upgrading storage (toolkit)", api.upgrade_toolkit(session))
                            .await
                    }
                };
                upgraded.map(|farm| (level, farm))
            }
        }
    }

    /// Awaits a request, turning failure into a logged backoff.
    ///
    /// A rejected init-data is dropped so the next cycle exchanges a new one.
    async fn attempt<T>(
        &mut self,
        operation: &str,
        request: impl Future<Output = Result<T, ApiError>>,
    ) -> Option<T> {
        match request.await {
            Ok(value) => Some(value),
            Err(e) => {
                error!("{} | Unknown error {}: {}", self.name, operation, e);
                if e.is_unauthorized() && self.session.take().is_some() {
                    warn!(
                        "{} | Init-data rejected, will re-authorize next cycle",
                        self.name
                    );
                }
                tokio::time::sleep(self.settings.error_backoff()).await;
                None
            }
        }
    }
}

impl<A> std::fmt::Debug for Miner<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Miner")
            .field("name", &self.name)
            .field("logged_in", &self.session.is_some())
            .finish_non_exhaustive()
    }
}
