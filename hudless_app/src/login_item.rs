//! Start-at-login registration as a per-user LaunchAgent.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginItemStatus {
    Enabled,
    NotRegistered,
    RequiresApproval,
    NotFound,
    Unknown,
}

impl LoginItemStatus {
    pub fn is_enabled(self) -> bool {
        self == LoginItemStatus::Enabled
    }

    /// Folds what the launcher reports into a status. `requested` is true once
    /// registration succeeded in this process.
    fn classify<E>(launcher_found: bool, query: Result<bool, E>, requested: bool) -> LoginItemStatus {
        if !launcher_found {
            return LoginItemStatus::NotFound;
        }
        match query {
            Ok(true) => LoginItemStatus::Enabled,
            Ok(false) if requested => LoginItemStatus::RequiresApproval,
            Ok(false) => LoginItemStatus::NotRegistered,
            Err(_) => LoginItemStatus::Unknown,
        }
    }
}

impl fmt::Display for LoginItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoginItemStatus::Enabled => "Starts at login",
            LoginItemStatus::NotRegistered => "Not registered",
            LoginItemStatus::RequiresApproval => "Needs approval in Login Items settings",
            LoginItemStatus::NotFound => "App executable not found",
            LoginItemStatus::Unknown => "Status unknown",
        })
    }
}

#[cfg(target_os = "macos")]
pub use macos::LoginItem;

#[cfg(target_os = "macos")]
mod macos {
    use super::LoginItemStatus;
    use auto_launch::{AutoLaunch, MacOSLaunchMode};
    use tracing::{info, warn};

    const APP_NAME: &str = "hudless";
    const APP_BUNDLE_IDENTIFIER: &str = "dev.hudless.app";

    pub struct LoginItem {
        launcher: Option<AutoLaunch>,
        requested: bool,
    }

    fn launcher() -> Option<AutoLaunch> {
        let exe = match std::env::current_exe() {
            Ok(path) => path.canonicalize().unwrap_or(path),
            Err(err) => {
                warn!(%err, "cannot resolve current executable for login item");
                return None;
            }
        };
        let exe_path = exe.to_string_lossy().to_string();
        Some(AutoLaunch::new(
            APP_NAME,
            &exe_path,
            MacOSLaunchMode::LaunchAgent,
            &[] as &[&str],
            &[APP_BUNDLE_IDENTIFIER],
            "",
        ))
    }

    impl LoginItem {
        pub fn new() -> LoginItem {
            LoginItem {
                launcher: launcher(),
                requested: false,
            }
        }

        pub fn status(&self) -> LoginItemStatus {
            let query = match &self.launcher {
                Some(launcher) => launcher.is_enabled(),
                None => Ok(false),
            };
            if let Err(err) = &query {
                warn!(%err, "failed to query login item state");
            }
            LoginItemStatus::classify(self.launcher.is_some(), query, self.requested)
        }

        /// Registers or unregisters. Failures are logged and returned; the
        /// caller keeps running either way.
        pub fn set_enabled(&mut self, enabled: bool) -> anyhow::Result<LoginItemStatus> {
            let Some(launcher) = &self.launcher else {
                anyhow::bail!("{}", LoginItemStatus::NotFound);
            };
            let result = if enabled { launcher.enable() } else { launcher.disable() };
            if let Err(err) = result {
                warn!(%err, enabled, "failed to update login item");
                anyhow::bail!("failed to update login item: {err}");
            }
            self.requested = enabled;
            let status = self.status();
            info!(%status, "login item updated");
            Ok(status)
        }
    }
}
