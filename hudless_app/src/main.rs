mod config;
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
mod login_item;
#[cfg(target_os = "macos")]
mod tray;

use config::Config;
use tracing::{info, warn};

const SHOW_INDICATOR_FLAG: &str = "--show-indicator";

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("hudless_app=info,hudless_lib=info,signal-tap=info")
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

/// Applies command-line overrides. Returns true when the config changed.
fn apply_args(config: &mut Config, args: impl IntoIterator<Item = String>) -> bool {
    let mut changed = false;
    for arg in args {
        match arg.as_str() {
            SHOW_INDICATOR_FLAG if !config.show_indicator => {
                config.show_indicator = true;
                changed = true;
            }
            SHOW_INDICATOR_FLAG => {}
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    changed
}

fn main() {
    init_tracing();
    info!("hudless starting");
    let mut config = Config::load();
    if apply_args(&mut config, std::env::args().skip(1)) {
        info!("menu bar icon restored from the command line");
        if let Err(err) = config.save() {
            warn!(?err, "failed to persist config");
        }
    }

    #[cfg(target_os = "macos")]
    tray::run(config);

    #[cfg(not(target_os = "macos"))]
    {
        tracing::error!("hudless only runs on macOS");
        std::process::exit(1);
    }
}
