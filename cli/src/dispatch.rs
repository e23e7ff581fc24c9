//! Hands wallet links to the user (or the desktop) from a terminal

use std::process::{Command, ExitStatus};
use std::thread::{self, JoinHandle};

use colored::Colorize;
use tracing::{debug, warn};
use url::Url;
use walletlink::UrlDispatcher;

/// Prints each link; with an opener also asks the OS to open it
pub struct TerminalDispatcher {
    opener: Option<String>,
}

impl TerminalDispatcher {
    pub fn new(launch: bool) -> Self {
        Self {
            opener: launch.then(|| default_opener().to_string()),
        }
    }

    /// Launch links with a specific program instead of the desktop default
    pub fn with_opener(program: impl Into<String>) -> Self {
        Self {
            opener: Some(program.into()),
        }
    }
}

fn default_opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Start `program <url>` and reap it on a background thread
///
/// The opener exits as soon as it has handed the link to the desktop, so
/// the thread is short-lived. Its handle yields the exit status, or `None`
/// if waiting failed.
fn launch(program: &str, url: &Url) -> Result<JoinHandle<Option<ExitStatus>>, String> {
    let mut child = Command::new(program)
        .arg(url.as_str())
        .spawn()
        .map_err(|e| format!("{} failed: {}", program, e))?;

    let program = program.to_string();
    Ok(thread::spawn(move || match child.wait() {
        Ok(status) => {
            if !status.success() {
                warn!(opener = %program, %status, "opener exited with failure");
            }
            Some(status)
        }
        Err(e) => {
            warn!(opener = %program, error = %e, "failed to wait for opener");
            None
        }
    }))
}

impl UrlDispatcher for TerminalDispatcher {
    fn open(&self, url: &Url) -> Result<(), String> {
        println!();
        println!("{}", "Open this link on the device running the wallet:".cyan());
        println!("  {}", url);
        println!();

        if let Some(opener) = &self.opener {
            debug!(%opener, "launching wallet link");
            launch(opener, url)?;
        }
        Ok(())
    }
}
