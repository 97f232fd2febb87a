#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::time::Duration;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(60);

/// Create a configured `sitefreeze` command for integration tests.
///
/// The front key is cleared so every test states its auth setup
/// explicitly; color is off for stable assertions.
#[allow(dead_code)]
pub fn sitefreeze_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sitefreeze"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env_remove("SITEFREEZE_FRONT_KEY");
    cmd.env("NO_COLOR", "1");
    cmd
}
