//! Startup mode signal published by the host.

use common::config::StartupMode;

/// Tells the cleanup how the host repository was started.
#[cfg_attr(test, mockall::automock)]
pub trait StartupHandler: Send + Sync {
    fn startup_mode(&self) -> StartupMode;
}

/// A fixed mode, typically taken from configuration or the command line.
impl StartupHandler for StartupMode {
    fn startup_mode(&self) -> StartupMode {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_mode() {
        assert_eq!(StartupMode::Update.startup_mode(), StartupMode::Update);
        assert_eq!(StartupMode::default().startup_mode(), StartupMode::Restart);
    }
}
