use std::time::Duration;

/// Default deadline for an external command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for a forced mount cleanup.
pub const DEFAULT_MOUNT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Time budgets handed to the [`Executor`](crate::Executor) and the
/// [`Reconciler`](crate::Reconciler) when they are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Applied to every command that does not pass its own timeout.
    pub command: Duration,
    /// Applied to forced unmounts during mount cleanup.
    pub mount_cleanup: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND_TIMEOUT,
            mount_cleanup: DEFAULT_MOUNT_CLEANUP_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn new(command: Duration, mount_cleanup: Duration) -> Self {
        Self {
            command,
            mount_cleanup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_default_is_shorter_than_command_default() {
        let t = Timeouts::default();
        assert_eq!(t.command, Duration::from_secs(60));
        assert_eq!(t.mount_cleanup, Duration::from_secs(30));
        assert!(t.mount_cleanup < t.command);
    }
}
