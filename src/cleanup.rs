//! Scoped release of acquired resources
//!
//! Each successful acquisition (device mapping, mount-point directory,
//! mount) pushes its release onto a [`ResourceStack`]. The stack drains in
//! reverse order exactly once, either explicitly or when it is dropped on an
//! error or panic path.

use log::{debug, warn};

type ReleaseFn<'a> = Box<dyn FnOnce() -> anyhow::Result<()> + 'a>;

struct Release<'a> {
    what: String,
    action: ReleaseFn<'a>,
}

#[derive(Default)]
pub struct ResourceStack<'a> {
    releases: Vec<Release<'a>>,
}

impl<'a> ResourceStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to undo an acquisition that just succeeded
    pub fn push<F>(&mut self, what: impl Into<String>, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'a,
    {
        self.releases.push(Release {
            what: what.into(),
            action: Box::new(action),
        });
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Run every pending release, newest first.
    ///
    /// Failures are logged and skipped. Returns how many releases failed.
    pub fn release_all(&mut self) -> usize {
        let mut failures = 0;
        while let Some(release) = self.releases.pop() {
            debug!("Releasing {}", release.what);
            if let Err(e) = (release.action)() {
                warn!("Failed to release {}: {:#}", release.what, e);
                failures += 1;
            }
        }
        failures
    }
}

impl Drop for ResourceStack<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_releases_in_reverse_order() {
        let log = RefCell::new(Vec::new());
        let mut stack = ResourceStack::new();
        for name in ["mapping", "dir0", "mount0", "dir1"] {
            let log = &log;
            stack.push(name, move || {
                log.borrow_mut().push(name);
                Ok(())
            });
        }
        assert_eq!(stack.len(), 4);
        assert_eq!(stack.release_all(), 0);
        assert!(stack.is_empty());
        assert_eq!(*log.borrow(), vec!["dir1", "mount0", "dir0", "mapping"]);
    }

    #[test]
    fn test_failure_does_not_stop_draining() {
        let log = RefCell::new(Vec::new());
        let mut stack = ResourceStack::new();
        stack.push("first", || {
            log.borrow_mut().push("first");
            Ok(())
        });
        stack.push("broken", || anyhow::bail!("umount: target is busy"));
        stack.push("last", || {
            log.borrow_mut().push("last");
            Ok(())
        });

        assert_eq!(stack.release_all(), 1);
        assert_eq!(*log.borrow(), vec!["last", "first"]);
    }

    #[test]
    fn test_drop_releases_once() {
        let count = RefCell::new(0);
        {
            let mut stack = ResourceStack::new();
            stack.push("counted", || {
                *count.borrow_mut() += 1;
                Ok(())
            });
            stack.release_all();
        }
        assert_eq!(*count.borrow(), 1);

        {
            let mut stack = ResourceStack::new();
            stack.push("counted", || {
                *count.borrow_mut() += 1;
                Ok(())
            });
        }
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_drop_on_early_return() {
        fn acquire_then_fail(log: &RefCell<Vec<&'static str>>) -> anyhow::Result<()> {
            let mut stack = ResourceStack::new();
            stack.push("dir", || {
                log.borrow_mut().push("rmdir");
                Ok(())
            });
            stack.push("mount", || {
                log.borrow_mut().push("umount");
                Ok(())
            });
            anyhow::bail!("blkid could not be run");
        }

        let log = RefCell::new(Vec::new());
        assert!(acquire_then_fail(&log).is_err());
        assert_eq!(*log.borrow(), vec!["umount", "rmdir"]);
    }
}
