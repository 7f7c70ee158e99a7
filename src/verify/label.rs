//! Root filesystem label check

use std::path::Path;

use log::{debug, warn};

use super::{ModelResult, MountOutcome};
use crate::config::Config;
use crate::error::MountckError;
use crate::exe::{CommandRunner, Invocation};

/// Key recorded when no partition was a root candidate
pub const NO_ROOTFS: &str = "no rootfs found!";

/// Key recorded when the root candidate carries the wrong label
pub fn label_mismatch_key(config: &Config) -> String {
    format!("rootfs label != {}", config.root_label)
}

pub fn blkid_label(config: &Config, device: &Path) -> Invocation {
    Invocation::new(&config.tools.blkid)
        .arg("-s")
        .arg("LABEL")
        .arg("-o")
        .arg("value")
        .arg(device)
}

/// Check that the root candidate carries the required label.
///
/// The label is read from the raw device, so the check runs whether or not
/// the candidate's own mount succeeded.
pub fn check_root_label(
    runner: &dyn CommandRunner,
    config: &Config,
    root: Option<&Path>,
    result: &mut ModelResult,
) -> Result<(), MountckError> {
    let Some(device) = root else {
        warn!("{}: no root filesystem candidate", result.model);
        result.record(NO_ROOTFS, MountOutcome::failed("", ""));
        return Ok(());
    };

    let output = runner.run(&blkid_label(config, device))?;
    let label = output.stdout.trim();
    debug!("{} is labeled {:?}", device.display(), label);

    if label != config.root_label {
        warn!(
            "{}: root filesystem {} is labeled {:?}, expected {:?}",
            result.model,
            device.display(),
            label,
            config.root_label
        );
        result.record(
            label_mismatch_key(config),
            MountOutcome::failed(output.stdout.clone(), output.stderr),
        );
    }

    Ok(())
}
