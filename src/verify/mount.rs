//! Mount every mountable partition once

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use log::{debug, info};

use super::{ModelResult, MountOutcome};
use crate::cleanup::ResourceStack;
use crate::config::Config;
use crate::error::MountckError;
use crate::exe::{CommandRunner, Invocation};
use crate::kpartx::DeviceMapping;

/// Mount each mapped partition on its own fresh directory.
///
/// Returns the root filesystem candidate: the last mountable device, which
/// by gadget convention is the writable partition. Mount failures are
/// recorded, not returned.
pub fn mount_partitions<'a>(
    runner: &'a dyn CommandRunner,
    config: &Config,
    model: &str,
    mappings: &[DeviceMapping],
    resources: &mut ResourceStack<'a>,
    result: &mut ModelResult,
) -> Result<Option<PathBuf>, MountckError> {
    let mut root = None;

    for mapping in mappings {
        let mount_point = create_mount_point(config, model, mapping.slot)?;
        let dir = mount_point.clone();
        resources.push(format!("mount point {}", mount_point.display()), move || {
            // never remove_dir_all: a busy mount must not be emptied
            fs::remove_dir(&dir).with_context(|| format!("Failed to remove {}", dir.display()))
        });

        root = Some(mapping.device.clone());

        let output = runner.run(
            &Invocation::new(&config.tools.mount)
                .arg(&mapping.device)
                .arg(&mount_point),
        )?;
        let key = mapping.device.display().to_string();

        if output.success() {
            debug!("Mounted {} on {}", key, mount_point.display());
            result.record(key, MountOutcome::passed());

            let umount = Invocation::new(&config.tools.umount).arg(&mount_point);
            resources.push(format!("mount {}", mount_point.display()), move || {
                runner.run_and_check(&umount)
            });
        } else {
            info!("{}: {} did not mount: {}", model, key, output.explain_exit());
            result.record(key, MountOutcome::failed(output.stdout, output.stderr));
        }
    }

    Ok(root)
}

/// Create a uniquely named mount point for `slot` of `model`
fn create_mount_point(config: &Config, model: &str, slot: usize) -> Result<PathBuf, MountckError> {
    let dir = tempfile::Builder::new()
        .prefix(&format!("{}-{}-", model, slot))
        .tempdir_in(&config.mount_root)
        .map_err(|e| MountckError::from(e).with_path(&config.mount_root))?;
    Ok(dir.keep())
}
