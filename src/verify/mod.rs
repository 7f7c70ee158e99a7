//! Per-model image verification
//!
//! Maps the partitions of a disk image with kpartx, mounts every partition
//! the gadget says should be mountable, and checks the root filesystem
//! label. Everything acquired along the way is released before
//! [`verify_image`] returns, including on error.

pub mod label;
pub mod mount;

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;
use log::{info, warn};

use crate::cleanup::ResourceStack;
use crate::config::Config;
use crate::error::MountckError;
use crate::exe::CommandRunner;
use crate::gadget::{expected_mountability, Volume};
use crate::kpartx::{self, DeviceMapping};

/// Key recorded when kpartx itself exits non-zero
pub const ACTIVATION_FAILED: &str = "device mapping activation failed";

/// Key recorded when kpartx maps a different number of partitions than the
/// gadget predicts
pub const COUNT_MISMATCH: &str = "device mapping count mismatch";

/// Outcome of one mount attempt or check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl MountOutcome {
    pub fn passed() -> Self {
        Self {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn failed(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// All outcomes for one model, ordered by key
#[derive(Debug, Clone)]
pub struct ModelResult {
    pub model: String,
    entries: BTreeMap<String, MountOutcome>,
}

impl ModelResult {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, key: impl Into<String>, outcome: MountOutcome) {
        self.entries.insert(key.into(), outcome);
    }

    pub fn get(&self, key: &str) -> Option<&MountOutcome> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &MountOutcome)> {
        self.entries.iter().map(|(key, outcome)| (key.as_str(), outcome))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &MountOutcome)> {
        self.entries().filter(|(_, outcome)| !outcome.success)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_ok(&self) -> bool {
        self.entries.values().all(|outcome| outcome.success)
    }

    /// Status line, followed by the diagnostics of every failed entry
    pub fn render(&self) -> String {
        if self.is_ok() {
            return format!("{}: {}", self.model, "OK".green());
        }

        let mut out = format!("{}: {}", self.model, "NOT OK".red());
        for (key, outcome) in self.failures() {
            out.push_str(&format!("\n  [FAIL] {}", key));
            if !outcome.stdout.is_empty() {
                out.push_str(&format!("\n    stdout: {}", outcome.stdout.trim_end()));
            }
            if !outcome.stderr.is_empty() {
                out.push_str(&format!("\n    stderr: {}", outcome.stderr.trim_end()));
            }
        }
        out
    }
}

/// Verify one disk image against the volume it was built from.
///
/// Expected failures (a partition that does not mount, a wrong root label)
/// land in the returned [`ModelResult`]. An `Err` means the harness could not
/// make sense of the gadget or the tools and the run should stop.
pub fn verify_image(
    runner: &dyn CommandRunner,
    config: &Config,
    model: &str,
    volume: &Volume,
    image: &Path,
) -> Result<ModelResult, MountckError> {
    if !image.exists() {
        return Err(MountckError::file_not_found(image));
    }

    let expected = expected_mountability(volume);
    let mut result = ModelResult::new(model);
    let mut resources = ResourceStack::new();

    let mappings = map_partitions(runner, config, image, &expected, &mut resources, &mut result)?;
    let root =
        mount::mount_partitions(runner, config, model, &mappings, &mut resources, &mut result)?;
    label::check_root_label(runner, config, root.as_deref(), &mut result)?;

    let failed = resources.release_all();
    if failed > 0 {
        warn!("{}: {} resource(s) could not be released", model, failed);
    }

    info!(
        "{}: {} of {} checks passed",
        model,
        result.len() - result.failures().count(),
        result.len()
    );
    Ok(result)
}

/// Activate device mappings for `image` and keep the mountable ones.
fn map_partitions<'a>(
    runner: &'a dyn CommandRunner,
    config: &Config,
    image: &Path,
    expected: &[bool],
    resources: &mut ResourceStack<'a>,
    result: &mut ModelResult,
) -> Result<Vec<DeviceMapping>, MountckError> {
    let output = runner.run(&kpartx::activate(config, image))?;
    if !output.success() {
        warn!("kpartx could not map {}: {}", image.display(), output.explain_exit());
        result.record(ACTIVATION_FAILED, MountOutcome::failed(output.stdout, output.stderr));
        return Ok(Vec::new());
    }

    let deactivate = kpartx::deactivate(config, image);
    resources.push(format!("device mappings of {}", image.display()), move || {
        runner.run_and_check(&deactivate)
    });

    let names = kpartx::parse_activation_output(&output.stdout)?;
    match kpartx::select_mountable(&names, expected, &config.mapper_prefix) {
        Ok(mappings) => Ok(mappings),
        Err(mismatch) => {
            warn!(
                "kpartx mapped {} partitions of {}, gadget predicts {}",
                mismatch.mapped,
                image.display(),
                mismatch.expected
            );
            result.record(COUNT_MISMATCH, MountOutcome::failed(output.stdout, output.stderr));
            Ok(Vec::new())
        }
    }
}
