//! Device-mapper partition activation via kpartx
//!
//! `kpartx -avs` prints one line per mapped partition, in partition table
//! order:
//!
//! ```text
//! add map loop0p1 (253:0): 0 2048 linear 7:0 2048
//! ```
//!
//! The lines carry no hint of which gadget structure they belong to, so
//! they are correlated with the expected-mountability sequence by position.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::MountckError;
use crate::exe::Invocation;

/// A mapped partition that is expected to mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMapping {
    /// Position in the expected-mountability sequence
    pub slot: usize,
    /// Full device path, e.g. `/dev/mapper/loop0p2`
    pub device: PathBuf,
}

/// Activation output and gadget expectation disagree on partition count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountMismatch {
    pub mapped: usize,
    pub expected: usize,
}

pub fn activate(config: &Config, image: &Path) -> Invocation {
    Invocation::new(&config.tools.kpartx).arg("-avs").arg(image)
}

pub fn deactivate(config: &Config, image: &Path) -> Invocation {
    Invocation::new(&config.tools.kpartx).arg("-ds").arg(image)
}

/// Parse activation output into short device names, in output order.
///
/// Any non-blank line that is not `add map <name> ...` means the tool's
/// output format is not what the correlation relies on, which is fatal.
pub fn parse_activation_output(output: &str) -> Result<Vec<String>, MountckError> {
    let mut names = Vec::new();

    for (lineno, line) in output.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (None, _, _) => continue,
            (Some("add"), Some("map"), Some(name)) => names.push(name.to_string()),
            _ => {
                return Err(MountckError::parse_error(format!(
                    "Unexpected kpartx output on line {}: {:?}",
                    lineno + 1,
                    line
                )))
            }
        }
    }

    Ok(names)
}

/// Keep the mapped devices whose slot is expected to be mountable.
///
/// The two sequences must have the same length; otherwise the positions
/// cannot be trusted and nothing is returned.
pub fn select_mountable(
    names: &[String],
    expected: &[bool],
    mapper_prefix: &Path,
) -> Result<Vec<DeviceMapping>, CountMismatch> {
    if names.len() != expected.len() {
        return Err(CountMismatch {
            mapped: names.len(),
            expected: expected.len(),
        });
    }

    Ok(names
        .iter()
        .zip(expected)
        .enumerate()
        .filter(|(_, (_, mountable))| **mountable)
        .map(|(slot, (name, _))| DeviceMapping {
            slot,
            device: mapper_prefix.join(name),
        })
        .collect())
}
