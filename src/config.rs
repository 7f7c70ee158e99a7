//! Harness configuration
//!
//! Tool names, well-known paths and the label contract. The CLI builds a
//! [`Config`] from its arguments; everything defaults to what the image
//! builder and the host tools produce on a stock system.

use std::path::{Path, PathBuf};

/// Label the writable (root) partition must carry
pub const ROOT_LABEL: &str = "writable";

/// Directory where device-mapper exposes mapped partitions
pub const MAPPER_PREFIX: &str = "/dev/mapper";

/// Suffix of model assertion files in a corpus directory
pub const MODEL_SUFFIX: &str = ".assertion";

/// Gadget description location, relative to the builder's workdir
pub const GADGET_YAML: &str = "unpack/gadget/meta/gadget.yaml";

/// Disk image location, relative to the builder's workdir
pub const DISK_IMAGE: &str = "disk.img";

/// Names of the external tools the harness drives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub builder: String,
    pub kpartx: String,
    pub mount: String,
    pub umount: String,
    pub blkid: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            builder: "ubuntu-image".to_string(),
            kpartx: "kpartx".to_string(),
            mount: "mount".to_string(),
            umount: "umount".to_string(),
            blkid: "blkid".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tools: Tools,
    /// Snap channel passed to the image builder
    pub channel: String,
    pub mapper_prefix: PathBuf,
    pub root_label: String,
    pub model_suffix: String,
    pub gadget_yaml: PathBuf,
    pub disk_image: PathBuf,
    /// Parent of per-model workdirs and mount points
    pub mount_root: PathBuf,
    /// Run privileged commands through sudo
    pub sudo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: Tools::default(),
            channel: "edge".to_string(),
            mapper_prefix: PathBuf::from(MAPPER_PREFIX),
            root_label: ROOT_LABEL.to_string(),
            model_suffix: MODEL_SUFFIX.to_string(),
            gadget_yaml: PathBuf::from(GADGET_YAML),
            disk_image: PathBuf::from(DISK_IMAGE),
            mount_root: std::env::temp_dir(),
            sudo: !running_as_root(),
        }
    }
}

impl Config {
    pub fn gadget_yaml_in(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.gadget_yaml)
    }

    pub fn disk_image_in(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.disk_image)
    }
}

/// Whether the harness already has the privileges mount and kpartx need
pub fn running_as_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.channel, "edge");
        assert_eq!(config.root_label, "writable");
        assert_eq!(config.mapper_prefix, PathBuf::from("/dev/mapper"));
        assert_eq!(config.sudo, !running_as_root());
    }

    #[test]
    fn test_workdir_paths() {
        let config = Config::default();
        let workdir = Path::new("/tmp/mountck-abc");
        assert_eq!(
            config.gadget_yaml_in(workdir),
            PathBuf::from("/tmp/mountck-abc/unpack/gadget/meta/gadget.yaml")
        );
        assert_eq!(
            config.disk_image_in(workdir),
            PathBuf::from("/tmp/mountck-abc/disk.img")
        );
    }
}
