//! Gadget description loading and expected mountability
//!
//! Only the parts of `gadget.yaml` that decide which partitions should mount
//! are modeled here. Unknown keys are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::MountckError;

/// Parsed gadget description
#[derive(Debug, Clone, Deserialize)]
pub struct Gadget {
    #[serde(default)]
    pub volumes: BTreeMap<String, Volume>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    #[serde(default, rename = "structure")]
    pub structures: Vec<Structure>,
}

/// One declared partition region
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Structure {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Partition type, or the legacy `mbr` marker
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub filesystem: Option<FileSystemType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Mbr,
    SystemBoot,
    SystemData,
    SystemSeed,
    SystemSave,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileSystemType {
    Ext4,
    Vfat,
    None,
    #[serde(other)]
    Other,
}

impl FileSystemType {
    pub fn is_mountable(&self) -> bool {
        matches!(self, FileSystemType::Ext4 | FileSystemType::Vfat)
    }
}

impl fmt::Display for FileSystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemType::Ext4 => write!(f, "ext4"),
            FileSystemType::Vfat => write!(f, "vfat"),
            FileSystemType::None => write!(f, "none"),
            FileSystemType::Other => write!(f, "other"),
        }
    }
}

impl Structure {
    /// Boot record region, never exposed as a partition by the device mapper
    pub fn is_mbr(&self) -> bool {
        self.role == Some(Role::Mbr) || self.type_.as_deref() == Some("mbr")
    }

    pub fn is_mountable(&self) -> bool {
        self.filesystem.is_some_and(|fs| fs.is_mountable())
    }
}

impl Gadget {
    pub fn from_yaml(yaml: &str) -> Result<Self, MountckError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, MountckError> {
        if !path.exists() {
            return Err(MountckError::file_not_found(path));
        }
        let yaml = fs::read_to_string(path).map_err(|e| MountckError::from(e).with_path(path))?;
        Self::from_yaml(&yaml).map_err(|e| e.with_path(path))
    }

    /// The gadget's only volume.
    ///
    /// Images with several volumes (or none) cannot be correlated with a
    /// single device mapping, so anything but exactly one is fatal.
    pub fn single_volume(&self) -> Result<(&str, &Volume), MountckError> {
        let mut volumes = self.volumes.iter();
        match (volumes.next(), volumes.next()) {
            (Some((name, volume)), None) => Ok((name.as_str(), volume)),
            _ => Err(MountckError::precondition(format!(
                "Exactly one gadget volume is supported, found {}",
                self.volumes.len()
            ))),
        }
    }
}

/// Predict which device-mapper slots will be mountable.
///
/// One entry per non-mbr structure in declaration order, then a final `true`
/// for the writable partition the image builder always appends after the
/// declared structures.
pub fn expected_mountability(volume: &Volume) -> Vec<bool> {
    let mut expected: Vec<bool> = volume
        .structures
        .iter()
        .filter(|structure| !structure.is_mbr())
        .map(Structure::is_mountable)
        .collect();
    expected.push(true);

    debug!("Expected mountability: {:?}", expected);
    expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use indoc::indoc;

    const PC_GADGET: &str = indoc! {"
        volumes:
          pc:
            bootloader: grub
            structure:
              - name: mbr
                type: mbr
                size: 440
                content:
                  - image: pc-boot.img
              - name: BIOS Boot
                type: DA,21686148-6449-6E6F-744E-656564454649
                size: 1M
                offset: 1M
                offset-write: mbr+92
              - name: EFI System
                type: EF,C12A7328-F81F-11D2-BA4B-00A0C93EC93B
                filesystem: vfat
                filesystem-label: system-boot
                size: 50M
                content:
                  - source: grubx64.efi
                    target: EFI/boot/grubx64.efi
    "};

    fn volume_of(yaml: &str) -> Volume {
        let gadget = Gadget::from_yaml(yaml).unwrap();
        let (_, volume) = gadget.single_volume().unwrap();
        volume.clone()
    }

    #[test]
    fn test_parse_pc_gadget() {
        let gadget = Gadget::from_yaml(PC_GADGET).unwrap();
        let (name, volume) = gadget.single_volume().unwrap();
        assert_eq!(name, "pc");
        assert_eq!(volume.structures.len(), 3);
        assert!(volume.structures[0].is_mbr());
        assert_eq!(volume.structures[1].name.as_deref(), Some("BIOS Boot"));
        assert_eq!(volume.structures[1].filesystem, None);
        assert_eq!(volume.structures[2].filesystem, Some(FileSystemType::Vfat));
    }

    #[test]
    fn test_pc_gadget_expectation() {
        // mbr skipped, raw BIOS boot, vfat ESP, implicit writable
        assert_eq!(
            expected_mountability(&volume_of(PC_GADGET)),
            vec![false, true, true]
        );
    }

    #[test]
    fn test_mbr_role_and_declared_writable() {
        let volume = volume_of(indoc! {"
            volumes:
              disk:
                structure:
                  - name: mbr
                    role: mbr
                    size: 440
                  - name: writable
                    role: system-data
                    filesystem: ext4
                    size: 500M
        "});
        assert_eq!(expected_mountability(&volume), vec![true, true]);
    }

    #[test]
    fn test_length_and_trailing_true() {
        let volume = volume_of(indoc! {"
            volumes:
              disk:
                structure:
                  - role: mbr
                  - filesystem: ext4
                  - filesystem: none
                  - {}
                  - role: mbr
                  - filesystem: vfat-32
                  - filesystem: vfat
        "});
        let non_mbr = volume.structures.iter().filter(|s| !s.is_mbr()).count();
        let expected = expected_mountability(&volume);
        assert_eq!(expected.len(), non_mbr + 1);
        assert_eq!(expected, vec![true, false, false, false, true, true]);
        assert_eq!(expected.last(), Some(&true));
    }

    #[test]
    fn test_empty_volume() {
        let volume = volume_of(indoc! {"
            volumes:
              empty:
                bootloader: u-boot
        "});
        assert_eq!(expected_mountability(&volume), vec![true]);
    }

    #[test]
    fn test_unknown_role_is_not_mbr() {
        let volume = volume_of(indoc! {"
            volumes:
              disk:
                structure:
                  - role: system-boot-image
                    type: 0C
        "});
        assert_eq!(volume.structures[0].role, Some(Role::Other));
        assert_eq!(expected_mountability(&volume), vec![false, true]);
    }

    #[test]
    fn test_multiple_volumes_rejected() {
        let gadget = Gadget::from_yaml(indoc! {"
            volumes:
              first:
                structure: []
              second:
                structure: []
        "})
        .unwrap();
        let err = gadget.single_volume().unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionFailed);
        assert!(err.message.contains("found 2"));
    }

    #[test]
    fn test_no_volumes_rejected() {
        let gadget = Gadget::from_yaml("volumes: {}\n").unwrap();
        assert_eq!(
            gadget.single_volume().unwrap_err().code,
            ErrorCode::PreconditionFailed
        );
    }

    #[test]
    fn test_invalid_yaml() {
        let err = Gadget::from_yaml("volumes: [not, a, map]\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gadget.yaml");
        assert_eq!(Gadget::load(&path).unwrap_err().code, ErrorCode::FileNotFound);

        fs::write(&path, PC_GADGET).unwrap();
        let gadget = Gadget::load(&path).unwrap();
        let (_, volume) = gadget.single_volume().unwrap();
        assert_eq!(expected_mountability(volume), vec![false, true, true]);
    }

    #[test]
    fn test_raw_partition_types_parse() {
        let volume = volume_of(indoc! {"
            volumes:
              pi:
                bootloader: u-boot
                structure:
                  - type: 0C
                    filesystem: vfat
                    filesystem-label: system-boot
                  - type: 83
                    filesystem: ~
                  - type: bare
                    size: 4M
        "});
        assert_eq!(volume.structures[0].type_.as_deref(), Some("0C"));
        assert_eq!(volume.structures[1].type_.as_deref(), Some("83"));
        assert!(!volume.structures[2].is_mbr());
        assert_eq!(expected_mountability(&volume), vec![true, false, false, true]);
    }
}
