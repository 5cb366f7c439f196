use super::UnixFs;
use crate::errors::{record, ErrorKind, FsError, FsResult};
use crate::volume::{Volume, VolumeEnumerator};
use sysinfo::Disks;

fn mounted() -> Vec<(String, String)> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .map(|disk| {
            (
                disk.name().to_string_lossy().into_owned(),
                disk.mount_point().to_string_lossy().into_owned(),
            )
        })
        .collect()
}

fn unknown_volume(op: &'static str, volume: &str) -> FsError {
    FsError::new(ErrorKind::NotFound, op, volume).with_detail("no mounted disk with that name")
}

impl VolumeEnumerator for UnixFs {
    fn volumes(&self) -> FsResult<Vec<Volume>> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in mounted() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names
            .into_iter()
            .map(|name| Volume::new(name).with_config(self.config.clone()))
            .collect())
    }

    fn volume_device_name(&self, volume: &str) -> FsResult<String> {
        if mounted().iter().any(|(name, _)| name == volume) {
            Ok(volume.to_string())
        } else {
            record(Err(unknown_volume("resolve volume", volume)))
        }
    }

    fn volume_mount_paths(&self, volume: &str) -> FsResult<Vec<String>> {
        let paths: Vec<String> = mounted()
            .into_iter()
            .filter(|(name, _)| name == volume)
            .map(|(_, mount)| mount)
            .collect();
        if paths.is_empty() {
            return record(Err(unknown_volume("volume mount paths", volume)));
        }
        Ok(paths)
    }

    fn drives(&self) -> FsResult<Vec<String>> {
        let mut roots: Vec<String> = Vec::new();
        for (_, mount) in mounted() {
            if !roots.contains(&mount) {
                roots.push(mount);
            }
        }
        Ok(roots)
    }
}
