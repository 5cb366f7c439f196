use crate::context::AppContext;
use crate::render::print_json;
use eyre::Result;
use serde::Serialize;
use strata_core::volume::VolumeEnumerator;

#[derive(Serialize)]
struct VolumeJsonRow {
    name: String,
    device: Option<String>,
    mount_paths: Vec<String>,
}

pub fn run_drives(ctx: &AppContext) -> Result<()> {
    let drives = ctx.fs.drives()?;
    if ctx.json {
        return print_json(&drives);
    }
    for drive in &drives {
        println!("{drive}");
    }
    Ok(())
}

pub fn run_volumes(ctx: &AppContext) -> Result<()> {
    let mut rows = Vec::new();
    for volume in ctx.fs.volumes()? {
        // A volume that vanishes mid-listing is reported without details.
        let device = match ctx.fs.volume_device_name(volume.name()) {
            Ok(device) => Some(device),
            Err(err) => {
                log::debug!("device lookup for {}: {err}", volume.name());
                None
            }
        };
        let mount_paths = ctx.fs.volume_mount_paths(volume.name()).unwrap_or_else(|err| {
            log::debug!("mount paths for {}: {err}", volume.name());
            Vec::new()
        });
        rows.push(VolumeJsonRow {
            name: volume.name().to_string(),
            device,
            mount_paths,
        });
    }

    if ctx.json {
        return print_json(&rows);
    }
    for row in &rows {
        println!("{}", row.name);
        println!("  Device : {}", row.device.as_deref().unwrap_or("-"));
        if row.mount_paths.is_empty() {
            println!("  Mounted: -");
        } else {
            println!("  Mounted: {}", row.mount_paths.join(", "));
        }
    }
    Ok(())
}
