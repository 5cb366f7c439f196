use chrono::{DateTime, Utc};
use eyre::Result;
use serde::Serialize;
use strata_core::sparse::{SparseCopyReport, SparseExtent};
use strata_core::{FileFlags, FileMetadata};

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes == 0 {
        return "0 B".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Seconds since the epoch, followed by the UTC calendar time when it is
/// representable.
pub(crate) fn format_time(seconds: i64) -> String {
    match DateTime::<Utc>::from_timestamp(seconds, 0) {
        Some(ts) => format!("{seconds} ({})", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => seconds.to_string(),
    }
}

pub(crate) fn flag_names(flags: FileFlags) -> String {
    flags.names().join(" | ")
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn type_label(is_directory: bool) -> &'static str {
    if is_directory {
        "Directory"
    } else {
        "File"
    }
}

pub(crate) fn metadata_lines(path: &str, md: &FileMetadata) -> Vec<String> {
    let flags = md.flags();
    let bits = match flags {
        FileFlags::Windows(_) => format!("Attr: \t\t{:#010x}", flags.raw()),
        FileFlags::Posix(_) => format!("Mode: \t\t{:o}", flags.raw()),
    };
    vec![
        format!("Name: \t\t{path}"),
        format!("Type: \t\t{}", type_label(md.is_directory())),
        format!("UniqueID: \t{}", md.unique_id()),
        format!("Size: \t\t{} ({})", md.size(), format_bytes(md.size())),
        format!("Device: \t{}", md.device_id()),
        format!("Links: \t\t{}", md.links_count()),
        format!("Owner: \t\t{}:{}", md.user_id(), md.group_id()),
        format!("Atime: \t\t{}", format_time(md.access_time())),
        format!("CTime: \t\t{}", format_time(md.creation_time())),
        format!("MTime: \t\t{}", format_time(md.modify_time())),
        bits,
        format!("Flags: \t\t{}", flag_names(flags)),
    ]
}

pub(crate) fn extent_lines(extents: &[SparseExtent]) -> Vec<String> {
    let mut lines: Vec<String> = extents
        .iter()
        .map(|e| format!("{:>16} {:>16}  {}", e.offset, e.length, format_bytes(e.length)))
        .collect();
    let allocated: u64 = extents.iter().map(|e| e.length).sum();
    lines.push(format!(
        "{} extent(s), {} allocated",
        extents.len(),
        format_bytes(allocated)
    ));
    lines
}

pub(crate) fn copy_summary(src: &str, dst: &str, report: &SparseCopyReport) -> String {
    format!(
        "Copied {src} -> {dst}: {} of {} written, {} left as holes, {} extent(s)",
        format_bytes(report.bytes_copied),
        format_bytes(report.logical_size),
        format_bytes(report.hole_bytes()),
        report.extents.len()
    )
}
