use crate::cli::{ListArgs, PathArgs, StatArgs};
use crate::context::AppContext;
use crate::render::{metadata_lines, print_json, type_label};
use eyre::Result;
use serde::Serialize;
use strata_core::metadata::MetadataProvider;
use strata_core::platform::FilesystemCapability;
use strata_core::reparse::{classify_path, ReparseClassification};
use strata_core::streams::AlternateStreamSource;
use strata_core::{DirectoryCursor, FileKind, FileMetadata};

#[derive(Serialize)]
struct StatJson<'a> {
    path: &'a str,
    #[serde(flatten)]
    metadata: &'a FileMetadata,
}

#[derive(Serialize)]
struct ListJsonRow {
    name: String,
    path: String,
    kind: FileKind,
    unique_id: Option<u64>,
    error: Option<String>,
}

pub fn run_stat(ctx: &AppContext, args: &StatArgs) -> Result<()> {
    let metadata = if args.no_follow {
        ctx.fs.lstat(&args.path)?
    } else {
        ctx.fs.stat(&args.path)?
    };
    if ctx.json {
        return print_json(&StatJson {
            path: &args.path,
            metadata: &metadata,
        });
    }
    for line in metadata_lines(&args.path, &metadata) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_list(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let cursor = DirectoryCursor::open_with(&ctx.fs, &args.path)?;
    let mut rows = Vec::new();
    let mut total = 0usize;

    for entry in cursor {
        let entry = entry?;
        if entry.is_dot_entry() && !args.all {
            continue;
        }
        // Each entry is re-stated so the listing reports stable unique IDs on
        // every platform.
        match ctx.fs.stat(entry.full_path()) {
            Ok(md) => {
                total += 1;
                if !ctx.json {
                    println!(
                        "UniqueID: {}\tType: {}\tPath: {}",
                        md.unique_id(),
                        type_label(md.is_directory()),
                        entry.full_path()
                    );
                }
                rows.push(ListJsonRow {
                    name: entry.name().to_string(),
                    path: entry.full_path().to_string(),
                    kind: md.kind(),
                    unique_id: Some(md.unique_id()),
                    error: None,
                });
            }
            Err(err) => {
                log::debug!("stat {} during listing: {err}", entry.full_path());
                if !ctx.json {
                    println!("Stat {} Failed", entry.full_path());
                }
                rows.push(ListJsonRow {
                    name: entry.name().to_string(),
                    path: entry.full_path().to_string(),
                    kind: entry.kind(),
                    unique_id: entry.unique_id(),
                    error: Some(err.to_string()),
                });
            }
        }
    }

    if ctx.json {
        return print_json(&rows);
    }
    println!("Total SubItems = {total}");
    Ok(())
}

pub fn run_reparse(ctx: &AppContext, args: &PathArgs) -> Result<()> {
    let classification = classify_path(&args.path)?;
    let final_path = match &classification {
        ReparseClassification::NotReparsePoint => None,
        _ => ctx.fs.final_path(&args.path).ok(),
    };

    if ctx.json {
        #[derive(Serialize)]
        struct ReparseJson<'a> {
            path: &'a str,
            classification: &'a ReparseClassification,
            final_path: Option<&'a str>,
        }
        return print_json(&ReparseJson {
            path: &args.path,
            classification: &classification,
            final_path: final_path.as_deref(),
        });
    }

    match &classification {
        ReparseClassification::SymbolicLink { target, relative } => {
            let scope = if *relative { "relative" } else { "absolute" };
            println!("Symbolic link ({scope}) -> {target}");
        }
        ReparseClassification::JunctionPoint { target } => println!("Junction -> {target}"),
        ReparseClassification::VolumeMountPoint { device_name } => {
            println!("Volume mount point -> {device_name}")
        }
        ReparseClassification::FilesystemSpecific { tag } => {
            println!("Filesystem-specific reparse point: {tag}")
        }
        ReparseClassification::NotReparsePoint => println!("Not a reparse point"),
    }
    if let Some(resolved) = final_path {
        println!("Final path: {resolved}");
    }
    Ok(())
}

pub fn run_streams(ctx: &AppContext, args: &PathArgs) -> Result<()> {
    let streams = ctx.fs.list_streams(&args.path)?;
    if ctx.json {
        return print_json(&streams);
    }
    for stream in &streams {
        println!("{:>12}  {}", stream.size, stream.name);
    }
    println!("{} named stream(s)", streams.len());
    Ok(())
}

pub fn run_capabilities(ctx: &AppContext) -> Result<()> {
    let caps = ctx.fs.capabilities();
    if ctx.json {
        return print_json(&caps);
    }
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    println!("Sparse extents:       {}", yes_no(caps.sparse_extents));
    println!("Reparse points:       {}", yes_no(caps.reparse_points));
    println!("Security descriptors: {}", yes_no(caps.security_descriptors));
    println!("Alternate streams:    {}", yes_no(caps.alternate_streams));
    println!("Volume GUIDs:         {}", yes_no(caps.volume_guids));
    Ok(())
}
