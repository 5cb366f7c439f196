use crate::cli::{CopySparseArgs, PathArgs};
use crate::context::AppContext;
use crate::render::{copy_summary, extent_lines, print_json};
use eyre::Result;
use strata_core::sparse::ExtentProvider;

pub fn run_extents(ctx: &AppContext, args: &PathArgs) -> Result<()> {
    let extents = ctx.fs.query_extents(&args.path)?;
    if ctx.json {
        return print_json(&extents);
    }
    println!("{:>16} {:>16}", "OFFSET", "LENGTH");
    for line in extent_lines(&extents) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_copy_sparse(ctx: &AppContext, args: &CopySparseArgs) -> Result<()> {
    let report = ctx.fs.copy_sparse(&args.source, &args.destination)?;
    if ctx.json {
        return print_json(&report);
    }
    println!("{}", copy_summary(&args.source, &args.destination, &report));
    Ok(())
}
