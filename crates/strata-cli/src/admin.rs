use crate::cli::{PathArgs, SetSdArgs, SymlinkArgs};
use crate::context::AppContext;
use crate::render::print_json;
use eyre::Result;
use strata_core::fsops;
use strata_core::security::SecurityDescriptorAccessor;

pub fn run_mkdir(args: &PathArgs) -> Result<()> {
    fsops::mkdir_recursive(&args.path)?;
    println!("Created {}", args.path);
    Ok(())
}

pub fn run_symlink(args: &SymlinkArgs) -> Result<()> {
    fsops::create_symlink(&args.target, &args.link, args.dir)?;
    println!("{} -> {}", args.link, args.target);
    Ok(())
}

pub fn run_get_sd(ctx: &AppContext, args: &PathArgs) -> Result<()> {
    let sddl = ctx.fs.get_security_descriptor(&args.path)?;
    if ctx.json {
        return print_json(&serde_json::json!({ "path": args.path, "sddl": sddl }));
    }
    println!("{sddl}");
    Ok(())
}

pub fn run_set_sd(ctx: &AppContext, args: &SetSdArgs) -> Result<()> {
    ctx.fs.set_security_descriptor(&args.path, &args.sddl)?;
    println!("Applied security descriptor to {}", args.path);
    Ok(())
}
