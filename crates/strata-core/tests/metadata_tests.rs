use eyre::Result;
use strata_core::errors::{clear_last_error, last_error, ErrorKind};
use strata_core::{canonical_path, lstat, stat, FileKind};

fn path_str(p: &std::path::Path) -> String {
    p.to_string_lossy().into_owned()
}

#[test]
fn unique_id_is_stable_and_distinct() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let a = temp.path().join("a.txt");
    let b = temp.path().join("b.txt");
    std::fs::write(&a, b"alpha")?;
    std::fs::write(&b, b"beta")?;

    let first = stat(&path_str(&a))?;
    let again = stat(&path_str(&a))?;
    let other = stat(&path_str(&b))?;

    assert_eq!(first.unique_id(), again.unique_id());
    assert_ne!(first.unique_id(), other.unique_id());
    assert_eq!(first.size(), 5);
    assert_eq!(first.kind(), FileKind::Regular);
    assert!(first.links_count() >= 1);
    Ok(())
}

#[test]
fn directory_reports_directory_kind() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let md = stat(&path_str(temp.path()))?;
    assert!(md.is_directory());
    assert!(!md.is_regular());
    Ok(())
}

#[test]
fn modify_time_tracks_filesystem() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let file = temp.path().join("dated.txt");
    std::fs::write(&file, b"x")?;
    filetime::set_file_mtime(&file, filetime::FileTime::from_unix_time(1_600_000_000, 0))?;

    let md = stat(&path_str(&file))?;
    assert_eq!(md.modify_time(), 1_600_000_000);
    Ok(())
}

#[test]
fn missing_path_is_not_found_and_recorded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = path_str(&temp.path().join("missing"));
    clear_last_error();

    let err = stat(&missing).expect_err("missing file");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.path(), missing);

    let recorded = last_error().expect("last error recorded");
    assert_eq!(recorded.kind(), ErrorKind::NotFound);
    assert!(recorded.os_code().is_some());
}

#[cfg(unix)]
#[test]
fn lstat_sees_the_link_and_stat_sees_the_target() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let target = temp.path().join("target.txt");
    std::fs::write(&target, b"payload")?;
    let link = temp.path().join("link");
    std::os::unix::fs::symlink(&target, &link)?;

    let followed = stat(&path_str(&link))?;
    let unfollowed = lstat(&path_str(&link))?;
    assert!(followed.is_regular());
    assert_eq!(followed.size(), 7);
    assert!(unfollowed.is_symlink());
    assert_ne!(followed.unique_id(), unfollowed.unique_id());
    Ok(())
}

#[test]
fn canonical_path_resolves_dot_segments() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let nested = temp.path().join("inner");
    std::fs::create_dir(&nested)?;
    let dotted = nested.join("..").join("inner");

    let resolved = canonical_path(&path_str(&dotted))?;
    let expected = canonical_path(&path_str(&nested))?;
    assert_eq!(resolved, expected);
    Ok(())
}
