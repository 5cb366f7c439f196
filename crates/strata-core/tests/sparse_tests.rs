use eyre::Result;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use strata_core::errors::ErrorKind;
use strata_core::{copy_sparse, query_extents, SparseExtent};

const MIB: u64 = 1024 * 1024;

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// 10 MiB file with 1 MiB of data at 0 and at 9 MiB; the middle is a hole
/// where the filesystem supports holes.
fn write_holey_file(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    file.set_len(10 * MIB)?;
    file.write_all(&vec![0xA5u8; MIB as usize])?;
    file.seek(SeekFrom::Start(9 * MIB))?;
    file.write_all(&vec![0x5Au8; MIB as usize])?;
    file.sync_all()?;
    Ok(())
}

/// 10 MiB file holding 4 KiB at 0 and 4 KiB at 9 MiB.
fn write_two_block_file(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    file.set_len(10 * MIB)?;
    file.write_all(&[0x11u8; 4096])?;
    file.seek(SeekFrom::Start(9 * MIB))?;
    file.write_all(&[0x22u8; 4096])?;
    file.sync_all()?;
    Ok(())
}

/// Extents of `path`, or `None` when the filesystem keeps no holes (reports
/// unsupported, or one extent spanning the whole file).
fn holey_extents(path: &Path, size: u64) -> Result<Option<Vec<SparseExtent>>> {
    match query_extents(&path_str(path)) {
        Ok(extents) if extents == [SparseExtent::new(0, size)] => Ok(None),
        Ok(extents) => Ok(Some(extents)),
        Err(err) if err.kind() == ErrorKind::NotSupported => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[test]
fn empty_file_has_no_extents() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let file = temp.path().join("empty");
    std::fs::write(&file, b"")?;
    match query_extents(&path_str(&file)) {
        Ok(extents) => assert!(extents.is_empty()),
        Err(err) => assert_eq!(err.kind(), ErrorKind::NotSupported),
    }
    Ok(())
}

#[test]
fn extents_cover_written_data() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let file = temp.path().join("holey.bin");
    write_holey_file(&file)?;

    let extents = match query_extents(&path_str(&file)) {
        Ok(extents) => extents,
        Err(err) if err.kind() == ErrorKind::NotSupported => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    for pair in extents.windows(2) {
        assert!(pair[0].end() <= pair[1].offset, "extents overlap: {extents:?}");
    }
    let covers = |offset: u64| extents.iter().any(|e| e.offset <= offset && offset < e.end());
    assert!(covers(0));
    assert!(covers(9 * MIB));
    assert!(extents.iter().all(|e| e.end() <= 10 * MIB));
    Ok(())
}

#[test]
fn two_written_blocks_are_the_only_extents() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let file = temp.path().join("blocks.bin");
    write_two_block_file(&file)?;

    let Some(extents) = holey_extents(&file, 10 * MIB)? else {
        return Ok(());
    };
    assert_eq!(
        extents,
        vec![SparseExtent::new(0, 4096), SparseExtent::new(9 * MIB, 4096)]
    );
    Ok(())
}

#[test]
fn sparse_copy_keeps_the_source_extents() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let src = temp.path().join("src.bin");
    let dst = temp.path().join("dst.bin");
    write_two_block_file(&src)?;

    let Some(src_extents) = holey_extents(&src, 10 * MIB)? else {
        return Ok(());
    };
    let report = copy_sparse(&path_str(&src), &path_str(&dst))?;
    assert_eq!(report.bytes_copied, 2 * 4096);

    assert_eq!(query_extents(&path_str(&dst))?, src_extents);
    assert!(std::fs::read(&src)? == std::fs::read(&dst)?, "contents differ");
    Ok(())
}

#[test]
fn directories_have_no_extents() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let err = query_extents(&path_str(temp.path())).expect_err("directory");
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    Ok(())
}

#[test]
fn sparse_copy_reproduces_contents() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let src = temp.path().join("src.bin");
    let dst = temp.path().join("dst.bin");
    write_holey_file(&src)?;

    let report = match copy_sparse(&path_str(&src), &path_str(&dst)) {
        Ok(report) => report,
        Err(err) if err.kind() == ErrorKind::NotSupported => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    assert_eq!(report.logical_size, 10 * MIB);
    assert!(report.bytes_copied >= 2 * MIB);
    assert!(report.bytes_copied <= 10 * MIB);
    assert_eq!(std::fs::metadata(&dst)?.len(), 10 * MIB);
    assert!(std::fs::read(&src)? == std::fs::read(&dst)?, "contents differ");
    Ok(())
}

#[test]
fn existing_destination_is_left_alone() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let src = temp.path().join("src.bin");
    let dst = temp.path().join("dst.bin");
    std::fs::write(&src, b"source bytes")?;
    std::fs::write(&dst, b"keep me")?;

    let err = copy_sparse(&path_str(&src), &path_str(&dst)).expect_err("destination exists");
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(std::fs::read(&dst)?, b"keep me");
    Ok(())
}

#[test]
fn missing_source_is_not_found() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let err = copy_sparse(
        &path_str(&temp.path().join("nope")),
        &path_str(&temp.path().join("out")),
    )
    .expect_err("missing source");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!temp.path().join("out").exists());
    Ok(())
}
