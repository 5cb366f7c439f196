use crate::dir_cursor::{DirStream, DirentType, EntryRecord};
use crate::errors::{FsError, FsResult};
use crate::path_codec::NativePath;
use nix::dir::{Dir, OwningIter, Type};
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use std::fmt;
use std::io;

/// An open `DIR*`. Dropping the inner iterator runs `closedir`.
pub struct UnixDirStream {
    path: String,
    iter: Option<OwningIter>,
}

impl UnixDirStream {
    pub(crate) fn open(path: &str) -> FsResult<Self> {
        let native = NativePath::encode(path)?;
        // O_DIRECTORY turns a non-directory into ENOTDIR at open time.
        let flags = OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC;
        let dir = Dir::open(native.as_c_str(), flags, Mode::empty())
            .map_err(|errno| FsError::from_io("open directory", path, &io::Error::from(errno)))?;
        log::trace!("opened directory stream {path}");
        Ok(Self {
            path: path.to_string(),
            iter: Some(dir.into_iter()),
        })
    }
}

fn dirent_type(kind: Option<Type>) -> DirentType {
    match kind {
        Some(Type::Fifo) => DirentType::Pipe,
        Some(Type::CharacterDevice) => DirentType::CharDevice,
        Some(Type::Directory) => DirentType::Directory,
        Some(Type::BlockDevice) => DirentType::BlockDevice,
        Some(Type::File) => DirentType::Regular,
        Some(Type::Symlink) => DirentType::Symlink,
        Some(Type::Socket) => DirentType::Socket,
        None => DirentType::Unknown,
    }
}

impl DirStream for UnixDirStream {
    fn read_next(&mut self) -> FsResult<Option<EntryRecord>> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };
        match iter.next() {
            None => Ok(None),
            Some(Ok(entry)) => Ok(Some(EntryRecord::posix(
                entry.file_name().to_string_lossy().into_owned(),
                dirent_type(entry.file_type()),
                entry.ino(),
            ))),
            Some(Err(errno)) => Err(FsError::from_io(
                "read directory",
                self.path.as_str(),
                &io::Error::from(errno),
            )),
        }
    }

    fn close(&mut self) {
        if self.iter.take().is_some() {
            log::trace!("closed directory stream {}", self.path);
        }
    }

    fn is_closed(&self) -> bool {
        self.iter.is_none()
    }
}

impl fmt::Debug for UnixDirStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnixDirStream")
            .field("path", &self.path)
            .field("open", &self.iter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn lists_dot_entries_and_types() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("file"), b"x").expect("write");
        std::fs::create_dir(temp.path().join("sub")).expect("mkdir");
        let path = temp.path().to_string_lossy().into_owned();

        let mut stream = UnixDirStream::open(&path).expect("open");
        let mut seen = Vec::new();
        while let Some(rec) = stream.read_next().expect("read") {
            seen.push((rec.name.clone(), rec.flags));
        }
        seen.sort_by(|a, b| a.0.cmp(&b.0));
        let names: Vec<_> = seen.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec![".", "..", "file", "sub"]);

        stream.close();
        stream.close();
        assert!(stream.is_closed());
        assert!(stream.read_next().expect("closed read").is_none());
    }

    #[test]
    fn opening_a_file_is_not_a_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("plain");
        std::fs::write(&file, b"x").expect("write");
        let err = UnixDirStream::open(&file.to_string_lossy()).expect_err("not a dir");
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
    }
}
