//! Atomic file replacement.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;

const TRACE: bool = false;

/// A writer that writes to a temporary file first, then renames the
/// file to the desired name.
///
/// Readers of the target only ever see the old or the new content,
/// never a partial file.  The target is not touched until
/// [`PartFileWriter::commit`] is called, so it is safe to use the
/// same file as input and output.  Dropping the writer without
/// committing discards what was written.
pub struct PartFileWriter {
    path: PathBuf,
    sink: Option<NamedTempFile>,
}

impl io::Write for PartFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink()?.flush()
    }
}

impl PartFileWriter {
    /// Opens a file for writing.
    ///
    /// The file is created under a different name in the target's
    /// directory.  If the target exists, the new file gets its
    /// permissions.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<PartFileWriter> {
        tracer!(TRACE, "PartFileWriter::create");

        let path = path.as_ref().to_path_buf();
        let file_name = path.file_name()
            .ok_or_else(|| io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} does not name a file", path.display())))?
            .to_os_string();
        let parent = match path.parent() {
            Some(p) if ! p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut builder = tempfile::Builder::new();

        let permissions = match fs::metadata(&path) {
            Ok(m) => Some(m.permissions()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        // Temporary files are 0o600 on Unix.  New files should
        // respect the umask instead.
        #[cfg(unix)]
        let permissions = permissions.or_else(|| {
            use std::os::unix::fs::PermissionsExt;
            Some(fs::Permissions::from_mode(0o666))
        });

        if let Some(p) = permissions {
            builder.permissions(p);
        }

        let sink = builder
            .prefix(&file_name)
            .suffix(".part")
            .tempfile_in(&parent)?;
        t!("writing {} via {}", path.display(), sink.path().display());

        Ok(PartFileWriter {
            path,
            sink: Some(sink),
        })
    }

    /// Returns the path that is replaced on commit.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a mutable reference to the file, or an error.
    fn sink(&mut self) -> io::Result<&mut NamedTempFile> {
        self.sink.as_mut().ok_or_else(|| io::Error::new(
            io::ErrorKind::Other, "file already committed"))
    }

    /// Flushes the file to disk, and renames it to the target.
    pub fn commit(mut self) -> io::Result<()> {
        if let Some(file) = self.sink.take() {
            file.as_file().sync_all()?;
            file.persist(&self.path).map_err(|e| e.error)?;
        }
        Ok(())
    }
}
