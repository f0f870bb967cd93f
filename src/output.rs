//! Report sink: stdout or a file that can be reopened after log rotation.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

enum Target {
    Stdout(io::Stdout),
    File(BufWriter<File>),
}

pub struct ReportSink {
    target: Target,
    /// File to reopen on request; for stdout, the file it was redirected to.
    reopen_path: Option<PathBuf>,
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

/// The regular file stdout points at, if it was redirected to one.
fn stdout_file() -> Option<PathBuf> {
    let target = std::fs::read_link("/proc/self/fd/1").ok()?;
    let meta = std::fs::metadata(&target).ok()?;
    meta.is_file().then_some(target)
}

impl ReportSink {
    pub fn stdout() -> Self {
        Self {
            target: Target::Stdout(io::stdout()),
            reopen_path: stdout_file(),
        }
    }

    pub fn file(path: &Path) -> io::Result<Self> {
        Ok(Self {
            target: Target::File(open_append(path)?),
            reopen_path: Some(path.to_path_buf()),
        })
    }

    pub fn open(path: Option<&Path>) -> io::Result<Self> {
        match path {
            Some(p) => Self::file(p),
            None => Ok(Self::stdout()),
        }
    }

    pub fn reopen_path(&self) -> Option<&Path> {
        self.reopen_path.as_deref()
    }

    /// Flushes, then opens the output path again. A failed reopen keeps the old
    /// target and is only logged.
    pub fn reopen(&mut self) {
        let _ = self.flush();
        let Some(path) = self.reopen_path.clone() else {
            return;
        };
        match open_append(&path) {
            Ok(w) => {
                self.target = Target::File(w);
                info!(path = %path.display(), "output reopened");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "output reopen failed"),
        }
    }
}

impl Write for ReportSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.target {
            Target::Stdout(s) => s.write(buf),
            Target::File(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            Target::Stdout(s) => s.flush(),
            Target::File(f) => f.flush(),
        }
    }
}
