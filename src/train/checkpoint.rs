use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Receives serialized model blobs during training.
///
/// A failed write is logged by the training loop and never aborts the run.
pub trait CheckpointSink {
    fn write(&mut self, epoch: usize, blob: &str) -> Result<()>;
}

/// Writes `checkpoint_epoch_NNNN.json` files into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryCheckpoint {
    dir: PathBuf,
}

impl DirectoryCheckpoint {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryCheckpoint { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("checkpoint_epoch_{epoch:04}.json"))
    }
}

impl CheckpointSink for DirectoryCheckpoint {
    fn write(&mut self, epoch: usize, blob: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(epoch), blob)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_zero_padded() {
        let sink = DirectoryCheckpoint::new("/tmp/ckpt");
        assert_eq!(sink.path_for(7), Path::new("/tmp/ckpt/checkpoint_epoch_0007.json"));
    }

    #[test]
    fn writes_into_a_fresh_directory() {
        let dir = std::env::temp_dir().join(format!("backprop-nn-ckpt-{}", std::process::id()));
        let mut sink = DirectoryCheckpoint::new(&dir);
        sink.write(3, "{}").unwrap();
        assert_eq!(fs::read_to_string(sink.path_for(3)).unwrap(), "{}");
        fs::remove_dir_all(&dir).unwrap();
    }
}
