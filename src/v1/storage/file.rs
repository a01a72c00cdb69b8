use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use crate::v1::datastore::{DatastoreError, Entries, Storage};

/// Bincode-encoded state file.
#[derive(Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new("rsnomad.store")
    }
}
impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileStorage { path: path.into() }
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Entries, DatastoreError> {
        Ok(if self.path.exists() {
            let file = BufReader::new(File::open(&self.path)?);
            bincode::deserialize_from(file)?
        } else {
            Entries::new()
        })
    }
    fn save(&self, data: &Entries) -> Result<(), DatastoreError> {
        let file = BufWriter::new(File::create(&self.path)?);
        bincode::serialize_into(file, data)?;
        Ok(())
    }
}
