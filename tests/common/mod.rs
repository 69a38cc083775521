pub mod fixtures;

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use yangkit::tree::fixtures::{DATA_JSON, SCHEMA_JSON};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// The shared schema and data written to a temporary directory, for driving
/// the command line front end.
pub struct FixtureFiles {
    _dir: TempDir,
    pub schema: PathBuf,
    pub data: PathBuf,
}

impl FixtureFiles {
    pub fn write() -> std::io::Result<Self> {
        Self::write_with(DATA_JSON)
    }

    /// Writes the shared schema next to custom instance data.
    pub fn write_with(data: &str) -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let schema = dir.path().join("schema.json");
        let data_path = dir.path().join("data.json");
        std::fs::write(&schema, SCHEMA_JSON)?;
        std::fs::write(&data_path, data)?;
        Ok(Self {
            _dir: dir,
            schema,
            data: data_path,
        })
    }

    pub fn schema_arg(&self) -> &str {
        path_str(&self.schema)
    }

    pub fn data_arg(&self) -> &str {
        path_str(&self.data)
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}
