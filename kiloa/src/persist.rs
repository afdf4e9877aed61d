//! Fleet state on disk: a versioned JSON file holding every NodeState and the
//! per-node chart history.
//! Default location: $XDG_DATA_HOME/kiloa/fleet.json (via dirs-next, fallback ./kiloa).

use crate::error::PersistError;
use crate::types::{HistoryPoint, NodeState};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};
use tracing::warn;

/// 1: nodes only. 2: adds `history`.
pub const FILE_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetFile {
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<NodeState>,
    #[serde(default)]
    pub history: BTreeMap<String, Vec<HistoryPoint>>,
}

impl Default for FleetFile {
    fn default() -> Self {
        Self {
            version: FILE_VERSION,
            nodes: Vec::new(),
            history: BTreeMap::new(),
        }
    }
}

pub fn data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kiloa")
}

pub fn default_path() -> PathBuf {
    data_dir().join("fleet.json")
}

/// Missing file reads as an empty fleet. Version 1 files load with no history.
pub fn load(path: &Path) -> Result<FleetFile, PersistError> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FleetFile::default()),
        Err(e) => return Err(e.into()),
    };
    let mut file: FleetFile = serde_json::from_slice(&data)?;
    if !(1..=FILE_VERSION).contains(&file.version) {
        return Err(PersistError::UnsupportedVersion(file.version));
    }
    file.version = FILE_VERSION;
    Ok(file)
}

/// Startup variant: an unreadable file is logged and treated as empty.
pub fn load_or_empty(path: &Path) -> FleetFile {
    match load(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring fleet file");
            FleetFile::default()
        }
    }
}

/// Write to a sibling temp file then rename over the target.
pub fn save(
    path: &Path,
    nodes: Vec<NodeState>,
    history: BTreeMap<String, Vec<HistoryPoint>>,
) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = FleetFile {
        version: FILE_VERSION,
        nodes,
        history,
    };
    let data = serde_json::to_vec_pretty(&file)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
