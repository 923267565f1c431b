use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::KVError;
use crate::overlay::OverlayKV;
use crate::traits::KVStore;

/// FileLoader scans a data directory and populates the file layer of an
/// OverlayKV. The directory structure determines the key namespace:
///
/// ```text
/// data-dir/
/// ├── roles/purchasing.json             → config:role:purchasing
/// ├── roles/qa.json                     → config:role:qa
/// ├── reference/countries/TW.json       → mdm:countries:TW
/// └── reference/units/PCS.json          → mdm:units:PCS
/// ```
///
/// All loaded entries become read-only in the overlay. Files that are not
/// valid JSON are skipped with a warning.
pub struct FileLoader;

impl FileLoader {
    /// Load all JSON files from `data_dir` into the overlay's file layer.
    /// Returns the number of entries loaded.
    pub fn load<DB: KVStore>(data_dir: &Path, overlay: &OverlayKV<DB>) -> Result<usize, KVError> {
        if !data_dir.is_dir() {
            debug!("FileLoader: data dir {:?} does not exist, skipping", data_dir);
            return Ok(0);
        }

        let mut count = 0;

        let roles_dir = data_dir.join("roles");
        if roles_dir.is_dir() {
            count += Self::load_directory(&roles_dir, "config:role:", overlay)?;
        }

        // reference/{collection}/{key}.json
        let reference_dir = data_dir.join("reference");
        if reference_dir.is_dir() {
            for collection_dir in Self::sorted_entries(&reference_dir)? {
                if !collection_dir.is_dir() {
                    continue;
                }
                let Some(collection) = collection_dir.file_name().and_then(|s| s.to_str()) else {
                    continue;
                };
                let prefix = format!("mdm:{}:", collection);
                count += Self::load_directory(&collection_dir, &prefix, overlay)?;
            }
        }

        debug!("FileLoader: loaded {} entries from {:?}", count, data_dir);
        Ok(count)
    }

    fn load_directory<DB: KVStore>(
        dir: &Path,
        prefix: &str,
        overlay: &OverlayKV<DB>,
    ) -> Result<usize, KVError> {
        let mut count = 0;
        for path in Self::sorted_entries(dir)? {
            if !path.is_file() || !Self::is_json(&path) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let data = fs::read(&path).map_err(KVError::storage)?;
            if let Err(e) = serde_json::from_slice::<serde_json::Value>(&data) {
                warn!("FileLoader: skipping {:?}: {}", path, e);
                continue;
            }
            overlay.insert_file_entry(format!("{}{}", prefix, stem), data);
            count += 1;
        }
        Ok(count)
    }

    fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, KVError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(KVError::storage)? {
            paths.push(entry.map_err(KVError::storage)?.path());
        }
        paths.sort();
        Ok(paths)
    }

    fn is_json(path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RedbStore;

    #[test]
    fn loads_roles_and_reference_data() {
        let data = tempfile::tempdir().unwrap();
        let roles = data.path().join("roles");
        let units = data.path().join("reference/units");
        fs::create_dir_all(&roles).unwrap();
        fs::create_dir_all(&units).unwrap();
        fs::write(roles.join("qa.json"), r#"{"materials":["view"]}"#).unwrap();
        fs::write(roles.join("notes.txt"), "ignored").unwrap();
        fs::write(units.join("PCS.json"), r#"{"code":"PCS","name":"Piece"}"#).unwrap();

        let db_dir = tempfile::tempdir().unwrap();
        let overlay = OverlayKV::new(RedbStore::open(&db_dir.path().join("kv.redb")).unwrap());

        let n = FileLoader::load(data.path(), &overlay).unwrap();
        assert_eq!(n, 2);
        assert!(overlay.is_readonly("config:role:qa"));
        assert!(overlay.is_readonly("mdm:units:PCS"));
        assert!(overlay.get("config:role:notes").unwrap().is_none());
    }

    #[test]
    fn invalid_json_is_skipped() {
        let data = tempfile::tempdir().unwrap();
        let roles = data.path().join("roles");
        fs::create_dir_all(&roles).unwrap();
        fs::write(roles.join("broken.json"), "{not json").unwrap();

        let db_dir = tempfile::tempdir().unwrap();
        let overlay = OverlayKV::new(RedbStore::open(&db_dir.path().join("kv.redb")).unwrap());

        assert_eq!(FileLoader::load(data.path(), &overlay).unwrap(), 0);
        assert_eq!(overlay.file_layer_len(), 0);
    }

    #[test]
    fn missing_data_dir_loads_nothing() {
        let db_dir = tempfile::tempdir().unwrap();
        let overlay = OverlayKV::new(RedbStore::open(&db_dir.path().join("kv.redb")).unwrap());
        let n = FileLoader::load(&db_dir.path().join("nope"), &overlay).unwrap();
        assert_eq!(n, 0);
    }
}
