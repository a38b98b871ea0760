//! Concurrent sidecar collection

use crate::error::{DriverError, DriverResult};
use crate::packageinfo::Package;
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use walkdir::WalkDir;

/// Read and decode every sidecar with at most `workers` files in flight.
///
/// Packages come back in the order of `files`. The first failure aborts the
/// whole collection; no partial package list is returned.
pub fn collect_sidecars(files: &[PathBuf], workers: usize) -> DriverResult<Vec<Package>> {
    let workers = workers.clamp(1, files.len().max(1));
    let (sender, receiver) = bounded::<(usize, &Path)>(workers);
    let decoded: Mutex<BTreeMap<usize, Vec<Package>>> = Mutex::new(BTreeMap::new());
    let failure: Mutex<Option<DriverError>> = Mutex::new(None);
    let abort = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let receiver = receiver.clone();
            let (decoded, failure, abort) = (&decoded, &failure, &abort);
            scope.spawn(move || {
                for (index, path) in receiver {
                    if abort.load(Ordering::Relaxed) {
                        continue;
                    }
                    match read_sidecar(path) {
                        Ok(pkgs) => {
                            decoded.lock().insert(index, pkgs);
                        }
                        Err(e) => {
                            abort.store(true, Ordering::Relaxed);
                            failure.lock().get_or_insert(e);
                        }
                    }
                }
            });
        }
        drop(receiver);

        for (index, path) in files.iter().enumerate() {
            if abort.load(Ordering::Relaxed) {
                break;
            }
            if sender.send((index, path.as_path())).is_err() {
                break;
            }
        }
        drop(sender);
    });

    if let Some(e) = failure.into_inner() {
        return Err(e);
    }
    let pkgs: Vec<Package> = decoded.into_inner().into_values().flatten().collect();
    debug!("decoded {} packages from {} sidecars", pkgs.len(), files.len());
    Ok(pkgs)
}

/// Decode one sidecar file
pub fn read_sidecar(path: &Path) -> DriverResult<Vec<Package>> {
    let file = File::open(path).map_err(|e| DriverError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| DriverError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Sidecar files under `dir`, sorted by path
pub fn find_sidecars(dir: &Path, suffix: &str) -> DriverResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| DriverError::io(dir, e.into()))?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(suffix) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}
