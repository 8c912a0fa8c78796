// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Parallel download of the archives named by the selected catalog, with
//! idempotent resumption and an unused-archive purge (§4.H).

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use camino::Utf8Path;
use filetime::FileTime;
use indexmap::{IndexMap, IndexSet};
use log::{info, warn};
use url::Url;

use crate::catalog::ArchiveClient;
use crate::errors::FetchError;
use crate::types::PackageName;

const LOGNAME: &str = "cratemirror::fetcher";

#[derive(Debug, Default, Clone)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub failed: usize,
    pub unused: Vec<String>,
    pub purged: usize,
}

struct Task {
    name: PackageName,
    version: String,
    filename: String,
}

fn archive_filename(name: &PackageName, version: &str) -> String {
    format!("{name}-{version}.crate")
}

fn archive_url(base: &Url, name: &PackageName, version: &str) -> Url {
    base.join(&format!("{name}/{version}/download"))
        .unwrap_or_else(|_| base.clone())
}

/// Run the fetcher (§4.H) against `selected`, the resolver's projected
/// catalog. `client_factory` is called once per worker thread so each
/// worker owns its own connection, per §5's isolation requirement.
pub fn fetch<F, C>(
    selected: &IndexMap<PackageName, IndexSet<String>>,
    archives_dir: &Utf8Path,
    base_url: &Url,
    workers: usize,
    purge: bool,
    client_factory: F,
    mut on_progress: impl FnMut(u64, u64) + Send,
) -> Result<FetchSummary, FetchError>
where
    F: Fn() -> C + Sync,
    C: ArchiveClient,
{
    std::fs::create_dir_all(archives_dir).map_err(|source| FetchError::CreateDir {
        path: archives_dir.to_string(),
        source,
    })?;

    let wanted: HashSet<String> = selected
        .iter()
        .flat_map(|(name, versions)| versions.iter().map(move |v| archive_filename(name, v)))
        .collect();

    let existing: HashSet<String> = std::fs::read_dir(archives_dir)
        .map_err(|source| FetchError::ListArchives {
            path: archives_dir.to_string(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();

    let mut unused: Vec<String> = existing.difference(&wanted).cloned().collect();
    unused.sort();
    let mut purged = 0;
    if purge {
        for filename in &unused {
            let path = archives_dir.join(filename);
            info!(target: LOGNAME, "purging unused archive {filename}");
            std::fs::remove_file(&path).map_err(|source| FetchError::RemoveUnused {
                path: path.to_string(),
                source,
            })?;
            purged += 1;
        }
    }

    let tasks: Vec<Task> = selected
        .iter()
        .flat_map(|(name, versions)| {
            versions.iter().filter_map(move |v| {
                let filename = archive_filename(name, v);
                if existing.contains(&filename) {
                    None
                } else {
                    Some(Task {
                        name: name.clone(),
                        version: v.clone(),
                        filename,
                    })
                }
            })
        })
        .collect();

    let total = tasks.len() as u64;
    if total == 0 {
        return Ok(FetchSummary {
            downloaded: 0,
            failed: 0,
            unused,
            purged,
        });
    }

    let counter = AtomicU64::new(0);
    let completed = AtomicU64::new(0);
    let failed = AtomicU64::new(0);
    let progress_mutex = Mutex::new(());
    let task_queue = Mutex::new(tasks.into_iter());
    let workers = workers.max(1).min(total as usize).max(1);

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let client = client_factory();
            let task_queue = &task_queue;
            let counter = &counter;
            let completed = &completed;
            let failed = &failed;
            handles.push(scope.spawn(|| {
                loop {
                    let task = {
                        let mut queue = task_queue.lock().unwrap();
                        queue.next()
                    };
                    let Some(task) = task else { break };

                    let url = archive_url(base_url, &task.name, &task.version);
                    match client.get(&url) {
                        Ok(response) => {
                            let dest = archives_dir.join(&task.filename);
                            match write_archive_atomic(&dest, &response.body) {
                                Ok(()) => {
                                    if let Some(mtime) = response.last_modified {
                                        let ft = FileTime::from_system_time(mtime);
                                        let _ = filetime::set_file_mtime(&dest, ft);
                                    }
                                    completed.fetch_add(1, Ordering::SeqCst);
                                }
                                Err(err) => {
                                    warn!(target: LOGNAME, "could not write {}: {err}", task.filename);
                                    failed.fetch_add(1, Ordering::SeqCst);
                                }
                            }
                        }
                        Err(err) => {
                            warn!(target: LOGNAME, "could not download {}: {err}", task.filename);
                            failed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        // Poll the shared counter from the scheduling thread so progress
        // reporting stays serialized through a single mutex (§5) without
        // every worker needing a reference to the caller's callback.
        while handles.iter().any(|h| !h.is_finished()) {
            let n = counter.load(Ordering::SeqCst);
            let _guard = progress_mutex.lock().unwrap();
            on_progress(n, total);
            drop(_guard);
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        for handle in handles {
            let _ = handle.join();
        }
    });

    on_progress(counter.load(Ordering::SeqCst), total);

    Ok(FetchSummary {
        downloaded: completed.load(Ordering::SeqCst) as usize,
        failed: failed.load(Ordering::SeqCst) as usize,
        unused,
        purged,
    })
}

fn write_archive_atomic(dest: &Utf8Path, body: &[u8]) -> std::io::Result<()> {
    let tmp = dest.with_extension("crate.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, dest)
}
