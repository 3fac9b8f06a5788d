//! Directory-backed file-sync service.
//!
//! Serves the engine's sync surface from a local media directory: watched
//! files resolve to `file://` URLs, filesystem changes stream back as watch
//! events, and fetches read straight from disk. Production deployments swap
//! in the device cache service; this implementation backs the reference
//! binary and the integration tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::events::{FileStatus, ManagedFile, SyncRequest, WatchEnvelope, WatchEvent};

struct Subscription {
    epoch: u64,
    events: mpsc::Sender<WatchEnvelope>,
    files: BTreeMap<String, ManagedFile>,
    _watcher: RecommendedWatcher,
}

pub async fn run(
    root: PathBuf,
    mut requests: mpsc::Receiver<SyncRequest>,
    cancel: CancellationToken,
) -> Result<()> {
    // Bridge notify callbacks -> async channel.
    let (fs_tx, mut fs_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut subscription: Option<Subscription> = None;

    info!(root = %root.display(), "directory sync service started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting directory sync");
                break;
            }

            maybe_req = requests.recv() => match maybe_req {
                Some(SyncRequest::StartWatch { epoch, files, events, reply }) => {
                    match start_subscription(&root, epoch, files, events, &fs_tx) {
                        Ok(sub) => {
                            let _ = reply.send(Ok(()));
                            send_update(&sub).await;
                            subscription = Some(sub);
                        }
                        Err(err) => {
                            warn!(error = %err, "failed to start watch");
                            let _ = reply.send(Err(err));
                        }
                    }
                }
                Some(SyncRequest::StopWatch) => {
                    debug!("watch stopped");
                    subscription = None;
                }
                Some(SyncRequest::Fetch { url, reply }) => {
                    let _ = reply.send(fetch(&url).await);
                }
                None => break,
            },

            Some(res) = fs_rx.recv() => match res {
                Ok(event) => {
                    if let Some(sub) = subscription.as_mut() {
                        apply_fs_event(&root, sub, event).await;
                    }
                }
                Err(err) => {
                    error!(error = %err, "filesystem watch error");
                    if let Some(sub) = subscription.as_ref() {
                        // Files still waiting to appear may never arrive now;
                        // report each one so the engine can degrade.
                        for file in sub.files.values().filter(|f| f.status != FileStatus::Current) {
                            send_event(sub, WatchEvent::FileError {
                                file_path: file.file_path.clone(),
                                message: err.to_string(),
                            }).await;
                        }
                    }
                }
            },
        }
    }
    Ok(())
}

fn start_subscription(
    root: &Path,
    epoch: u64,
    files: Vec<String>,
    events: mpsc::Sender<WatchEnvelope>,
    fs_tx: &mpsc::Sender<notify::Result<Event>>,
) -> Result<Subscription, Error> {
    if !root.is_dir() {
        return Err(Error::SyncUnavailable(format!(
            "media root {} is not a directory",
            root.display()
        )));
    }
    let fs_tx = fs_tx.clone();
    let mut watcher = recommended_watcher(move |res| {
        let _ = fs_tx.blocking_send(res);
    })
    .map_err(|err| Error::SyncUnavailable(err.to_string()))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|err| Error::SyncUnavailable(err.to_string()))?;

    let mut managed = BTreeMap::new();
    for file in files {
        let local = root.join(&file);
        let status = if local.is_file() {
            FileStatus::Current
        } else {
            FileStatus::Pending
        };
        managed.insert(
            file.clone(),
            ManagedFile {
                file_path: file,
                file_url: file_url(&local),
                status,
            },
        );
    }
    info!(files = managed.len(), "watch subscription started");
    Ok(Subscription {
        epoch,
        events,
        files: managed,
        _watcher: watcher,
    })
}

async fn apply_fs_event(root: &Path, sub: &mut Subscription, event: Event) {
    debug!(kind = ?event.kind, paths = ?event.paths, "notify event");
    match &event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Modify(ModifyKind::Data(_)) => {
            let mut changed = false;
            for path in &event.paths {
                if let Some(key) = watched_key(root, sub, path) {
                    info!(file = %key, "file available");
                    sub.files
                        .get_mut(&key)
                        .expect("key came from the map")
                        .status = FileStatus::Current;
                    changed = true;
                }
            }
            if changed {
                send_update(sub).await;
            }
        }
        EventKind::Remove(RemoveKind::File) => {
            for path in &event.paths {
                if let Some(key) = watched_key(root, sub, path) {
                    info!(file = %key, "file deleted");
                    sub.files.remove(&key);
                    send_event(sub, WatchEvent::FileDeleted { file_path: key }).await;
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Moves often surface as bare name changes; decide per path by
            // existence.
            for path in &event.paths {
                if let Some(key) = watched_key(root, sub, path) {
                    if path.exists() {
                        info!(file = %key, "file available (rename)");
                        sub.files
                            .get_mut(&key)
                            .expect("key came from the map")
                            .status = FileStatus::Current;
                        send_update(sub).await;
                    } else {
                        info!(file = %key, "file deleted (rename)");
                        sub.files.remove(&key);
                        send_event(sub, WatchEvent::FileDeleted { file_path: key }).await;
                    }
                }
            }
        }
        _ => {
            debug!(kind = ?event.kind, "fs event ignored");
        }
    }
}

fn watched_key(root: &Path, sub: &Subscription, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let key = rel.to_string_lossy().replace('\\', "/");
    sub.files.contains_key(&key).then_some(key)
}

/// Full-list semantics: send the complete managed set on every change.
async fn send_update(sub: &Subscription) {
    let files: Vec<ManagedFile> = sub.files.values().cloned().collect();
    send_event(sub, WatchEvent::FilesUpdated(files)).await;
}

async fn send_event(sub: &Subscription, event: WatchEvent) {
    let _ = sub
        .events
        .send(WatchEnvelope {
            epoch: sub.epoch,
            event,
        })
        .await;
}

async fn fetch(url: &str) -> Result<Vec<u8>, Error> {
    let path = url
        .strip_prefix("file://")
        .ok_or_else(|| Error::BadUrl(url.to_owned()))?;
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::FetchNotFound(url.to_owned()))
        }
        Err(err) => Err(err.into()),
    }
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
