use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use signage_slideshow::error::Error;
use signage_slideshow::events::{FileStatus, SyncRequest, WatchEnvelope, WatchEvent};
use signage_slideshow::sync;

struct Service {
    requests: mpsc::Sender<SyncRequest>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Service {
    fn spawn(root: &Path) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<SyncRequest>(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sync::run(root.to_path_buf(), req_rx, cancel.clone()));
        Self {
            requests: req_tx,
            cancel,
            task,
        }
    }

    async fn start_watch(
        &self,
        epoch: u64,
        files: &[&str],
    ) -> (Result<(), Error>, mpsc::Receiver<WatchEnvelope>) {
        let (events_tx, events_rx) = mpsc::channel::<WatchEnvelope>(32);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(SyncRequest::StartWatch {
                epoch,
                files: files.iter().map(|f| (*f).to_owned()).collect(),
                events: events_tx,
                reply: reply_tx,
            })
            .await
            .unwrap();
        let outcome = timeout(Duration::from_secs(5), reply_rx)
            .await
            .expect("timeout waiting for subscription reply")
            .expect("reply dropped");
        (outcome, events_rx)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(SyncRequest::Fetch {
                url: url.to_owned(),
                reply: reply_tx,
            })
            .await
            .unwrap();
        timeout(Duration::from_secs(5), reply_rx)
            .await
            .expect("timeout waiting for fetch reply")
            .expect("reply dropped")
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn next_envelope(rx: &mut mpsc::Receiver<WatchEnvelope>) -> WatchEnvelope {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timeout waiting for a watch event")
        .expect("event channel closed")
}

/// Keep receiving until `predicate` accepts an event.
async fn wait_for_event<F>(rx: &mut mpsc::Receiver<WatchEnvelope>, mut predicate: F) -> WatchEvent
where
    F: FnMut(&WatchEvent) -> bool,
{
    loop {
        let envelope = next_envelope(rx).await;
        if predicate(&envelope.event) {
            return envelope.event;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reports_existing_files_current_and_missing_files_pending() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.jpg"), b"jpeg-bytes").unwrap();

    let service = Service::spawn(tmp.path());
    let (outcome, mut events) = service.start_watch(7, &["a.jpg", "missing.png"]).await;
    outcome.unwrap();

    let envelope = next_envelope(&mut events).await;
    assert_eq!(envelope.epoch, 7);
    let WatchEvent::FilesUpdated(files) = envelope.event else {
        panic!("expected an initial full-list update");
    };
    let a = files.iter().find(|f| f.file_path == "a.jpg").unwrap();
    assert_eq!(a.status, FileStatus::Current);
    assert!(a.file_url.starts_with("file://"));
    let missing = files.iter().find(|f| f.file_path == "missing.png").unwrap();
    assert_eq!(missing.status, FileStatus::Pending);

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn created_files_become_current_and_removed_files_are_deleted() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.jpg"), b"x").unwrap();

    let service = Service::spawn(tmp.path());
    let (outcome, mut events) = service.start_watch(1, &["a.jpg", "late.png"]).await;
    outcome.unwrap();

    // Skip the initial snapshot.
    let _ = next_envelope(&mut events).await;

    fs::write(tmp.path().join("late.png"), b"y").unwrap();
    let event = wait_for_event(&mut events, |ev| match ev {
        WatchEvent::FilesUpdated(files) => files
            .iter()
            .any(|f| f.file_path == "late.png" && f.status == FileStatus::Current),
        _ => false,
    })
    .await;
    let WatchEvent::FilesUpdated(files) = event else {
        unreachable!()
    };
    assert_eq!(files.len(), 2, "updates carry the full managed list");

    fs::remove_file(tmp.path().join("a.jpg")).unwrap();
    wait_for_event(&mut events, |ev| {
        matches!(ev, WatchEvent::FileDeleted { file_path } if file_path == "a.jpg")
    })
    .await;

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_reads_local_bytes_and_flags_missing_files() {
    let tmp = tempfile::tempdir().unwrap();
    let local = tmp.path().join("x.svg");
    fs::write(&local, b"<svg/>").unwrap();

    let service = Service::spawn(tmp.path());

    let bytes = service
        .fetch(&format!("file://{}", local.display()))
        .await
        .unwrap();
    assert_eq!(bytes, b"<svg/>");

    let missing = service
        .fetch(&format!("file://{}", tmp.path().join("nope.svg").display()))
        .await;
    assert!(matches!(missing, Err(Error::FetchNotFound(_))));

    let bad = service.fetch("https://elsewhere.example/x.svg").await;
    assert!(matches!(bad, Err(Error::BadUrl(_))));

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscription_is_refused_when_the_root_is_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Service::spawn(&tmp.path().join("does-not-exist"));
    let (outcome, _events) = service.start_watch(1, &["a.jpg"]).await;
    assert!(matches!(outcome, Err(Error::SyncUnavailable(_))));
    service.shutdown().await;
}
