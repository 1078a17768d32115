//! Background URL reads.
//!
//! A [`FetchTask`] runs one blocking read on its own thread and hands the
//! bytes back over a channel. The frame loop polls it; nothing is shared
//! besides the channel and a cancellation flag.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("empty response from {0}")]
    Empty(String),

    #[error("could not start fetch thread: {0}")]
    Spawn(String),
}

/// Blocking "read this URL into memory".
pub trait UrlReader: Send + 'static {
    fn read(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<R: UrlReader + Sync + ?Sized> UrlReader for Arc<R> {
    fn read(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).read(url)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UreqReader;

impl UrlReader for UreqReader {
    fn read(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = ureq::get(url)
            .call()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Read(e.to_string()))?;

        if bytes.is_empty() {
            return Err(FetchError::Empty(url.to_string()));
        }
        Ok(bytes)
    }
}

#[derive(Debug, PartialEq)]
pub enum FetchPoll {
    Pending,
    Ready(Result<Vec<u8>, FetchError>),
    /// The result was already taken, the task was cancelled, or the worker
    /// died without answering.
    Closed,
}

pub struct FetchTask {
    url: String,
    rx: Option<mpsc::Receiver<Result<Vec<u8>, FetchError>>>,
    cancelled: Arc<AtomicBool>,
}

impl FetchTask {
    pub fn spawn(reader: impl UrlReader, url: impl Into<String>) -> Result<Self, FetchError> {
        let url = url.into();
        let (tx, rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker_url = url.clone();
        let worker_cancelled = cancelled.clone();
        thread::Builder::new()
            .name("tle-fetch".into())
            .spawn(move || {
                let result = reader.read(&worker_url);
                if worker_cancelled.load(Ordering::Acquire) {
                    log::debug!("fetch of {worker_url} finished after cancel; dropping result");
                    return;
                }
                let _ = tx.send(result);
            })
            .map_err(|e| FetchError::Spawn(e.to_string()))?;

        log::info!("fetching {url}");
        Ok(Self { url, rx: Some(rx), cancelled })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Non-blocking check for the worker's answer. `Ready` is returned at
    /// most once.
    pub fn poll(&mut self) -> FetchPoll {
        let Some(rx) = &self.rx else { return FetchPoll::Closed };
        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                FetchPoll::Ready(result)
            }
            Err(mpsc::TryRecvError::Empty) => FetchPoll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.rx = None;
                FetchPoll::Closed
            }
        }
    }

    /// Stops listening. The read itself runs to completion in the background
    /// and its result is thrown away.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.rx = None;
    }
}

impl Drop for FetchTask {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    pub(crate) struct StaticReader(pub Result<Vec<u8>, FetchError>);

    impl UrlReader for StaticReader {
        fn read(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.0.clone()
        }
    }

    pub(crate) fn wait_ready(task: &mut FetchTask) -> FetchPoll {
        let start = Instant::now();
        loop {
            match task.poll() {
                FetchPoll::Pending if start.elapsed() < Duration::from_secs(5) => {
                    thread::sleep(Duration::from_millis(5))
                }
                other => return other,
            }
        }
    }

    #[test]
    fn test_result_is_handed_over_once() {
        let mut task = FetchTask::spawn(StaticReader(Ok(b"abc".to_vec())), "mem://a").unwrap();
        assert_eq!(wait_ready(&mut task), FetchPoll::Ready(Ok(b"abc".to_vec())));
        assert_eq!(task.poll(), FetchPoll::Closed);
    }

    #[test]
    fn test_errors_are_delivered() {
        let err = FetchError::Http("404".into());
        let mut task = FetchTask::spawn(StaticReader(Err(err.clone())), "mem://b").unwrap();
        assert_eq!(wait_ready(&mut task), FetchPoll::Ready(Err(err)));
    }

    #[test]
    fn test_cancelled_task_reports_closed() {
        let mut task = FetchTask::spawn(StaticReader(Ok(vec![1])), "mem://c").unwrap();
        task.cancel();
        assert!(task.is_cancelled());
        assert_eq!(task.poll(), FetchPoll::Closed);
    }
}
