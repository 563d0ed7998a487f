//! Scripted [`GenAiApi`] for tests.
//!
//! Responses are queued per method and consumed in order; an exhausted
//! queue answers with an internal error so unexpected calls fail loudly.
//! Every call is counted, which makes "no network call happened"
//! assertions direct.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{
    FetchedMedia, GenAiApi, GenerateContentRequest, GenerateContentResponse,
    GenerateVideosRequest, VideoOperation,
};
use crate::core::credentials::Credential;
use crate::core::{CoreError, CoreResult};

/// Locks a mutex, recovering the data if a panicking test poisoned it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn next<T>(queue: &Mutex<VecDeque<CoreResult<T>>>, method: &str) -> CoreResult<T> {
    lock(queue).pop_front().unwrap_or_else(|| {
        Err(CoreError::Internal(format!(
            "MockGenAiApi: no scripted response for {}",
            method
        )))
    })
}

/// Mock provider with scripted responses and call counters
#[derive(Default)]
pub struct MockGenAiApi {
    content: Mutex<VecDeque<CoreResult<GenerateContentResponse>>>,
    submissions: Mutex<VecDeque<CoreResult<VideoOperation>>>,
    operations: Mutex<VecDeque<CoreResult<VideoOperation>>>,
    fetches: Mutex<VecDeque<CoreResult<FetchedMedia>>>,

    content_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    fetch_calls: AtomicUsize,

    content_requests: Mutex<Vec<(String, GenerateContentRequest)>>,
    video_requests: Mutex<Vec<(String, GenerateVideosRequest)>>,
    polled_names: Mutex<Vec<String>>,
    fetched_uris: Mutex<Vec<String>>,
    seen_credentials: Mutex<Vec<String>>,
}

impl MockGenAiApi {
    /// Creates a mock with nothing scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful text response
    pub fn with_text(self, text: impl Into<String>) -> Self {
        lock(&self.content).push_back(Ok(GenerateContentResponse::from_text(text)));
        self
    }

    /// Queues a failed content generation
    pub fn with_content_error(self, error: CoreError) -> Self {
        lock(&self.content).push_back(Err(error));
        self
    }

    /// Scripts a video job: the first state answers the submission, the
    /// rest answer successive status queries.
    pub fn with_video_job(self, states: Vec<VideoOperation>) -> Self {
        let mut states = states.into_iter();
        if let Some(first) = states.next() {
            lock(&self.submissions).push_back(Ok(first));
        }
        lock(&self.operations).extend(states.map(Ok));
        self
    }

    /// Queues a failed submission
    pub fn with_submit_error(self, error: CoreError) -> Self {
        lock(&self.submissions).push_back(Err(error));
        self
    }

    /// Queues a failed status query
    pub fn with_poll_error(self, error: CoreError) -> Self {
        lock(&self.operations).push_back(Err(error));
        self
    }

    /// Queues downloadable bytes
    pub fn with_fetch(self, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        lock(&self.fetches).push_back(Ok(FetchedMedia {
            bytes,
            content_type: content_type.map(str::to_string),
        }));
        self
    }

    /// Queues a failed download
    pub fn with_fetch_error(self, error: CoreError) -> Self {
        lock(&self.fetches).push_back(Err(error));
        self
    }

    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Calls across every method
    pub fn total_calls(&self) -> usize {
        self.content_calls() + self.submit_calls() + self.poll_calls() + self.fetch_calls()
    }

    /// Model and body of each content request, in order
    pub fn content_requests(&self) -> Vec<(String, GenerateContentRequest)> {
        lock(&self.content_requests).clone()
    }

    /// Model and body of each video submission, in order
    pub fn video_requests(&self) -> Vec<(String, GenerateVideosRequest)> {
        lock(&self.video_requests).clone()
    }

    /// Operation names passed to status queries, in order
    pub fn polled_names(&self) -> Vec<String> {
        lock(&self.polled_names).clone()
    }

    /// Retrieval locations passed to downloads, in order
    pub fn fetched_uris(&self) -> Vec<String> {
        lock(&self.fetched_uris).clone()
    }

    /// Raw credential values seen by any call, in order
    pub fn seen_credentials(&self) -> Vec<String> {
        lock(&self.seen_credentials).clone()
    }

    fn record_credential(&self, credential: &Credential) {
        lock(&self.seen_credentials).push(credential.expose().to_string());
    }
}

#[async_trait]
impl GenAiApi for MockGenAiApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_content(
        &self,
        credential: &Credential,
        model: &str,
        request: &GenerateContentRequest,
    ) -> CoreResult<GenerateContentResponse> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.record_credential(credential);
        lock(&self.content_requests).push((model.to_string(), request.clone()));
        next(&self.content, "generate_content")
    }

    async fn generate_videos(
        &self,
        credential: &Credential,
        model: &str,
        request: &GenerateVideosRequest,
    ) -> CoreResult<VideoOperation> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.record_credential(credential);
        lock(&self.video_requests).push((model.to_string(), request.clone()));
        next(&self.submissions, "generate_videos")
    }

    async fn get_operation(
        &self,
        credential: &Credential,
        operation: &VideoOperation,
    ) -> CoreResult<VideoOperation> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.record_credential(credential);
        lock(&self.polled_names).push(operation.name.clone());
        next(&self.operations, "get_operation")
    }

    async fn fetch_media(&self, credential: &Credential, uri: &str) -> CoreResult<FetchedMedia> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.record_credential(credential);
        lock(&self.fetched_uris).push(uri.to_string());
        next(&self.fetches, "fetch_media")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_consumes_script_in_order() {
        let mock = MockGenAiApi::new().with_video_job(vec![
            VideoOperation::pending("op"),
            VideoOperation::pending("op"),
            VideoOperation::succeeded("op", Some("https://x/video")),
        ]);
        let credential = Credential::new("AIzaMock").unwrap();
        let request = GenerateVideosRequest {
            instances: vec![],
            parameters: super::super::VideoParameters {
                aspect_ratio: "16:9".to_string(),
                resolution: "720p".to_string(),
                sample_count: 1,
            },
        };

        let op = mock.generate_videos(&credential, "veo", &request).await.unwrap();
        assert!(!op.done);
        assert!(!mock.get_operation(&credential, &op).await.unwrap().done);
        assert!(mock.get_operation(&credential, &op).await.unwrap().done);
        assert!(matches!(
            mock.get_operation(&credential, &op).await,
            Err(CoreError::Internal(_))
        ));

        assert_eq!(mock.submit_calls(), 1);
        assert_eq!(mock.poll_calls(), 3);
        assert_eq!(mock.total_calls(), 4);
    }
}
