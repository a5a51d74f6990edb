//! Streaming bridge — normalizes provider streams into the public protocol.
//!
//! The provider side promises nothing: backends may emit empty deltas,
//! duplicate stops, faults after a stop, or end without any terminal at
//! all. The bridge forwards deltas in arrival order and guarantees the
//! output channel sees **exactly one** terminal event, after which every
//! later provider event is observed and discarded.
//!
//! The non-streaming single-shot path lives here too as the degenerate
//! case: same request preparation, but the result is one string and a
//! provider failure becomes an error-flagged string instead of an error.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use braid_config::CompletionDefaults;
use braid_core::{ChatProvider, ChatRequest, ChatTurn, OutputEvent, ProviderEvent, RequestError};

/// Bridges a [`ChatProvider`] to consumers of [`OutputEvent`] streams.
pub struct StreamingBridge {
    provider: Arc<dyn ChatProvider>,
    defaults: CompletionDefaults,
}

impl StreamingBridge {
    pub fn new(provider: Arc<dyn ChatProvider>, defaults: CompletionDefaults) -> Self {
        Self { provider, defaults }
    }

    /// Validate a request and apply configured defaults.
    ///
    /// Turn contents are trimmed and turns left empty are dropped. Rejected
    /// before any I/O: an empty turn list, or no usable turns after
    /// filtering.
    fn prepare(&self, request: &ChatRequest) -> Result<ChatRequest, RequestError> {
        if request.turns.is_empty() {
            return Err(RequestError::EmptyTurns);
        }

        let turns: Vec<ChatTurn> = request
            .turns
            .iter()
            .filter(|t| !t.content.trim().is_empty())
            .map(|t| ChatTurn {
                role: t.role,
                content: t.content.trim().to_string(),
            })
            .collect();
        if turns.is_empty() {
            return Err(RequestError::NoUsableTurns);
        }

        Ok(ChatRequest {
            turns,
            system: request.system.clone(),
            max_tokens: Some(request.max_tokens.unwrap_or(self.defaults.max_tokens)),
            temperature: request.temperature.or(self.defaults.temperature),
            top_p: request.top_p.or(self.defaults.top_p),
        })
    }

    /// Start a streaming run and hand back the output channel.
    ///
    /// Returns immediately after dispatch; a spawned task owns all writes
    /// to the channel. Dropping the receiver cancels the run: the task
    /// observes the closed channel, stops forwarding, and drops the
    /// upstream receiver so the provider can stop producing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self, request: &ChatRequest) -> Result<mpsc::Receiver<OutputEvent>, RequestError> {
        let prepared = self.prepare(request)?;
        let (tx, rx) = mpsc::channel(self.defaults.channel_capacity);
        let provider = self.provider.clone();
        tokio::spawn(async move {
            forward(provider, prepared, tx).await;
        });
        Ok(rx)
    }

    /// The non-streaming single-shot path.
    ///
    /// Total apart from input validation: a provider failure is returned as
    /// an error-flagged string, never an error. Response text blocks are
    /// concatenated in response order; no blocks yields the empty string.
    pub async fn complete_once(&self, request: &ChatRequest) -> Result<String, RequestError> {
        let prepared = self.prepare(request)?;
        match self.provider.complete(prepared).await {
            Ok(blocks) => Ok(blocks.concat()),
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "single-shot completion failed");
                Ok(format!("[provider error] {e}"))
            }
        }
    }
}

/// Adapt an output channel into a `Stream` for SSE-style consumers.
pub fn into_stream(rx: mpsc::Receiver<OutputEvent>) -> ReceiverStream<OutputEvent> {
    ReceiverStream::new(rx)
}

/// The forwarding task: provider events in, normalized output events out.
async fn forward(
    provider: Arc<dyn ChatProvider>,
    request: ChatRequest,
    tx: mpsc::Sender<OutputEvent>,
) {
    let mut upstream = match provider.stream(request).await {
        Ok(rx) => rx,
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "failed to open provider stream");
            let _ = tx
                .send(OutputEvent::Error {
                    message: e.to_string(),
                })
                .await;
            return;
        }
    };

    let mut terminated = false;
    while let Some(event) = upstream.recv().await {
        if terminated {
            debug!("discarding provider event after terminal");
            continue;
        }
        match event {
            ProviderEvent::Delta(text) => {
                if text.is_empty() {
                    continue;
                }
                if tx.send(OutputEvent::Delta { text }).await.is_err() {
                    // Consumer hung up; dropping `upstream` cancels the provider
                    debug!("output channel closed by consumer, cancelling run");
                    return;
                }
            }
            ProviderEvent::Stop => {
                let _ = tx.send(OutputEvent::Done).await;
                terminated = true;
            }
            ProviderEvent::Fault(e) => {
                warn!(provider = provider.name(), error = %e, "provider fault mid-stream");
                let _ = tx
                    .send(OutputEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                terminated = true;
            }
        }
    }

    // A stream that just ends is a fault, not a silent success
    if !terminated {
        let _ = tx
            .send(OutputEvent::Error {
                message: "provider stream ended without a terminal event".into(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use braid_core::error::ProviderError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio_stream::StreamExt;

    /// Replays a fixed event script on every `stream()` call.
    struct ScriptedProvider {
        events: Vec<ProviderEvent>,
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ChatRequest,
        ) -> Result<Vec<String>, ProviderError> {
            Err(ProviderError::NotConfigured("complete not scripted".into()))
        }

        async fn stream(
            &self,
            _request: ChatRequest,
        ) -> Result<mpsc::Receiver<ProviderEvent>, ProviderError> {
            let (tx, rx) = mpsc::channel(16);
            let events = self.events.clone();
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }
    }

    /// Captures the prepared request and returns fixed blocks.
    struct CapturingProvider {
        seen: Mutex<Option<ChatRequest>>,
        blocks: Result<Vec<String>, ProviderError>,
    }

    #[async_trait]
    impl ChatProvider for CapturingProvider {
        fn name(&self) -> &str {
            "capturing"
        }

        async fn complete(
            &self,
            request: ChatRequest,
        ) -> Result<Vec<String>, ProviderError> {
            *self.seen.lock().unwrap() = Some(request);
            self.blocks.clone()
        }
    }

    /// Fails to open a stream at all.
    struct BrokenProvider;

    #[async_trait]
    impl ChatProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        async fn complete(
            &self,
            _request: ChatRequest,
        ) -> Result<Vec<String>, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }

        async fn stream(
            &self,
            _request: ChatRequest,
        ) -> Result<mpsc::Receiver<ProviderEvent>, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    /// Emits deltas forever and flags when the bridge hangs up.
    struct EndlessProvider {
        cancelled: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ChatProvider for EndlessProvider {
        fn name(&self) -> &str {
            "endless"
        }

        async fn complete(
            &self,
            _request: ChatRequest,
        ) -> Result<Vec<String>, ProviderError> {
            Err(ProviderError::NotConfigured("streaming only".into()))
        }

        async fn stream(
            &self,
            _request: ChatRequest,
        ) -> Result<mpsc::Receiver<ProviderEvent>, ProviderError> {
            let (tx, rx) = mpsc::channel(1);
            let cancelled = self.cancelled.clone();
            tokio::spawn(async move {
                loop {
                    if tx.send(ProviderEvent::Delta("tick".into())).await.is_err() {
                        cancelled.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn bridge(provider: Arc<dyn ChatProvider>) -> StreamingBridge {
        StreamingBridge::new(provider, CompletionDefaults::default())
    }

    fn scripted(events: Vec<ProviderEvent>) -> StreamingBridge {
        bridge(Arc::new(ScriptedProvider { events }))
    }

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatTurn::user("hi")])
    }

    async fn collect(mut rx: mpsc::Receiver<OutputEvent>) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn deltas_then_done_in_order() {
        let b = scripted(vec![
            ProviderEvent::Delta("Hello".into()),
            ProviderEvent::Delta(" world".into()),
            ProviderEvent::Stop,
        ]);
        let events = collect(b.run(&request()).unwrap()).await;
        assert_eq!(
            events,
            vec![
                OutputEvent::Delta {
                    text: "Hello".into()
                },
                OutputEvent::Delta {
                    text: " world".into()
                },
                OutputEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn empty_deltas_are_dropped() {
        let b = scripted(vec![
            ProviderEvent::Delta(String::new()),
            ProviderEvent::Delta("x".into()),
            ProviderEvent::Delta(String::new()),
            ProviderEvent::Stop,
        ]);
        let events = collect(b.run(&request()).unwrap()).await;
        assert_eq!(
            events,
            vec![OutputEvent::Delta { text: "x".into() }, OutputEvent::Done]
        );
    }

    #[tokio::test]
    async fn duplicate_terminals_are_discarded() {
        let b = scripted(vec![
            ProviderEvent::Delta("x".into()),
            ProviderEvent::Stop,
            ProviderEvent::Stop,
            ProviderEvent::Fault(ProviderError::Network("late fault".into())),
            ProviderEvent::Delta("stray".into()),
        ]);
        let events = collect(b.run(&request()).unwrap()).await;
        assert_eq!(
            events,
            vec![OutputEvent::Delta { text: "x".into() }, OutputEvent::Done]
        );
    }

    #[tokio::test]
    async fn fault_becomes_single_error() {
        let b = scripted(vec![
            ProviderEvent::Delta("partial".into()),
            ProviderEvent::Fault(ProviderError::Timeout("30s elapsed".into())),
        ]);
        let events = collect(b.run(&request()).unwrap()).await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            OutputEvent::Delta {
                text: "partial".into()
            }
        );
        match &events[1] {
            OutputEvent::Error { message } => assert!(message.contains("30s elapsed")),
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_ending_without_terminal_is_an_error() {
        let b = scripted(vec![ProviderEvent::Delta("partial".into())]);
        let events = collect(b.run(&request()).unwrap()).await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            OutputEvent::Error { message } => {
                assert!(message.contains("without a terminal"))
            }
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_to_open_stream_is_an_error_event() {
        let b = bridge(Arc::new(BrokenProvider));
        let events = collect(b.run(&request()).unwrap()).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            OutputEvent::Error { message } => assert!(message.contains("connection refused")),
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_receiver_cancels_upstream() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let b = bridge(Arc::new(EndlessProvider {
            cancelled: cancelled.clone(),
        }));

        let mut rx = b.run(&request()).unwrap();
        assert!(rx.recv().await.is_some());
        drop(rx);

        for _ in 0..100 {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("provider was never cancelled after consumer hung up");
    }

    #[tokio::test]
    async fn run_rejects_invalid_input_before_dispatch() {
        let b = scripted(vec![ProviderEvent::Stop]);
        assert_eq!(
            b.run(&ChatRequest::new(Vec::new())).unwrap_err(),
            RequestError::EmptyTurns
        );
        assert_eq!(
            b.run(&ChatRequest::new(vec![ChatTurn::user("   ")]))
                .unwrap_err(),
            RequestError::NoUsableTurns
        );
    }

    #[tokio::test]
    async fn prepare_applies_defaults_and_trims_turns() {
        let provider = Arc::new(CapturingProvider {
            seen: Mutex::new(None),
            blocks: Ok(vec!["ok".into()]),
        });
        let b = StreamingBridge::new(
            provider.clone(),
            CompletionDefaults {
                max_tokens: 4000,
                temperature: Some(0.7),
                top_p: None,
                channel_capacity: 128,
            },
        );

        let req = ChatRequest::new(vec![
            ChatTurn::user("  hello  "),
            ChatTurn::assistant(""),
            ChatTurn::user("there"),
        ]);
        b.complete_once(&req).await.unwrap();

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.turns.len(), 2);
        assert_eq!(seen.turns[0].content, "hello");
        assert_eq!(seen.max_tokens, Some(4000));
        assert_eq!(seen.temperature, Some(0.7));
    }

    #[tokio::test]
    async fn prepare_keeps_caller_tuning() {
        let provider = Arc::new(CapturingProvider {
            seen: Mutex::new(None),
            blocks: Ok(vec![]),
        });
        let b = bridge(provider.clone());

        let mut req = request();
        req.max_tokens = Some(64);
        req.temperature = Some(0.1);
        b.complete_once(&req).await.unwrap();

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.max_tokens, Some(64));
        assert_eq!(seen.temperature, Some(0.1));
    }

    #[tokio::test]
    async fn complete_once_concatenates_blocks() {
        let b = bridge(Arc::new(CapturingProvider {
            seen: Mutex::new(None),
            blocks: Ok(vec!["Hello".into(), " ".into(), "world".into()]),
        }));
        assert_eq!(b.complete_once(&request()).await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn complete_once_with_no_blocks_is_empty_string() {
        let b = bridge(Arc::new(CapturingProvider {
            seen: Mutex::new(None),
            blocks: Ok(vec![]),
        }));
        assert_eq!(b.complete_once(&request()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn complete_once_never_raises_on_provider_failure() {
        let b = bridge(Arc::new(BrokenProvider));
        let result = b.complete_once(&request()).await.unwrap();
        assert!(result.starts_with("[provider error]"));
        assert!(result.contains("connection refused"));
    }

    #[tokio::test]
    async fn into_stream_yields_events_in_order() {
        let b = scripted(vec![
            ProviderEvent::Delta("a".into()),
            ProviderEvent::Stop,
        ]);
        let mut stream = into_stream(b.run(&request()).unwrap());
        assert_eq!(
            stream.next().await,
            Some(OutputEvent::Delta { text: "a".into() })
        );
        assert_eq!(stream.next().await, Some(OutputEvent::Done));
        assert_eq!(stream.next().await, None);
    }
}
