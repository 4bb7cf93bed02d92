use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::accuracy::RunningAccuracy;
use crate::chunker::TextChunker;
use crate::collaborators::{SpeechEvent, StoryFetcher, TextToSpeech, VoiceEngine, VoiceEvent};
use crate::config::SessionConfig;
use crate::matching::match_chunk;
use crate::models::{ProgressRecord, Story};
use crate::progress::ProgressStore;
use crate::retry::{FailedOperation, RetryDecision};

use super::state::{Feedback, SessionPhase, SessionSnapshot, SessionState};

/// Everything the controller consumes from the outside world, injected at
/// construction. No globals.
pub struct SessionDeps {
    pub stories: Arc<dyn StoryFetcher>,
    pub voice: Arc<dyn VoiceEngine>,
    pub tts: Arc<dyn TextToSpeech>,
    pub progress: ProgressStore,
}

struct LoadedStory {
    story: Story,
    chunker: TextChunker,
}

struct Pump {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct SessionInner {
    user_id: String,
    story_id: String,
    config: SessionConfig,
    deps: SessionDeps,
    state: Mutex<SessionState>,
    loaded: Mutex<Option<LoadedStory>>,
    pump: Mutex<Option<Pump>>,
    disposed: AtomicBool,
}

/// The reading-session state machine.
///
/// Drives `Idle → Loading → Ready → Recording → Evaluating → (Ready |
/// Completed | Failed)` in response to commands and voice-engine events.
/// All mutation is serialized behind one state mutex; speech events are
/// evaluated strictly one at a time.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<SessionInner>,
}

impl SessionController {
    pub fn new(
        user_id: impl Into<String>,
        story_id: impl Into<String>,
        deps: SessionDeps,
        config: SessionConfig,
    ) -> Self {
        let max_attempts = config.max_attempts;
        Self {
            inner: Arc::new(SessionInner {
                user_id: user_id.into(),
                story_id: story_id.into(),
                config,
                deps,
                state: Mutex::new(SessionState::new(max_attempts)),
                loaded: Mutex::new(None),
                pump: Mutex::new(None),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Loads the story and any persisted progress, retrying fetch failures
    /// against the shared budget. Leaves the session `Ready`, or `Failed`
    /// once the budget is spent.
    pub async fn begin(&self) -> Result<SessionSnapshot> {
        {
            let mut state = self.inner.state.lock().await;
            if state.phase != SessionPhase::Idle {
                bail!("session already started (phase {:?})", state.phase);
            }
            state.phase = SessionPhase::Loading;
        }

        loop {
            if self.is_disposed() {
                bail!("session disposed during load");
            }

            match self
                .inner
                .deps
                .stories
                .fetch_story(&self.inner.story_id)
                .await
            {
                Ok(story) => {
                    self.install_story(story).await;
                    break;
                }
                Err(err) => {
                    let mut state = self.inner.state.lock().await;
                    match state.retry.record_failure(FailedOperation::Story) {
                        RetryDecision::Retry(op) => {
                            warn!(
                                "{} fetch failed (attempt {} of budget): {err:#}",
                                op.as_str(),
                                state.retry.attempts()
                            );
                        }
                        RetryDecision::GiveUp => {
                            error!("story fetch budget exhausted: {err:#}");
                            state.fail(format!("couldn't load the story: {err}"));
                            break;
                        }
                    }
                }
            }
        }

        Ok(self.snapshot().await)
    }

    async fn install_story(&self, story: Story) {
        let chunker = TextChunker::new(&story.full_text, self.inner.config.chunk_size);

        let resumed = match self
            .inner
            .deps
            .progress
            .load(&self.inner.user_id, &self.inner.story_id)
            .await
        {
            Ok(record) => record,
            Err(err) => {
                warn!("progress load failed, starting fresh: {err:#}");
                None
            }
        };

        let mut state = self.inner.state.lock().await;

        if chunker.total_chunks() == 0 {
            state.fail(format!("story '{}' has no text", story.title));
            return;
        }

        if let Some(record) = resumed {
            if record.completed {
                // Re-reading a finished story: start over, keep the lifetime
                // accuracy as the accumulator seed.
                state.current_chunk_index = 0;
                state.words_read = 0;
                state.accuracy =
                    RunningAccuracy::seeded(record.accuracy, chunker.total_chunks() as u32);
                info!("story {} already completed, re-reading from chunk 0", story.id);
            } else {
                state.current_chunk_index = chunker.resume_index(record.words_read);
                state.words_read = record.words_read;
                state.accuracy =
                    RunningAccuracy::seeded(record.accuracy, state.current_chunk_index as u32);
                info!(
                    "resuming story {} at chunk {} ({} words read)",
                    story.id, state.current_chunk_index, state.words_read
                );
            }
        }

        state.phase = SessionPhase::Ready;
        drop(state);

        *self.inner.loaded.lock().await = Some(LoadedStory { story, chunker });
    }

    /// Starts a recording window: engine start (with retry/re-init on
    /// failure), then an event pump listening for the next speech result.
    pub async fn start_recording(&self) -> Result<SessionSnapshot> {
        {
            let state = self.inner.state.lock().await;
            if state.phase != SessionPhase::Ready {
                bail!("cannot start recording from {:?}", state.phase);
            }
        }

        loop {
            if self.is_disposed() {
                bail!("session disposed");
            }

            match self.inner.deps.voice.start(&self.inner.config.locale).await {
                Ok(events) => {
                    {
                        let mut state = self.inner.state.lock().await;
                        state.phase = SessionPhase::Recording;
                        state.feedback = None;
                    }
                    self.spawn_pump(events).await;
                    break;
                }
                Err(err) => {
                    let decision = {
                        let mut state = self.inner.state.lock().await;
                        state.retry.record_failure(FailedOperation::Voice)
                    };
                    match decision {
                        RetryDecision::Retry(op) => {
                            warn!("{} start failed, re-initializing engine: {err:#}", op.as_str());
                            if let Err(init_err) = self.inner.deps.voice.initialize().await {
                                warn!("voice engine re-init failed: {init_err:#}");
                            }
                        }
                        RetryDecision::GiveUp => {
                            error!("voice start budget exhausted: {err:#}");
                            let mut state = self.inner.state.lock().await;
                            state.fail(format!("the microphone isn't working: {err}"));
                            break;
                        }
                    }
                }
            }
        }

        Ok(self.snapshot().await)
    }

    async fn spawn_pump(&self, events: mpsc::Receiver<VoiceEvent>) {
        let mut pump_guard = self.inner.pump.lock().await;
        if let Some(old) = pump_guard.take() {
            old.cancel.cancel();
            old.handle.abort();
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(event_pump(
            self.clone(),
            events,
            cancel.clone(),
            self.inner.config.speech_wait,
        ));

        *pump_guard = Some(Pump { cancel, handle });
    }

    async fn cancel_pump(&self) {
        let pump = self.inner.pump.lock().await.take();
        if let Some(pump) = pump {
            pump.cancel.cancel();
            if let Err(err) = pump.handle.await {
                if !err.is_cancelled() {
                    warn!("event pump task failed to join: {err}");
                }
            }
        }
    }

    async fn stop_engine(&self) {
        if let Err(err) = self.inner.deps.voice.stop().await {
            warn!("voice engine stop failed: {err:#}");
        }
    }

    /// Scores one speech result against the current chunk and advances,
    /// retries, or completes. The recording window ends here either way.
    async fn handle_speech(&self, event: SpeechEvent) {
        if self.is_disposed() {
            return;
        }

        let chunk_index = {
            let mut state = self.inner.state.lock().await;
            if state.phase != SessionPhase::Recording {
                info!("dropping speech event in phase {:?}", state.phase);
                return;
            }
            state.phase = SessionPhase::Evaluating;
            state.current_chunk_index
        };

        let chunk = {
            let loaded = self.inner.loaded.lock().await;
            loaded.as_ref().and_then(|l| l.chunker.chunk_at(chunk_index))
        };

        let Some(chunk) = chunk else {
            warn!("no chunk at index {chunk_index}, returning to Ready");
            self.inner.state.lock().await.phase = SessionPhase::Ready;
            self.stop_engine().await;
            return;
        };

        let result = match_chunk(&chunk, &event.recognized_text, &self.inner.config.matching);
        info!(
            "chunk {} scored {:.2} against {:?}",
            chunk_index, result.chunk_accuracy, event.recognized_text
        );

        let record = {
            let mut state = self.inner.state.lock().await;
            if result.chunk_accuracy >= self.inner.config.pass_threshold {
                let was_last = chunk.is_last;
                state.words_read += chunk.words.len() as u64;
                state.accuracy.push(result.chunk_accuracy);
                state.feedback = None;
                if was_last {
                    state.phase = SessionPhase::Completed;
                } else {
                    state.current_chunk_index += 1;
                    state.phase = SessionPhase::Ready;
                }
                Some(self.record_from(&state, was_last))
            } else {
                // Pedagogical retry: same chunk, no budget spent, no credit.
                state.feedback = Some(Feedback::TryAgain);
                state.phase = SessionPhase::Ready;
                None
            }
        };

        self.stop_engine().await;

        if let Some(record) = record {
            if let Err(err) = self.inner.deps.progress.save(&record).await {
                // Surfaced here, not fatal to the session: the next advance
                // writes the same cumulative totals again.
                error!("local progress save failed: {err:#}");
            }
        }
    }

    fn record_from(&self, state: &SessionState, completed: bool) -> ProgressRecord {
        ProgressRecord {
            user_id: self.inner.user_id.clone(),
            story_id: self.inner.story_id.clone(),
            words_read: state.words_read,
            accuracy: state.accuracy.average(),
            completed,
            updated_at: Utc::now(),
        }
    }

    /// Bounded wait elapsed with no speech result.
    async fn on_speech_timeout(&self) {
        if self.is_disposed() {
            return;
        }
        {
            let mut state = self.inner.state.lock().await;
            if state.phase == SessionPhase::Recording {
                state.phase = SessionPhase::Ready;
                state.feedback = Some(Feedback::DidntHear);
            }
        }
        self.stop_engine().await;
        info!("no speech within the bounded wait, returning to Ready");
    }

    /// Engine-level error during a recording window. Spends the shared
    /// budget; on a granted retry the engine is re-initialized and restarted,
    /// handing back a fresh event stream for the pump.
    async fn on_engine_error(&self, mut message: String) -> Option<mpsc::Receiver<VoiceEvent>> {
        loop {
            if self.is_disposed() {
                return None;
            }

            let decision = {
                let mut state = self.inner.state.lock().await;
                state.retry.record_failure(FailedOperation::Voice)
            };

            match decision {
                RetryDecision::Retry(op) => {
                    warn!("{} engine error, restarting: {message}", op.as_str());
                    let _ = self.inner.deps.voice.stop().await;
                    if let Err(err) = self.inner.deps.voice.initialize().await {
                        message = format!("re-init failed: {err}");
                        continue;
                    }
                    match self.inner.deps.voice.start(&self.inner.config.locale).await {
                        Ok(events) => return Some(events),
                        Err(err) => {
                            message = format!("restart failed: {err}");
                            continue;
                        }
                    }
                }
                RetryDecision::GiveUp => {
                    error!("voice retry budget exhausted: {message}");
                    {
                        let mut state = self.inner.state.lock().await;
                        state.fail(format!("speech recognition failed: {message}"));
                    }
                    self.stop_engine().await;
                    return None;
                }
            }
        }
    }

    /// Ends the recording window without crediting the current chunk.
    /// Progress already committed stays committed. Only valid while a
    /// window is open.
    pub async fn stop(&self) -> Result<SessionSnapshot> {
        {
            let state = self.inner.state.lock().await;
            if !matches!(
                state.phase,
                SessionPhase::Recording | SessionPhase::Evaluating
            ) {
                bail!("no recording window to stop (phase {:?})", state.phase);
            }
        }

        self.cancel_pump().await;
        {
            let mut state = self.inner.state.lock().await;
            if matches!(
                state.phase,
                SessionPhase::Recording | SessionPhase::Evaluating
            ) {
                state.phase = SessionPhase::Ready;
            }
        }
        self.stop_engine().await;
        Ok(self.snapshot().await)
    }

    /// Debug/skip command: credits the current chunk's words without an
    /// accuracy sample and persists.
    pub async fn advance_manually(&self) -> Result<SessionSnapshot> {
        let record = {
            let loaded = self.inner.loaded.lock().await;
            let mut state = self.inner.state.lock().await;
            if state.phase != SessionPhase::Ready {
                bail!("manual advance only valid from Ready (phase {:?})", state.phase);
            }

            let chunker = &loaded.as_ref().context("no story loaded")?.chunker;
            let chunk = chunker
                .chunk_at(state.current_chunk_index)
                .context("no chunk at the current index")?;

            state.words_read += chunk.words.len() as u64;
            state.feedback = None;
            if chunk.is_last {
                state.phase = SessionPhase::Completed;
            } else {
                state.current_chunk_index += 1;
            }
            self.record_from(&state, chunk.is_last)
        };

        if let Err(err) = self.inner.deps.progress.save(&record).await {
            error!("local progress save failed: {err:#}");
        }

        Ok(self.snapshot().await)
    }

    /// Pronounces one word of the current chunk for the reader.
    /// Fire-and-forget; synthesis errors are only logged.
    pub async fn speak_word(&self, word_index: usize) -> Result<()> {
        let word = {
            let loaded = self.inner.loaded.lock().await;
            let state = self.inner.state.lock().await;
            loaded
                .as_ref()
                .and_then(|l| l.chunker.chunk_at(state.current_chunk_index))
                .and_then(|chunk| chunk.words.get(word_index).cloned())
        };

        let Some(word) = word else {
            bail!("no word at index {word_index} in the current chunk");
        };

        let tts = Arc::clone(&self.inner.deps.tts);
        tokio::spawn(async move {
            if let Err(err) = tts.speak(&word).await {
                warn!("pronunciation of '{word}' failed: {err:#}");
            }
        });

        Ok(())
    }

    /// Discards a finished session and starts the same story over with a
    /// fresh state and a full retry budget. Only valid from `Completed` or
    /// `Failed`; a live session keeps its in-memory state.
    pub async fn retry_story(&self) -> Result<SessionSnapshot> {
        {
            let state = self.inner.state.lock().await;
            if !state.phase.is_terminal() {
                bail!("cannot restart a session in progress (phase {:?})", state.phase);
            }
        }

        self.cancel_pump().await;
        self.stop_engine().await;

        {
            let mut loaded = self.inner.loaded.lock().await;
            let mut state = self.inner.state.lock().await;
            *state = SessionState::new(self.inner.config.max_attempts);
            *loaded = None;
        }

        self.begin().await
    }

    /// Teardown on navigation-away. In-flight collaborator calls are allowed
    /// to finish but their results are discarded.
    pub async fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.cancel_pump().await;
        self.stop_engine().await;
        let state = self.inner.state.lock().await;
        info!("session {} disposed in phase {:?}", state.session_id, state.phase);
    }

    /// Current state for rendering. Cheap enough to poll.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let loaded = self.inner.loaded.lock().await;
        let state = self.inner.state.lock().await;

        let (story_title, total_chunks, chunk_words) = match loaded.as_ref() {
            Some(l) => (
                Some(l.story.title.clone()),
                l.chunker.total_chunks(),
                l.chunker
                    .chunk_at(state.current_chunk_index)
                    .map(|c| c.words)
                    .unwrap_or_default(),
            ),
            None => (None, 0, Vec::new()),
        };

        SessionSnapshot {
            session_id: state.session_id.clone(),
            user_id: self.inner.user_id.clone(),
            story_id: self.inner.story_id.clone(),
            story_title,
            phase: state.phase,
            current_chunk_index: state.current_chunk_index,
            total_chunks,
            chunk_words,
            words_read: state.words_read,
            running_accuracy: state.accuracy.average(),
            retry_attempts: state.retry.attempts(),
            feedback: state.feedback,
            last_error: state.last_error.clone(),
        }
    }
}

/// Listens on one recording window's event stream. Exits when a speech
/// result has been evaluated, the bounded wait elapses, the stream closes,
/// or the controller cancels it.
async fn event_pump(
    controller: SessionController,
    mut events: mpsc::Receiver<VoiceEvent>,
    cancel: CancellationToken,
    speech_wait: Duration,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = tokio::time::timeout(speech_wait, events.recv()) => match received {
                Err(_elapsed) => {
                    controller.on_speech_timeout().await;
                    break;
                }
                Ok(None) => {
                    info!("voice event stream closed");
                    break;
                }
                Ok(Some(VoiceEvent::Speech(event))) => {
                    controller.handle_speech(event).await;
                    break;
                }
                Ok(Some(VoiceEvent::Error(message))) => {
                    match controller.on_engine_error(message).await {
                        Some(new_events) => events = new_events,
                        None => break,
                    }
                }
            },
        }
    }
}
