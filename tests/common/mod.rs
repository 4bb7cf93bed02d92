//! Mock collaborators and helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use readalong_core::{
    ProgressRecord, ProgressStore, RemoteProgressSink, SessionController, SessionPhase,
    SessionSnapshot, SpeechEvent, Story, StoryFetcher, TextToSpeech, VoiceEngine, VoiceEvent,
};

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn story(id: &str, title: &str, text: &str) -> Story {
    Story {
        id: id.into(),
        title: title.into(),
        full_text: text.into(),
    }
}

/// Story backend that fails a scripted number of times before serving.
pub struct ScriptedStories {
    story: Story,
    failures_left: AtomicU32,
    pub fetches: AtomicU32,
}

impl ScriptedStories {
    pub fn serving(story: Story) -> Arc<Self> {
        Self::failing(story, 0)
    }

    pub fn failing(story: Story, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            story,
            failures_left: AtomicU32::new(failures),
            fetches: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl StoryFetcher for ScriptedStories {
    async fn fetch_story(&self, story_id: &str) -> Result<Story> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            bail!("story backend unreachable");
        }
        if story_id != self.story.id {
            bail!("unknown story {story_id}");
        }
        Ok(self.story.clone())
    }
}

/// What one `start()` call should do.
pub enum VoiceScript {
    FailStart,
    /// Deliver these events, then keep the stream open.
    Events(Vec<VoiceEvent>),
    /// Open stream, no events (exercises the bounded wait).
    Silence,
}

/// Voice engine driven by a queue of scripted start outcomes.
pub struct ScriptedVoice {
    script: Mutex<VecDeque<VoiceScript>>,
    held_senders: Mutex<Vec<mpsc::Sender<VoiceEvent>>>,
    pub starts: AtomicU32,
    pub stops: AtomicU32,
    pub inits: AtomicU32,
}

impl ScriptedVoice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            held_senders: Mutex::new(Vec::new()),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
            inits: AtomicU32::new(0),
        })
    }

    pub fn push(&self, entry: VoiceScript) {
        self.script.lock().unwrap().push_back(entry);
    }

    pub fn speech(text: &str) -> VoiceEvent {
        VoiceEvent::Speech(SpeechEvent {
            recognized_text: text.into(),
            timestamp: Utc::now(),
        })
    }

    /// Pushes an event into every stream handed out so far. Delivery to a
    /// torn-down window is allowed to fail silently.
    pub fn send_late(&self, event: VoiceEvent) {
        for sender in self.held_senders.lock().unwrap().iter() {
            let _ = sender.try_send(event.clone());
        }
    }
}

#[async_trait]
impl VoiceEngine for ScriptedVoice {
    async fn initialize(&self) -> Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&self, _locale: &str) -> Result<mpsc::Receiver<VoiceEvent>> {
        self.starts.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(VoiceScript::FailStart) => bail!("engine refused to start"),
            Some(VoiceScript::Events(events)) => {
                let (tx, rx) = mpsc::channel(events.len().max(1));
                for event in events {
                    tx.try_send(event).expect("scripted channel overflow");
                }
                self.held_senders.lock().unwrap().push(tx);
                Ok(rx)
            }
            Some(VoiceScript::Silence) | None => {
                let (tx, rx) = mpsc::channel(1);
                self.held_senders.lock().unwrap().push(tx);
                Ok(rx)
            }
        }
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory remote progress backend with switchable failure modes.
/// Upserts keep the newer row, as the sink contract requires.
pub struct MemoryRemote {
    rows: Mutex<HashMap<(String, String), ProgressRecord>>,
    pub fail_gets: AtomicBool,
    pub fail_upserts: AtomicBool,
    pub gets: AtomicU32,
    pub upserts: AtomicU32,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(HashMap::new()),
            fail_gets: AtomicBool::new(false),
            fail_upserts: AtomicBool::new(false),
            gets: AtomicU32::new(0),
            upserts: AtomicU32::new(0),
        })
    }

    pub fn seed(&self, record: ProgressRecord) {
        self.rows.lock().unwrap().insert(
            (record.user_id.clone(), record.story_id.clone()),
            record,
        );
    }

    pub fn row(&self, user_id: &str, story_id: &str) -> Option<ProgressRecord> {
        self.rows
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), story_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl RemoteProgressSink for MemoryRemote {
    async fn get(&self, user_id: &str, story_id: &str) -> Result<Option<ProgressRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            bail!("remote store unreachable");
        }
        Ok(self.row(user_id, story_id))
    }

    async fn upsert(&self, record: &ProgressRecord) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_upserts.load(Ordering::SeqCst) {
            bail!("remote store unreachable");
        }

        let mut rows = self.rows.lock().unwrap();
        let key = (record.user_id.clone(), record.story_id.clone());
        match rows.get(&key) {
            Some(existing) if existing.is_newer_than(record) => {}
            _ => {
                rows.insert(key, record.clone());
            }
        }
        Ok(())
    }
}

/// Text-to-speech that remembers what it was asked to say.
pub struct RecordingTts {
    pub spoken: Mutex<Vec<String>>,
}

impl RecordingTts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            spoken: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextToSpeech for RecordingTts {
    async fn speak(&self, word: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(word.to_string());
        Ok(())
    }
}

/// Polls until the session settles in `phase`, panicking after ~2 s.
pub async fn wait_for_phase(
    controller: &SessionController,
    phase: SessionPhase,
) -> SessionSnapshot {
    let mut last = controller.snapshot().await;
    for _ in 0..400 {
        if last.phase == phase {
            return last;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        last = controller.snapshot().await;
    }
    panic!("timed out waiting for {phase:?}, session stuck in {:?}", last.phase);
}

/// Polls until the session is out of Recording/Evaluating.
pub async fn wait_until_settled(controller: &SessionController) -> SessionSnapshot {
    let mut last = controller.snapshot().await;
    for _ in 0..400 {
        if !matches!(
            last.phase,
            SessionPhase::Recording | SessionPhase::Evaluating
        ) {
            return last;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        last = controller.snapshot().await;
    }
    panic!("recording window never settled, stuck in {:?}", last.phase);
}

/// Reads the currently displayed chunk back verbatim and waits for the
/// controller to evaluate it.
pub async fn read_current_chunk(
    controller: &SessionController,
    voice: &ScriptedVoice,
) -> SessionSnapshot {
    let snap = controller.snapshot().await;
    let text = snap.chunk_words.join(" ");
    voice.push(VoiceScript::Events(vec![ScriptedVoice::speech(&text)]));
    controller.start_recording().await.expect("start_recording");
    wait_until_settled(controller).await
}

pub fn cache_and_store(
    dir: &tempfile::TempDir,
    remote: Arc<MemoryRemote>,
) -> (readalong_core::CacheDb, ProgressStore) {
    let cache =
        readalong_core::CacheDb::new(dir.path().join("cache.sqlite3")).expect("cache db");
    (cache.clone(), ProgressStore::new(cache, remote))
}
