//! Simulated streaming: reveals an already-complete reply a few graphemes at
//! a time on a fixed tick.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use unicode_segmentation::UnicodeSegmentation;

/// Progress of one reveal. Every event carries the reveal id so a receiver
/// can drop events from a reveal it has already moved past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    Progress { reveal_id: u64, revealed: String },
    /// The full text is visible. Sent at most once per reveal.
    Completed { reveal_id: u64, text: String },
    /// `stop()` ended the reveal early; `text` is the committed prefix.
    Stopped { reveal_id: u64, text: String },
}

impl RevealEvent {
    pub fn reveal_id(&self) -> u64 {
        match self {
            RevealEvent::Progress { reveal_id, .. }
            | RevealEvent::Completed { reveal_id, .. }
            | RevealEvent::Stopped { reveal_id, .. } => *reveal_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Revealing,
    Completed,
    Stopped,
}

#[derive(Debug)]
struct RevealState {
    /// Byte offset just past each grapheme.
    boundaries: Vec<usize>,
    shown: usize,
    phase: Phase,
}

impl RevealState {
    fn revealed_len(&self) -> usize {
        match self.shown {
            0 => 0,
            n => self.boundaries[n - 1],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypingController {
    reveal_id: u64,
    full_text: Arc<str>,
    chunk: usize,
    state: Arc<Mutex<RevealState>>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<RevealEvent>,
}

impl TypingController {
    /// A controller that only moves when [`advance`](Self::advance) is called.
    pub fn new(
        reveal_id: u64,
        full_text: &str,
        chunk: usize,
        events: mpsc::UnboundedSender<RevealEvent>,
    ) -> Self {
        let boundaries = full_text
            .grapheme_indices(true)
            .map(|(offset, grapheme)| offset + grapheme.len())
            .collect();
        Self {
            reveal_id,
            full_text: Arc::from(full_text),
            chunk: chunk.max(1),
            state: Arc::new(Mutex::new(RevealState {
                boundaries,
                shown: 0,
                phase: Phase::Revealing,
            })),
            cancel: CancellationToken::new(),
            events,
        }
    }

    /// Starts revealing on a background tick.
    pub fn start(
        reveal_id: u64,
        full_text: &str,
        chunk: usize,
        interval: Duration,
        events: mpsc::UnboundedSender<RevealEvent>,
    ) -> Self {
        let controller = Self::new(reveal_id, full_text, chunk, events);
        controller.run(interval);
        controller
    }

    /// Drives this controller from a background tick until it ends.
    pub fn run(&self, interval: Duration) {
        let ticker = self.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            // The first tick of a tokio interval fires immediately.
            ticks.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.cancel.cancelled() => break,
                    _ = ticks.tick() => {
                        if !ticker.advance() {
                            break;
                        }
                    }
                }
            }
        });
    }

    pub fn reveal_id(&self) -> u64 {
        self.reveal_id
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    fn lock(&self) -> MutexGuard<'_, RevealState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reveals the next chunk. Returns false once the reveal has ended, by
    /// completion or by `stop()`; nothing more is revealed after that.
    pub fn advance(&self) -> bool {
        self.advance_by(self.chunk)
    }

    /// Reveals everything at once, signalling completion if still active.
    pub fn finish(&self) {
        self.advance_by(usize::MAX);
    }

    fn advance_by(&self, graphemes: usize) -> bool {
        let mut state = self.lock();
        if state.phase != Phase::Revealing {
            return false;
        }

        state.shown = state
            .shown
            .saturating_add(graphemes)
            .min(state.boundaries.len());
        let revealed = self.full_text[..state.revealed_len()].to_string();

        if state.shown == state.boundaries.len() {
            state.phase = Phase::Completed;
            self.cancel.cancel();
            let _ = self.events.send(RevealEvent::Completed {
                reveal_id: self.reveal_id,
                text: revealed,
            });
            false
        } else {
            let _ = self.events.send(RevealEvent::Progress {
                reveal_id: self.reveal_id,
                revealed,
            });
            true
        }
    }

    /// The text visible right now; always a prefix of the full text.
    pub fn revealed(&self) -> String {
        let state = self.lock();
        self.full_text[..state.revealed_len()].to_string()
    }

    pub fn is_active(&self) -> bool {
        self.lock().phase == Phase::Revealing
    }

    pub fn is_completed(&self) -> bool {
        self.lock().phase == Phase::Completed
    }

    /// Halts the reveal and returns what was visible at that instant.
    ///
    /// Repeated calls return the same text. `Stopped` is sent only by the
    /// call that actually interrupts an active reveal; stopping a finished
    /// reveal returns the full text without signalling.
    pub fn stop(&self) -> String {
        self.cancel.cancel();
        let mut state = self.lock();
        let revealed = self.full_text[..state.revealed_len()].to_string();
        if state.phase == Phase::Revealing {
            state.phase = Phase::Stopped;
            let _ = self.events.send(RevealEvent::Stopped {
                reveal_id: self.reveal_id,
                text: revealed.clone(),
            });
        }
        revealed
    }
}
