//! Leading-edge debounce.
//!
//! The first trigger in a quiet period runs immediately and opens a window. Triggers
//! landing inside the window are folded into one trailing run when it closes, and
//! that run opens the next window. Only the most recent trigger's job survives.

use std::{future::Future, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{sleep_until, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Leading,
    Trailing,
}

type Job = Box<dyn FnOnce(Edge) -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct DebounceState {
    window_ends_at: Option<Instant>,
    trailing: Option<Job>,
}

pub struct Debounce {
    window: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Runs `job` now on a leading edge and returns its handle; otherwise schedules it
    /// as the window's trailing run, replacing any job already waiting, and returns `None`.
    pub async fn trigger<F, Fut>(&self, job: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Edge) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job: Job = Box::new(move |edge| Box::pin(job(edge)));
        let now = Instant::now();
        let mut state = self.state.lock().await;

        match state.window_ends_at {
            Some(ends_at) if now < ends_at => {
                let armed = state.trailing.is_some();
                state.trailing = Some(job);
                if !armed {
                    self.arm_trailing(ends_at);
                }
                None
            }
            _ => {
                state.window_ends_at = Some(now + self.window);
                state.trailing = None;
                drop(state);
                Some(tokio::spawn(job(Edge::Leading)))
            }
        }
    }

    fn arm_trailing(&self, ends_at: Instant) {
        let state = Arc::clone(&self.state);
        let window = self.window;
        tokio::spawn(async move {
            sleep_until(ends_at).await;
            let job = {
                let mut guard = state.lock().await;
                // A leading edge already replaced the window this run was armed for.
                if guard.window_ends_at != Some(ends_at) {
                    return;
                }
                let job = guard.trailing.take();
                if job.is_some() {
                    guard.window_ends_at = Some(Instant::now() + window);
                }
                job
            };
            if let Some(job) = job {
                job(Edge::Trailing).await;
            }
        });
    }
}
