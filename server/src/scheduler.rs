//! Round pacing: wait until enough players are ready, then play rounds at a
//! fixed rate until the game ends.

use crate::event_log::DatagramSink;
use crate::network::ServerState;
use crate::ServerError;
use log::debug;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep_until, Duration, Instant};

/// Deadline of the current round. Each round gets a full period from its own
/// start, so overruns are not made up later.
#[derive(Debug, Clone)]
pub struct RoundTimer {
    period: Duration,
    deadline: Instant,
}

impl RoundTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: Instant::now(),
        }
    }

    pub fn begin_round(&mut self) {
        self.deadline = Instant::now() + self.period;
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub async fn wait_for_deadline(&self) {
        sleep_until(self.deadline).await;
    }
}

/// Returns once a game can start. `wakeup` is signalled by the listener.
pub async fn wait_for_players(state: &Mutex<ServerState>, wakeup: &Notify) {
    loop {
        if state.lock().await.ready_to_start() {
            return;
        }
        wakeup.notified().await;
    }
}

/// Starts a game and plays it to the end.
///
/// Does nothing if the players stopped being ready since the last check.
pub async fn play_game<S: DatagramSink + ?Sized>(
    state: &Mutex<ServerState>,
    sink: &S,
    period: Duration,
) -> Result<(), ServerError> {
    let mut timer = RoundTimer::new(period);
    timer.begin_round();
    let mut playing = {
        let mut state = state.lock().await;
        if !state.ready_to_start() {
            debug!("Start condition no longer holds, waiting again");
            return Ok(());
        }
        state.start_game(sink)?
    };
    let mut rounds = 0u64;

    while playing {
        timer.wait_for_deadline().await;
        timer.begin_round();
        playing = state.lock().await.play_round(sink, Instant::now())?;
        rounds += 1;
    }
    debug!("Game finished after {} rounds", rounds);
    Ok(())
}

/// Plays games forever.
pub async fn run<S>(
    state: Arc<Mutex<ServerState>>,
    sink: Arc<S>,
    wakeup: Arc<Notify>,
    period: Duration,
) -> Result<(), ServerError>
where
    S: DatagramSink + Send + Sync + ?Sized,
{
    loop {
        wait_for_players(&state, &wakeup).await;
        play_game(&state, sink.as_ref(), period).await?;
    }
}
