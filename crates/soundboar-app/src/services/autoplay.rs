//! Continues with the next playlist slot when a file finishes.

use soundboar_core::Event;
use soundboar_player::{EventStream, SharedPlayer};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Watch `events` and advance the player whenever the current file has
/// ended. The task finishes when the event stream does.
pub fn spawn(player: SharedPlayer, events: EventStream) -> JoinHandle<()> {
    tokio::spawn(run(player, events))
}

async fn run(player: SharedPlayer, mut events: EventStream) {
    debug!("Autoplay started");
    while let Some(event) = events.next().await {
        if event != Event::StateChange {
            continue;
        }
        let mut player = player.lock();
        if player.advance_on_end() {
            info!("Advanced to slot {:?}", player.index());
        }
    }
    debug!("Autoplay stopped");
}
