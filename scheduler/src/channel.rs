// channel.rs
//
// Internal Work Channel (C4): a single MPSC channel carrying schedule_ids that need their
// next firing (re-)computed and upserted into the time index. The refill loop, the control
// listener, and the dispatch loop's post-handoff step all hold a `Sender`; the consumer loop
// holds the sole `Receiver`. Dropping every `Sender` closes the channel, which the consumer
// loop treats as its shutdown signal.

use std::sync::mpsc::{self, Receiver, Sender};

pub fn make_channel() -> (Sender<String>, Receiver<String>) {
	mpsc::channel()
}
