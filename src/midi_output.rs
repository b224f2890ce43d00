use crate::clock::AudioClock;
use crate::midi::{MidiEngine, MidiMessage};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// Upper bound on how long the output thread sleeps between clock checks
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A message to send once the audio clock reaches `time`
#[derive(Debug, Clone, PartialEq)]
pub struct TimedMessage {
    pub time: f64,
    pub message: MidiMessage,
}

impl TimedMessage {
    pub fn new(time: f64, message: MidiMessage) -> Self {
        Self { time, message }
    }
}

struct Queued {
    time: f64,
    seq: u64,
    message: MidiMessage,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Reversed so the BinaryHeap yields the earliest message first;
    // messages with equal times keep their arrival order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Messages waiting for their send time, earliest first
#[derive(Default)]
pub struct OutputQueue {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, timed: TimedMessage) {
        self.heap.push(Queued {
            time: timed.time,
            seq: self.next_seq,
            message: timed.message,
        });
        self.next_seq += 1;
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn next_time(&self) -> Option<f64> {
        self.heap.peek().map(|q| q.time)
    }

    /// Removes and returns every message due at or before `now`
    pub fn drain_due(&mut self, now: f64) -> Vec<TimedMessage> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|q| q.time <= now) {
            if let Some(q) = self.heap.pop() {
                due.push(TimedMessage::new(q.time, q.message));
            }
        }
        due
    }

    /// Empties the queue, keeping only the note-offs so nothing is left
    /// sounding
    pub fn drain_note_offs(&mut self) -> Vec<MidiMessage> {
        let mut offs = Vec::new();
        while let Some(q) = self.heap.pop() {
            if q.message.is_note_off() {
                offs.push(q.message);
            }
        }
        offs
    }
}

fn send_message<E: MidiEngine>(engine: &mut E, message: MidiMessage) {
    if let Err(e) = engine.send(message) {
        error!("Failed to send MIDI message: {}", e);
    }
}

fn process_midi_messages<E, C>(rx: Receiver<TimedMessage>, engine: &mut E, clock: &C)
where
    E: MidiEngine,
    C: AudioClock,
{
    let mut queue = OutputQueue::new();

    loop {
        for timed in queue.drain_due(clock.now()) {
            send_message(engine, timed.message);
        }

        let wait = match queue.next_time() {
            Some(time) => {
                let ahead = (time - clock.now()).max(0.0);
                Duration::from_secs_f64(ahead).min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };

        match rx.recv_timeout(wait) {
            Ok(timed) => queue.push(timed),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let pending = queue.len();
    let offs = queue.drain_note_offs();
    debug!(
        "Flushing {} note-offs, dropping {} unsent messages",
        offs.len(),
        pending - offs.len()
    );
    for message in offs {
        send_message(engine, message);
    }
}

/// Spawns the thread that delivers timed messages to `engine`.
///
/// The thread runs until every sender of `rx` is dropped.
pub fn run_midi_output_thread<E, C>(
    rx: Receiver<TimedMessage>,
    mut engine: E,
    clock: C,
) -> JoinHandle<()>
where
    E: MidiEngine + 'static,
    C: AudioClock,
{
    thread::spawn(move || {
        info!("MIDI output thread started");
        process_midi_messages(rx, &mut engine, &clock);
        info!("MIDI output thread stopping");
    })
}
