mod common;

#[cfg(test)]
mod tests {
    use crate::common::{four_kicks, init_logging};
    use crossbeam::channel;
    use midistep::midi::{decode, MidiMessage, MockMidiEngine};
    use midistep::midi_output::{run_midi_output_thread, TimedMessage};
    use midistep::{
        extract, DrumVoice, ManualClock, ManualTimer, PatternPlayer, PatternSlot, PlayerConfig,
        Scheduler, SchedulerConfig, StepEvent,
    };
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn kick_on(time: f64) -> TimedMessage {
        TimedMessage::new(
            time,
            MidiMessage::NoteOn {
                channel: 9,
                note: 36,
                velocity: 100,
            },
        )
    }

    #[test]
    fn test_decoded_file_plays_kicks_on_time() {
        init_logging();
        let pattern = extract(&decode(&four_kicks()).unwrap(), 16, 0.0);
        let clock = ManualClock::new();
        let timer = ManualTimer::new();
        let (tx, rx) = channel::unbounded();
        let (steps_tx, steps_rx) = channel::unbounded();

        let slot = PatternSlot::new(pattern);
        let player =
            PatternPlayer::new(slot.clone(), tx, PlayerConfig::default()).with_step_events(steps_tx);
        let scheduler = Scheduler::new(
            clock.clone(),
            Arc::new(timer.clone()),
            slot,
            player,
            SchedulerConfig::default(),
        );

        scheduler.start();
        clock.set(0.4);
        timer.fire();

        let note_ons: Vec<TimedMessage> = rx
            .try_iter()
            .filter(|m| matches!(m.message, MidiMessage::NoteOn { .. }))
            .collect();
        assert_eq!(
            note_ons,
            vec![kick_on(0.0), kick_on(0.125), kick_on(0.25), kick_on(0.375)]
        );
        let reported: Vec<usize> = steps_rx.try_iter().map(|e: StepEvent| e.step).collect();
        assert_eq!(reported, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_edits_are_heard_from_next_step() {
        let clock = ManualClock::new();
        let timer = ManualTimer::new();
        let (tx, rx) = channel::unbounded();
        let slot = PatternSlot::default();
        let player = PatternPlayer::new(slot.clone(), tx, PlayerConfig::default());
        let scheduler = Scheduler::new(
            clock.clone(),
            Arc::new(timer.clone()),
            slot.clone(),
            player,
            SchedulerConfig::default(),
        );

        scheduler.start();
        assert!(rx.try_recv().is_err());

        slot.update(|p| p.toggle_drum(DrumVoice::Snare, 1));
        clock.set(0.05);
        timer.fire();

        let messages: Vec<MidiMessage> = rx.try_iter().map(|m| m.message).collect();
        assert_eq!(
            messages,
            vec![
                MidiMessage::NoteOn { channel: 9, note: 38, velocity: 100 },
                MidiMessage::NoteOff { channel: 9, note: 38, velocity: 0 },
            ]
        );
    }

    #[test]
    fn test_player_through_output_thread() {
        let clock = ManualClock::new();
        let timer = ManualTimer::new();
        let engine = MockMidiEngine::new();
        let (tx, rx) = channel::unbounded();
        let output = run_midi_output_thread(rx, engine.clone(), clock.clone());

        let mut pattern = midistep::StepPattern::default();
        pattern.basic_beat();
        let slot = PatternSlot::new(pattern);
        let player = PatternPlayer::new(slot.clone(), tx, PlayerConfig::default());
        let scheduler = Scheduler::new(
            clock.clone(),
            Arc::new(timer.clone()),
            slot,
            player,
            SchedulerConfig::default(),
        );

        scheduler.start();
        thread::sleep(Duration::from_millis(30));
        // Step 0: kick and hi-hat note-ons are due, their note-offs are not
        let sent = engine.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| !m.is_note_off()));

        scheduler.stop();
        drop(scheduler);
        output.join().unwrap();

        // Closing the queue flushes the outstanding note-offs
        let sent = engine.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent.iter().filter(|m| m.is_note_off()).count(), 2);
    }
}
