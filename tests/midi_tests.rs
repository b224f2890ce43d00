mod common;

#[cfg(test)]
mod tests {
    use crate::common::{four_kicks, init_logging, smf, TrackBuilder};
    use midistep::midi::{
        decode, decode_file, read_varlen, Division, EventKind, FormatError, META_TEMPO,
    };

    #[test]
    fn test_varlen_examples() {
        assert_eq!(read_varlen(&[0x81, 0x00]), Ok(128));
        assert_eq!(read_varlen(&[0x00]), Ok(0));
        assert_eq!(read_varlen(&[0xFF, 0x7F]), Ok(16383));
    }

    #[test]
    fn test_decode_four_kicks() {
        init_logging();
        let document = decode(&four_kicks()).unwrap();
        assert_eq!(document.format, 1);
        assert_eq!(document.division, Division::TicksPerQuarter(480));
        assert_eq!(document.tracks.len(), 2);

        let conductor = &document.tracks[0].events;
        match &conductor[0].kind {
            EventKind::Meta(meta) => {
                assert_eq!(meta.meta_type, META_TEMPO);
                assert_eq!(meta.tempo, Some(500_000));
                assert_eq!(meta.tempo_bpm(), Some(120.0));
            }
            other => panic!("expected tempo meta, got {:?}", other),
        }

        let ticks: Vec<u64> = document.tracks[1]
            .timed_events()
            .filter(|(_, e)| e.is_note_on())
            .map(|(tick, _)| tick)
            .collect();
        assert_eq!(ticks, vec![0, 120, 240, 360]);
        assert!(document.tracks[1].events.iter().take(4).all(|e| e.channel == 9));
    }

    #[test]
    fn test_running_status_across_builder_events() {
        // Second note has no status byte
        let track = TrackBuilder::new()
            .note_on(0, 3, 40, 90)
            .raw(10, &[43, 80])
            .raw(10, &[43, 0])
            .into_bytes();
        let document = decode(&smf(0, 96, vec![track])).unwrap();
        let kinds: Vec<&EventKind> = document.tracks[0].events.iter().map(|e| &e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &EventKind::NoteOn { note: 40, velocity: 90 },
                &EventKind::NoteOn { note: 43, velocity: 80 },
                &EventKind::NoteOff { note: 43, velocity: 0 },
            ]
        );
        assert!(document.tracks[0].events.iter().all(|e| e.channel == 3));
    }

    #[test]
    fn test_smpte_division_falls_back() {
        let document = decode(&smf(0, 0xE728, vec![TrackBuilder::new().into_bytes()])).unwrap();
        assert!(document.division.is_smpte());
        assert_eq!(document.ticks_per_quarter(), 480);
    }

    #[test]
    fn test_unknown_status_does_not_stop_decoding() {
        init_logging();
        // 0xA3 is polyphonic aftertouch, which the decoder does not model
        let track = TrackBuilder::new()
            .raw(0, &[0xA3])
            .raw(0, &[0x93, 60, 100])
            .into_bytes();
        let document = decode(&smf(0, 480, vec![track])).unwrap();
        let events = &document.tracks[0].events;
        assert_eq!(events[0].kind, EventKind::Other { status: 0xA3 });
        assert_eq!(events[1].kind, EventKind::NoteOn { note: 60, velocity: 100 });
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let bytes = four_kicks();
        let result = decode(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(FormatError::Truncated { .. })));
    }

    #[test]
    fn test_five_byte_delta_is_rejected() {
        let track = vec![0x81, 0x80, 0x80, 0x80, 0x00, 0x90, 0x24, 0x64];
        let result = decode(&smf(0, 480, vec![track]));
        assert!(matches!(result, Err(FormatError::VarLenTooLong { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("midistep-missing-file.mid");
        assert!(matches!(decode_file(&path), Err(FormatError::Io(_))));
    }
}
