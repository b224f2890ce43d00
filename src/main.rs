use clap::Parser;
use crossbeam::channel;
use midistep::{
    cli::{choose_device, handle_device_list, Args},
    logging,
    midi::{decode_file, MidiDocument, MidirEngine},
    midi_output::run_midi_output_thread,
    pattern::{extract, DocumentMetadata, StepPattern},
    ui::StepProgress,
    AudioClock, MonotonicClock, PatternPlayer, PatternSlot, Scheduler, Settings, ThreadTimer,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    initialize_logging();
    let args = Args::parse();

    if args.device_list {
        list_available_devices(&handle_device_list());
        return;
    }

    let settings = load_settings(&args);
    let Some(path) = args.file.as_deref() else {
        exit_with_error("Error: No MIDI file given");
    };

    let document = load_document(path);
    let mut pattern = extract(&document, settings.quantize, settings.swing_fraction());
    if let Some(bpm) = args.bpm {
        log::info!("Tempo overridden to {} BPM", bpm);
        pattern.set_tempo(bpm);
    }

    if args.json {
        print_json(&pattern);
    } else {
        print_summary(&document, &pattern, &settings);
        println!("{}", pattern);
    }

    if args.play {
        play(pattern, &settings, args.loops);
    }
}

fn initialize_logging() {
    if let Err(e) = logging::init_logger() {
        eprintln!("Warning: logging disabled: {}", e);
    }
    log::info!("Application starting");
}

fn exit_with_error(message: &str) -> ! {
    log::error!("{}", message);
    eprintln!("{}", message);
    std::process::exit(1);
}

fn load_settings(args: &Args) -> Settings {
    let mut settings = Settings::load(args.config.as_deref())
        .unwrap_or_else(|e| exit_with_error(&format!("Error loading settings: {}", e)));
    args.apply_to(&mut settings);
    if let Err(e) = settings.validate() {
        exit_with_error(&format!("Error: {}", e));
    }
    settings
}

fn load_document(path: &Path) -> MidiDocument {
    decode_file(path).unwrap_or_else(|e| {
        exit_with_error(&format!("Error reading {}: {}", path.display(), e))
    })
}

fn list_available_devices(devices: &[String]) {
    println!("Available MIDI devices:");
    for device in devices {
        println!("  - {}", device);
    }
}

fn print_json(pattern: &StepPattern) {
    match serde_json::to_string_pretty(pattern) {
        Ok(json) => println!("{}", json),
        Err(e) => exit_with_error(&format!("Error serializing pattern: {}", e)),
    }
}

fn print_summary(document: &MidiDocument, pattern: &StepPattern, settings: &Settings) {
    let metadata = DocumentMetadata::scan(document);
    let resolution = if document.division.is_smpte() {
        "SMPTE".to_string()
    } else {
        format!("{} PPQ", metadata.ticks_per_quarter)
    };
    println!(
        "{} tracks, {}, {}/{}, {} BPM, {} steps ({} bars), quantize {}",
        document.tracks.len(),
        resolution,
        metadata.time_signature.numerator,
        metadata.time_signature.denominator,
        pattern.tempo(),
        pattern.length(),
        pattern.bars(),
        settings.quantize
    );
    if metadata.tempos.len() > 1 {
        for tempo in &metadata.tempos {
            println!("  tempo {:.1} BPM at tick {}", tempo.bpm(), tempo.absolute_tick);
        }
    }
}

fn play(pattern: StepPattern, settings: &Settings, loops: u32) {
    let devices = handle_device_list();
    let device = choose_device(settings.midi_output.as_deref(), &devices)
        .unwrap_or_else(|e| exit_with_error(&e));
    let engine = MidirEngine::new(Some(&device)).unwrap_or_else(|e| {
        exit_with_error(&format!("Error connecting to MIDI device: {}", e))
    });
    println!("Playing on {}", engine.port_name());

    let clock = MonotonicClock::new();
    let (output_tx, output_rx) = channel::unbounded();
    let output = run_midi_output_thread(output_rx, engine, clock.clone());

    let (step_tx, step_rx) = channel::unbounded();
    let length = pattern.length();
    let slot = PatternSlot::new(pattern);
    let player =
        PatternPlayer::new(slot.clone(), output_tx, settings.player_config()).with_step_events(step_tx);
    let scheduler = Scheduler::new(
        clock.clone(),
        Arc::new(ThreadTimer::new()),
        slot,
        player,
        settings.scheduler_config(),
    );

    let mut progress = StepProgress::new(length, loops);
    scheduler.start();

    // Steps are reported ahead of time; show each one when it sounds
    while let Ok(event) = step_rx.recv() {
        let ahead = event.time - clock.now();
        if ahead > 0.0 {
            thread::sleep(Duration::from_secs_f64(ahead));
        }
        if progress.on_step(event.step) >= u64::from(loops) {
            break;
        }
    }

    scheduler.stop();
    progress.finish();
    // Let the final step's note-ons reach the device before the queue closes
    thread::sleep(Duration::from_millis(10));
    drop(scheduler);

    if output.join().is_err() {
        log::error!("MIDI output thread panicked");
    }
    log::info!("Playback finished after {} loops", progress.loops_done());
}
