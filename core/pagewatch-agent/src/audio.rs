//! Completion sound cue.
//!
//! Playback happens on a dedicated thread holding the non-Send audio
//! objects, and is cut off after a fixed duration regardless of clip
//! length. Any failure (no output device, missing or undecodable clip) is
//! logged and swallowed.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, Sink, Source};
use tracing::warn;

pub fn play_cue(path: PathBuf, max: Duration) {
    let spawned = thread::Builder::new()
        .name("cue-player".to_string())
        .spawn(move || {
            if let Err(err) = play_blocking(&path, max) {
                warn!(error = %err, path = %path.display(), "Sound playback failed");
            }
        });
    if let Err(err) = spawned {
        warn!(error = %err, "Failed to spawn cue player thread");
    }
}

fn play_blocking(path: &PathBuf, max: Duration) -> Result<(), String> {
    let (_stream, handle) = OutputStream::try_default()
        .map_err(|err| format!("failed to open audio output: {}", err))?;
    let sink =
        Sink::try_new(&handle).map_err(|err| format!("failed to create audio sink: {}", err))?;

    let file = File::open(path).map_err(|err| format!("failed to open sound clip: {}", err))?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|err| format!("failed to decode sound clip: {}", err))?;

    sink.append(source.take_duration(max));
    sink.sleep_until_end();
    Ok(())
}
