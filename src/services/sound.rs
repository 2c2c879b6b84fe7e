//! Completion sound playback

use std::{
    collections::HashMap,
    io::Write,
    path::PathBuf,
    process::Stdio,
    sync::Mutex,
};

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::state::Sound;

pub trait SoundPlayer: Send + Sync {
    fn play(&self, sound: Sound);
    fn stop(&self, sound: Sound);
}

/// Plays `<sounds_dir>/<sound>.wav` through `paplay`, falling back to the
/// terminal bell when the file or a runtime is missing.
#[derive(Debug, Default)]
pub struct CommandSoundPlayer {
    sounds_dir: Option<PathBuf>,
    playing: Mutex<HashMap<Sound, Child>>,
}

impl CommandSoundPlayer {
    pub fn new(sounds_dir: Option<PathBuf>) -> Self {
        Self {
            sounds_dir,
            playing: Mutex::new(HashMap::new()),
        }
    }

    fn ring_bell(&self) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

impl SoundPlayer for CommandSoundPlayer {
    fn play(&self, sound: Sound) {
        let file = self
            .sounds_dir
            .as_ref()
            .map(|dir| dir.join(sound.file_name()))
            .filter(|path| path.is_file());

        let Some(file) = file else {
            debug!("No sound file for {}, ringing bell", sound);
            self.ring_bell();
            return;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            self.ring_bell();
            return;
        }

        self.stop(sound);
        match Command::new("paplay")
            .arg(&file)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => {
                debug!("Playing {}", file.display());
                if let Ok(mut playing) = self.playing.lock() {
                    playing.insert(sound, child);
                }
            }
            Err(e) => {
                warn!("Failed to play {}: {}", file.display(), e);
                self.ring_bell();
            }
        }
    }

    fn stop(&self, sound: Sound) {
        let child = self.playing.lock().ok().and_then(|mut p| p.remove(&sound));
        if let Some(mut child) = child {
            if let Err(e) = child.start_kill() {
                debug!("Sound {} already stopped: {}", sound, e);
            }
        }
    }
}

/// Records playback requests instead of producing audio
#[derive(Debug, Default)]
pub struct MemorySoundPlayer {
    played: Mutex<Vec<Sound>>,
    stopped: Mutex<Vec<Sound>>,
}

impl MemorySoundPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<Sound> {
        self.played.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn stopped(&self) -> Vec<Sound> {
        self.stopped.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SoundPlayer for MemorySoundPlayer {
    fn play(&self, sound: Sound) {
        if let Ok(mut played) = self.played.lock() {
            played.push(sound);
        }
    }

    fn stop(&self, sound: Sound) {
        if let Ok(mut stopped) = self.stopped.lock() {
            stopped.push(sound);
        }
    }
}
