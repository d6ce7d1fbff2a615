//! Optional speech input/output. Missing handles are the normal case.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpeechCapabilities: u8 {
        const INPUT = 0b01;
        const OUTPUT = 0b10;
    }
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech backend failed: {0}")]
    Backend(String),
    #[error("no speech was recognized")]
    NoMatch,
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait SpeechInput: Send {
    /// Capture one utterance and return its transcript.
    fn listen(&mut self) -> Result<String, SpeechError>;
}

pub trait SpeechOutput: Send {
    fn speak(&mut self, line: &str) -> Result<(), SpeechError>;
}

/// Speech handles available to this client.
#[derive(Default)]
pub struct Speech {
    input: Option<Box<dyn SpeechInput>>,
    output: Option<Box<dyn SpeechOutput>>,
}

impl std::fmt::Debug for Speech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Speech")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl Speech {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: Box<dyn SpeechInput>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: Box<dyn SpeechOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn capabilities(&self) -> SpeechCapabilities {
        let mut caps = SpeechCapabilities::empty();
        caps.set(SpeechCapabilities::INPUT, self.input.is_some());
        caps.set(SpeechCapabilities::OUTPUT, self.output.is_some());
        caps
    }

    pub fn input(&mut self) -> Option<&mut (dyn SpeechInput + 'static)> {
        self.input.as_deref_mut()
    }

    pub fn output(&mut self) -> Option<&mut (dyn SpeechOutput + 'static)> {
        self.output.as_deref_mut()
    }
}

/// Speaks through a text-to-speech program found on `PATH`. Finished
/// utterances are reaped on the next call.
#[derive(Debug)]
pub struct CommandSpeechOutput {
    program: PathBuf,
    running: Vec<Child>,
}

impl CommandSpeechOutput {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            running: Vec::new(),
        }
    }

    /// Utterances still playing.
    pub fn running(&self) -> usize {
        self.running.len()
    }

    fn reap(&mut self) {
        let program = &self.program;
        self.running.retain_mut(|child| match child.try_wait() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(err) => {
                tracing::warn!(
                    target: "eco_quest::speech",
                    program = %program.display(),
                    error = %err,
                    "speech.wait_failed"
                );
                false
            }
        });
    }
}

impl SpeechOutput for CommandSpeechOutput {
    fn speak(&mut self, line: &str) -> Result<(), SpeechError> {
        self.reap();
        let child = Command::new(&self.program)
            .arg(line)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        self.running.push(child);
        Ok(())
    }
}

const SPEECH_PROGRAMS: [&str; 3] = ["espeak-ng", "espeak", "say"];

fn find_in(dirs: &[PathBuf], program: &str) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata().map(|meta| meta.is_file()).unwrap_or(false)
}

/// Probe the host for speech support. Terminal hosts have no recognizer, so
/// input is never detected here.
pub fn detect_system_speech() -> Speech {
    let dirs: Vec<PathBuf> = env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).collect())
        .unwrap_or_default();
    let output = SPEECH_PROGRAMS
        .iter()
        .find_map(|program| find_in(&dirs, program));
    let mut speech = Speech::none();
    match output {
        Some(program) => {
            tracing::info!(
                target: "eco_quest::speech",
                program = %program.display(),
                "speech.output_detected"
            );
            speech = speech.with_output(Box::new(CommandSpeechOutput::new(program)));
        }
        None => {
            tracing::debug!(target: "eco_quest::speech", "speech.output_unavailable");
        }
    }
    speech
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    impl SpeechInput for Canned {
        fn listen(&mut self) -> Result<String, SpeechError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn capabilities_follow_handles() {
        let mut speech = Speech::none();
        assert!(speech.capabilities().is_empty());
        assert!(speech.input().is_none());

        let mut speech = Speech::none().with_input(Box::new(Canned("bonjour")));
        assert_eq!(speech.capabilities(), SpeechCapabilities::INPUT);
        assert_eq!(speech.input().unwrap().listen().unwrap(), "bonjour");
    }

    #[test]
    fn finished_utterances_are_reaped() {
        let dirs: Vec<PathBuf> = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();
        let Some(program) = find_in(&dirs, "true") else {
            return;
        };
        let mut output = CommandSpeechOutput::new(program);
        output.speak("one").unwrap();
        output.speak("two").unwrap();
        assert_eq!(output.running(), 2);
        for child in output.running.iter_mut() {
            child.wait().unwrap();
        }
        output.speak("three").unwrap();
        assert_eq!(output.running(), 1);
    }

    #[test]
    fn missing_program_reports_spawn_error() {
        let mut output = CommandSpeechOutput::new(env::temp_dir().join("no-such-tts-program"));
        assert!(matches!(output.speak("hi"), Err(SpeechError::Spawn { .. })));
        assert_eq!(output.running(), 0);
    }

    #[test]
    fn lookup_only_accepts_existing_files() {
        let dir = env::temp_dir();
        assert!(find_in(&[dir], "definitely-not-a-speech-program").is_none());
    }
}
