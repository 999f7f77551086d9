//! Voice processing module
//!
//! Handles audio capture, utterance detection, transcription and speech output.

mod capture;
mod energy;
mod playback;
mod recorder;
mod stt;
mod tts;

pub use capture::{AudioSource, AudioStream, CaptureFormat, MicrophoneSource, samples_to_wav};
pub use energy::energy;
pub use playback::{AudioPlayback, DecodedAudio, decode_mp3};
pub use recorder::{Recording, RecordingParams, StopReason, UtteranceRecorder, capture_format};
pub use stt::{
    SpeechToText, TranscriptFilter, Transcriber, Utterance, build_transcriber,
    transcribe_recording,
};
pub use tts::{SilentSpeaker, Speaker, TextToSpeech, build_speaker};
