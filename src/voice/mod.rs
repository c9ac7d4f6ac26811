//! Voice resolution against the local voice assets directory.
//!
//! A voice is a `{name}.wav` or `{name}.mp3` reference recording with an
//! optional `{name}.txt` transcript next to it.

mod resolver;

pub use resolver::{
    ResolvedVoice, VoiceEntry, VoiceError, VoiceResolver, VoiceSpec, preview_text,
};

pub(crate) use resolver::format_available;
