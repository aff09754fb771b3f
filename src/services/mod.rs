pub mod session;
pub mod voice;

pub use voice::{VoiceHandle, VoiceService};
