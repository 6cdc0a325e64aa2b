pub mod gemini;
pub mod lang;
pub mod translate;
pub mod tts;
