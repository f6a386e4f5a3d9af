//! Continuous speech recognition session management

mod recognition;

pub use recognition::{RecognitionController, RecognitionSettings, RecognitionState};
