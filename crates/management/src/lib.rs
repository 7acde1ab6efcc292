//! Campaign planning session: generates a campaign against the account's
//! entitlement, validates and installs its draft, and drives per-channel
//! asset generation for it.

pub mod demo;
pub mod draft;
pub mod ports;
pub mod session;
pub mod transcription;

pub use demo::DemoGenerator;
pub use draft::CampaignDraft;
pub use ports::CampaignGenerator;
pub use session::SessionController;
pub use transcription::{start_dictation, DictationHandle, TranscriptBuffer, TranscriptEvent};
