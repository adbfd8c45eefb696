use uuid::Uuid;

use crate::history::SessionHistory;

pub const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Used for prompt enhancement and pose description.
    pub text_model: String,
    pub image_model: String,
    pub enhance_prompts: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            enhance_prompts: false,
        }
    }
}

/// Everything a mode handler may read or change for one user session.
///
/// Owned by whoever drives the session (the chat loop, a one-shot command)
/// and passed by `&mut` into each handler; nothing about a session lives in
/// globals.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: String,
    pub settings: SessionSettings,
    pub history: SessionHistory,
}

impl SessionContext {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            settings,
            history: SessionHistory::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}
