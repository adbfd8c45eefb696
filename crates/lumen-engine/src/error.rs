use lumen_contracts::history::GenerationMode;
use thiserror::Error;

/// What the user sees when a mode handler cannot produce a result.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("{message}")]
    NoImage {
        mode: GenerationMode,
        message: &'static str,
    },
    #[error("Pose extraction failed: {cause:#}")]
    PoseExtraction { cause: anyhow::Error },
    #[error("{}: {cause:#}", upstream_prefix(.mode))]
    Upstream {
        mode: GenerationMode,
        cause: anyhow::Error,
    },
    #[error("{0}")]
    Model(String),
}

impl StudioError {
    pub(crate) fn upstream(mode: GenerationMode, cause: anyhow::Error) -> Self {
        StudioError::Upstream { mode, cause }
    }

    pub(crate) fn no_image(mode: GenerationMode) -> Self {
        let message = match mode {
            GenerationMode::TextToImage => "No image returned. Try a more specific prompt.",
            GenerationMode::Edit => "No edited image returned. Try more precise instructions.",
            GenerationMode::PoseTransfer => {
                "No result image returned. Try a clearer reference pose."
            }
        };
        StudioError::NoImage { mode, message }
    }

    /// Short tag for event logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StudioError::Invalid(_) => "invalid_input",
            StudioError::NoImage { .. } => "no_image",
            StudioError::PoseExtraction { .. } => "pose_extraction",
            StudioError::Upstream { .. } => "upstream",
            StudioError::Model(_) => "model_selection",
        }
    }
}

fn upstream_prefix(mode: &GenerationMode) -> &'static str {
    match mode {
        GenerationMode::TextToImage => "Generation error",
        GenerationMode::Edit => "Edit error",
        GenerationMode::PoseTransfer => "Pose transfer error",
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn upstream_message_carries_mode_prefix_and_chain() {
        let err = StudioError::upstream(
            GenerationMode::Edit,
            anyhow!("quota exceeded").context("Gemini request failed (429)"),
        );
        let rendered = err.to_string();
        assert!(rendered.starts_with("Edit error: Gemini request failed (429)"));
        assert!(rendered.contains("quota exceeded"));
        assert_eq!(err.kind(), "upstream");
    }

    #[test]
    fn no_image_messages_are_mode_specific() {
        assert_eq!(
            StudioError::no_image(GenerationMode::TextToImage).to_string(),
            "No image returned. Try a more specific prompt."
        );
        assert_eq!(
            StudioError::no_image(GenerationMode::PoseTransfer).to_string(),
            "No result image returned. Try a clearer reference pose."
        );
    }

    #[test]
    fn pose_extraction_message_includes_cause() {
        let err = StudioError::PoseExtraction {
            cause: anyhow!("model returned no text"),
        };
        assert_eq!(
            err.to_string(),
            "Pose extraction failed: model returned no text"
        );
    }
}
