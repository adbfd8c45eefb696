use lumen_contracts::events::{EventPayload, EventWriter};
use lumen_contracts::history::{GenerationMode, HistoryEntry};
use lumen_contracts::models::{Capability, ModelSelector};
use lumen_contracts::session::SessionContext;
use serde_json::{json, Value};

use crate::client::{ContentPart, ContentRequest, GenerativeModel};
use crate::decode::{decode_image, DecodedImage, InputImage};
use crate::error::StudioError;

const ENHANCE_PROMPT_TEMPLATE: &str =
    "Improve this prompt for high-quality image generation. Keep it concise but vivid. Prompt: ";
const ENHANCE_EDIT_TEMPLATE: &str =
    "Improve this instruction for image editing. Keep it actionable, concise, and visual. Instruction: ";
const POSE_DESCRIBE_INSTRUCTION: &str =
    "Describe the pose in this image for use as an editing instruction.";
const POSE_APPLY_PREFIX: &str = "Change the pose of this person as described: ";

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub mode: GenerationMode,
    /// Prompt recorded in history and sent with the image request.
    pub final_prompt: String,
    pub enhanced_prompt: Option<String>,
    pub pose_description: Option<String>,
    images: Vec<DecodedImage>,
    pub entry_id: String,
    pub warnings: Vec<String>,
}

impl GenerationOutcome {
    /// Every decoded image, in response order. Never empty.
    pub fn images(&self) -> &[DecodedImage] {
        &self.images
    }

    /// The image that was recorded in history.
    pub fn primary_image(&self) -> &DecodedImage {
        &self.images[0]
    }
}

/// Runs the three generation modes against one model client.
///
/// The studio holds no per-user state: every handler receives the
/// [`SessionContext`] it reads settings from and appends history to.
pub struct Studio {
    model: Box<dyn GenerativeModel>,
    selector: ModelSelector,
    events: EventWriter,
}

impl Studio {
    pub fn new(model: Box<dyn GenerativeModel>, events: EventWriter) -> Self {
        Self {
            model,
            selector: ModelSelector::default(),
            events,
        }
    }

    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn text_to_image(
        &self,
        session: &mut SessionContext,
        prompt: &str,
    ) -> Result<GenerationOutcome, StudioError> {
        let mode = GenerationMode::TextToImage;
        if prompt.trim().is_empty() {
            return Err(self.fail(session, mode, StudioError::Invalid("Please enter a prompt.")));
        }

        let mut warnings = Vec::new();
        let enhanced = self.maybe_enhance(
            session,
            ENHANCE_PROMPT_TEMPLATE,
            prompt,
            "Prompt enhancement failed. Using original prompt.",
            &mut warnings,
        );
        let final_prompt = enhanced.clone().unwrap_or_else(|| prompt.to_string());
        let parts = vec![ContentPart::text(final_prompt.clone())];

        let (images, entry_id) =
            self.run_image_request(session, mode, &final_prompt, parts, &mut warnings)?;
        Ok(GenerationOutcome {
            mode,
            final_prompt,
            enhanced_prompt: enhanced,
            pose_description: None,
            images,
            entry_id,
            warnings,
        })
    }

    pub fn edit(
        &self,
        session: &mut SessionContext,
        image: Option<&InputImage>,
        instruction: &str,
    ) -> Result<GenerationOutcome, StudioError> {
        let mode = GenerationMode::Edit;
        let Some(image) = image else {
            return Err(self.fail(
                session,
                mode,
                StudioError::Invalid("Please upload an image to edit."),
            ));
        };
        if instruction.trim().is_empty() {
            return Err(self.fail(
                session,
                mode,
                StudioError::Invalid("Please enter edit instructions."),
            ));
        }

        let mut warnings = Vec::new();
        let enhanced = self.maybe_enhance(
            session,
            ENHANCE_EDIT_TEMPLATE,
            instruction,
            "Enhancement failed. Using original instruction.",
            &mut warnings,
        );
        let final_prompt = enhanced.clone().unwrap_or_else(|| instruction.to_string());
        let parts = vec![
            ContentPart::text(final_prompt.clone()),
            ContentPart::image(image),
        ];

        let (images, entry_id) =
            self.run_image_request(session, mode, &final_prompt, parts, &mut warnings)?;
        Ok(GenerationOutcome {
            mode,
            final_prompt,
            enhanced_prompt: enhanced,
            pose_description: None,
            images,
            entry_id,
            warnings,
        })
    }

    pub fn pose_transfer(
        &self,
        session: &mut SessionContext,
        base: Option<&InputImage>,
        reference: Option<&InputImage>,
    ) -> Result<GenerationOutcome, StudioError> {
        let mode = GenerationMode::PoseTransfer;
        let (Some(base), Some(reference)) = (base, reference) else {
            return Err(self.fail(
                session,
                mode,
                StudioError::Invalid(
                    "Please upload both the base image and the reference pose image.",
                ),
            ));
        };

        let mut warnings = Vec::new();
        let pose = match self.describe_pose(session, reference, &mut warnings) {
            Ok(pose) => pose,
            Err(err) => return Err(self.fail(session, mode, err)),
        };
        self.emit(
            "pose_extracted",
            json!({ "pose_chars": pose.chars().count() }),
        );

        let parts = vec![
            ContentPart::text(format!("{POSE_APPLY_PREFIX}{pose}")),
            ContentPart::image(base),
        ];
        let (images, entry_id) = self.run_image_request(session, mode, &pose, parts, &mut warnings)?;
        Ok(GenerationOutcome {
            mode,
            final_prompt: pose.clone(),
            enhanced_prompt: None,
            pose_description: Some(pose),
            images,
            entry_id,
            warnings,
        })
    }

    pub fn clear_history(&self, session: &mut SessionContext) -> usize {
        let removed = session.history.clear();
        tracing::info!(removed, "history cleared");
        self.emit("history_cleared", json!({ "removed": removed }));
        removed
    }

    /// Calls the image model, decodes what came back and records one entry.
    fn run_image_request(
        &self,
        session: &mut SessionContext,
        mode: GenerationMode,
        record_prompt: &str,
        parts: Vec<ContentPart>,
        warnings: &mut Vec<String>,
    ) -> Result<(Vec<DecodedImage>, String), StudioError> {
        let model = match self.resolve_model(
            &session.settings.image_model,
            Capability::Image,
            warnings,
        ) {
            Ok(model) => model,
            Err(err) => return Err(self.fail(session, mode, err)),
        };
        tracing::info!(mode = mode.slug(), model = %model, "image request started");
        self.emit(
            "generation_started",
            json!({
                "mode": mode.slug(),
                "model": model,
                "prompt": record_prompt,
                "input_images": parts.iter().filter(|part| part.as_text().is_none()).count(),
            }),
        );

        let request = ContentRequest::image(model, parts);
        let response = match self.model.generate_content(&request) {
            Ok(response) => response,
            Err(cause) => return Err(self.fail(session, mode, StudioError::upstream(mode, cause))),
        };

        let mut images = Vec::with_capacity(response.images.len());
        for item in response.images {
            match decode_image(item.bytes, item.mime_type.as_deref()) {
                Ok(decoded) => images.push(decoded),
                Err(cause) => {
                    return Err(self.fail(session, mode, StudioError::upstream(mode, cause)))
                }
            }
        }
        let Some(primary) = images.first() else {
            if let Some(reason) = response.block_reason.as_deref() {
                tracing::warn!(mode = mode.slug(), reason, "prompt blocked upstream");
            }
            return Err(self.fail(session, mode, StudioError::no_image(mode)));
        };
        if images.len() > 1 {
            warnings.push(format!(
                "Model returned {} images; history keeps the first.",
                images.len()
            ));
        }

        let entry = HistoryEntry::new(
            record_prompt,
            mode,
            primary.bytes.clone(),
            Some(&primary.mime_type),
        );
        let entry = session.history.push(entry);
        let entry_id = entry.id().to_string();
        tracing::info!(
            mode = mode.slug(),
            width = primary.width,
            height = primary.height,
            history_len = session.history.len(),
            "image recorded"
        );
        self.emit(
            "artifact_recorded",
            json!({
                "mode": mode.slug(),
                "entry_id": entry_id,
                "mime_type": primary.mime_type,
                "width": primary.width,
                "height": primary.height,
                "bytes": primary.bytes.len(),
                "history_len": session.history.len(),
            }),
        );
        Ok((images, entry_id))
    }

    /// Returns the enhanced text, or `None` when enhancement is off or failed.
    fn maybe_enhance(
        &self,
        session: &SessionContext,
        template: &str,
        original: &str,
        fallback_warning: &str,
        warnings: &mut Vec<String>,
    ) -> Option<String> {
        if !session.settings.enhance_prompts {
            return None;
        }
        let attempt = self
            .resolve_model(&session.settings.text_model, Capability::Text, warnings)
            .map_err(|err| anyhow::anyhow!(err.to_string()))
            .and_then(|model| {
                let request =
                    ContentRequest::text(model, vec![ContentPart::text(format!("{template}{original}"))]);
                let response = self.model.generate_content(&request)?;
                response
                    .first_text()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("model returned no text"))
            });
        match attempt {
            Ok(enhanced) => {
                self.emit(
                    "prompt_enhanced",
                    json!({ "original": original, "enhanced": enhanced }),
                );
                Some(enhanced)
            }
            Err(err) => {
                let detail = format!("{err:#}");
                tracing::warn!(error = %detail, "prompt enhancement failed");
                warnings.push(fallback_warning.to_string());
                None
            }
        }
    }

    fn describe_pose(
        &self,
        session: &SessionContext,
        reference: &InputImage,
        warnings: &mut Vec<String>,
    ) -> Result<String, StudioError> {
        let model = self.resolve_model(&session.settings.text_model, Capability::Vision, warnings)?;
        let request = ContentRequest::text(
            model,
            vec![
                ContentPart::text(POSE_DESCRIBE_INSTRUCTION),
                ContentPart::image(reference),
            ],
        );
        let response = self
            .model
            .generate_content(&request)
            .map_err(|cause| StudioError::PoseExtraction { cause })?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| StudioError::PoseExtraction {
                cause: anyhow::anyhow!("model returned no pose description"),
            })
    }

    fn resolve_model(
        &self,
        requested: &str,
        capability: Capability,
        warnings: &mut Vec<String>,
    ) -> Result<String, StudioError> {
        let selection = self
            .selector
            .select(Some(requested), capability)
            .map_err(StudioError::Model)?;
        if let Some(reason) = selection.fallback_reason {
            let message = format!("{reason} Using '{}'.", selection.model.name);
            if !warnings.contains(&message) {
                warnings.push(message);
            }
        }
        Ok(selection.model.name)
    }

    fn fail(&self, session: &SessionContext, mode: GenerationMode, err: StudioError) -> StudioError {
        tracing::warn!(mode = mode.slug(), kind = err.kind(), "{err}");
        self.emit(
            "generation_failed",
            json!({
                "mode": mode.slug(),
                "kind": err.kind(),
                "message": err.to_string(),
                "history_len": session.history.len(),
            }),
        );
        err
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let payload: EventPayload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = self.events.emit(event_type, payload) {
            tracing::warn!(event_type, error = %err, "event log write failed");
        }
    }
}
