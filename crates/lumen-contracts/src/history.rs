use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PROMPT_PREVIEW_MAX_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    TextToImage,
    Edit,
    PoseTransfer,
}

impl GenerationMode {
    pub fn label(self) -> &'static str {
        match self {
            GenerationMode::TextToImage => "Text→Image",
            GenerationMode::Edit => "Simple Edit",
            GenerationMode::PoseTransfer => "Pose Transfer",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            GenerationMode::TextToImage => "text_to_image",
            GenerationMode::Edit => "edit",
            GenerationMode::PoseTransfer => "pose_transfer",
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One recorded result. Fields are private so an entry cannot change after
/// it has been pushed into a [`SessionHistory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    id: String,
    prompt: String,
    mode: GenerationMode,
    image: Vec<u8>,
    mime_type: String,
    created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        prompt: impl Into<String>,
        mode: GenerationMode,
        image: Vec<u8>,
        mime_type: Option<&str>,
    ) -> Self {
        Self::with_timestamp(prompt, mode, image, mime_type, Utc::now())
    }

    pub fn with_timestamp(
        prompt: impl Into<String>,
        mode: GenerationMode,
        image: Vec<u8>,
        mime_type: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("image/png")
            .to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            mode,
            image,
            mime_type,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Local wall-clock stamp shown next to the entry, e.g. `2025-01-31 18:04:11`.
    pub fn display_timestamp(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    pub fn prompt_preview(&self) -> String {
        prompt_preview(&self.prompt, PROMPT_PREVIEW_MAX_CHARS)
    }

    pub fn caption(&self) -> String {
        format!("{} • {}", self.mode.label(), self.display_timestamp())
    }

    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    pub fn download_file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.mode.slug(),
            self.display_timestamp().replace(':', "-"),
            self.file_extension()
        )
    }
}

/// Ordered, process-lifetime list of results in request order.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    entries: Vec<HistoryEntry>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) -> &HistoryEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    /// Entry at `index` in the newest-first view (0 is the latest result).
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        let len = self.entries.len();
        if index >= len {
            return None;
        }
        self.entries.get(len - 1 - index)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }
}

pub fn prompt_preview(prompt: &str, max_chars: usize) -> String {
    if prompt.chars().count() <= max_chars {
        return prompt.to_string();
    }
    prompt.chars().take(max_chars).collect::<String>() + "…"
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    "png"
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry(prompt: &str, mode: GenerationMode) -> HistoryEntry {
        HistoryEntry::new(prompt, mode, prompt.as_bytes().to_vec(), None)
    }

    #[test]
    fn push_appends_in_request_order() {
        let mut history = SessionHistory::new();
        history.push(entry("first", GenerationMode::TextToImage));
        history.push(entry("second", GenerationMode::Edit));
        history.push(entry("third", GenerationMode::PoseTransfer));

        assert_eq!(history.len(), 3);
        let prompts: Vec<&str> = history.iter().map(HistoryEntry::prompt).collect();
        assert_eq!(prompts, vec!["first", "second", "third"]);
    }

    #[test]
    fn newest_first_view_and_indexing_agree() {
        let mut history = SessionHistory::new();
        history.push(entry("a", GenerationMode::TextToImage));
        history.push(entry("b", GenerationMode::TextToImage));

        let prompts: Vec<&str> = history.newest_first().map(HistoryEntry::prompt).collect();
        assert_eq!(prompts, vec!["b", "a"]);
        assert_eq!(history.get(0).map(HistoryEntry::prompt), Some("b"));
        assert_eq!(history.get(1).map(HistoryEntry::prompt), Some("a"));
        assert!(history.get(2).is_none());
        assert_eq!(history.latest().map(HistoryEntry::prompt), Some("b"));
    }

    #[test]
    fn clear_empties_history() {
        let mut history = SessionHistory::new();
        history.push(entry("a", GenerationMode::Edit));
        history.push(entry("b", GenerationMode::Edit));

        assert_eq!(history.clear(), 2);
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
        assert!(history.get(0).is_none());
    }

    #[test]
    fn entry_defaults_mime_and_keeps_bytes() {
        let item = HistoryEntry::new("cat", GenerationMode::TextToImage, vec![1, 2, 3], Some(" "));
        assert_eq!(item.mime_type(), "image/png");
        assert_eq!(item.image(), &[1, 2, 3]);
        assert_eq!(item.file_extension(), "png");
        assert!(!item.id().is_empty());
    }

    #[test]
    fn prompt_preview_truncates_long_prompts() {
        let long = "x".repeat(130);
        let preview = prompt_preview(&long, PROMPT_PREVIEW_MAX_CHARS);
        assert_eq!(preview.chars().count(), PROMPT_PREVIEW_MAX_CHARS + 1);
        assert!(preview.ends_with('…'));
        assert_eq!(prompt_preview("short", PROMPT_PREVIEW_MAX_CHARS), "short");
    }

    #[test]
    fn download_file_name_uses_slug_and_dashed_time() {
        let created_at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let item = HistoryEntry::with_timestamp(
            "sunset",
            GenerationMode::PoseTransfer,
            vec![0],
            Some("image/jpeg"),
            created_at,
        );
        let name = item.download_file_name();
        assert!(name.starts_with("pose_transfer_"));
        assert!(name.ends_with(".jpg"));
        assert!(!name.contains(':'));
        assert!(item.caption().starts_with("Pose Transfer • "));
    }

    #[test]
    fn extension_for_mime_matches_known_types() {
        assert_eq!(extension_for_mime("image/JPEG"), "jpg");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
    }

    #[test]
    fn mode_labels_and_slugs() {
        assert_eq!(GenerationMode::TextToImage.label(), "Text→Image");
        assert_eq!(GenerationMode::Edit.label(), "Simple Edit");
        assert_eq!(GenerationMode::PoseTransfer.slug(), "pose_transfer");
        assert_eq!(
            serde_json::to_value(GenerationMode::TextToImage).unwrap(),
            serde_json::json!("text_to_image")
        );
    }
}
