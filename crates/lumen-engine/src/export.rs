use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lumen_contracts::history::{HistoryEntry, SessionHistory};

/// Writes one entry's image bytes. A directory target (or no target) gets
/// the entry's download file name.
pub fn save_entry(entry: &HistoryEntry, target: Option<&Path>) -> Result<PathBuf> {
    let path = match target {
        Some(path) if path.is_dir() => path.join(entry.download_file_name()),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(entry.download_file_name()),
    };
    write_bytes(&path, entry.image())?;
    Ok(path)
}

/// Writes `bytes` under `dir` as `<stem>_<n>.<ext>`, numbering from 1.
pub fn save_numbered(dir: &Path, stem: &str, index: usize, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(format!("{stem}_{index}.{ext}"));
    write_bytes(&path, bytes)?;
    Ok(path)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

pub fn export_history_html(history: &SessionHistory, out_path: &Path) -> Result<()> {
    let html_doc = render_history_html(history);
    write_bytes(out_path, html_doc.as_bytes())
}

/// Self-contained gallery, newest first, images inlined as data URLs.
pub fn render_history_html(history: &SessionHistory) -> String {
    let mut cards = String::new();
    if history.is_empty() {
        cards.push_str(
            "<p class='empty'>No images yet. Generate, edit, or transfer a pose to see your history here.</p>",
        );
    }
    for (idx, entry) in history.newest_first().enumerate() {
        cards.push_str(&format!(
            "<div class='card'><div class='thumb'><img src='data:{mime};base64,{data}' alt='result {n}'></div><div class='meta'><div class='caption'>#{n} {caption}</div><div class='prompt'>Prompt: {prompt}</div><div class='links'><a download='{file}' href='data:{mime};base64,{data}'>Download</a></div></div></div>",
            n = idx + 1,
            mime = escape_html(entry.mime_type()),
            data = BASE64.encode(entry.image()),
            caption = escape_html(&entry.caption()),
            prompt = escape_html(&entry.prompt_preview()),
            file = escape_html(&entry.download_file_name()),
        ));
    }

    format!(
        "<!doctype html>\n<html>\n<head>\n  <meta charset='utf-8'>\n  <title>Lumen History</title>\n  <style>\n    body {{ font-family: Arial, sans-serif; background: #f6f6f6; margin: 0; padding: 20px; }}\n    .grid {{ display: grid; grid-template-columns: repeat(3, minmax(0, 1fr)); gap: 16px; }}\n    .card {{ background: white; border: 1px solid #e5e7eb; border-radius: 12px; overflow: hidden; box-shadow: 0 1px 3px rgba(0,0,0,0.06); }}\n    .thumb {{ width: 100%; height: 240px; background: #eee; display: flex; align-items: center; justify-content: center; }}\n    .thumb img {{ max-width: 100%; max-height: 100%; }}\n    .meta {{ padding: 10px; }}\n    .caption {{ font-weight: bold; font-size: 12px; color: #444; }}\n    .prompt {{ font-size: 13px; margin: 8px 0; color: #6b7280; }}\n    .links a {{ font-size: 12px; color: #3730a3; text-decoration: none; }}\n  </style>\n</head>\n<body>\n  <h1>History</h1>\n  <div class='grid'>\n    {cards}\n  </div>\n</body>\n</html>\n"
    )
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use lumen_contracts::history::GenerationMode;

    use super::*;

    fn history_with(prompts: &[&str]) -> SessionHistory {
        let mut history = SessionHistory::new();
        for prompt in prompts {
            history.push(HistoryEntry::new(
                *prompt,
                GenerationMode::TextToImage,
                prompt.as_bytes().to_vec(),
                Some("image/png"),
            ));
        }
        history
    }

    #[test]
    fn save_entry_writes_exact_bytes_into_directory() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let history = history_with(&["owl"]);
        let entry = history.get(0).unwrap();

        let path = save_entry(entry, Some(temp.path()))?;

        assert_eq!(path.parent(), Some(temp.path()));
        assert!(path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .starts_with("text_to_image_"));
        assert_eq!(fs::read(&path)?, b"owl");
        Ok(())
    }

    #[test]
    fn save_entry_honours_explicit_file_path() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let history = history_with(&["owl"]);
        let target = temp.path().join("nested").join("owl.png");

        let path = save_entry(history.get(0).unwrap(), Some(&target))?;

        assert_eq!(path, target);
        assert_eq!(fs::read(&target)?, b"owl");
        Ok(())
    }

    #[test]
    fn save_numbered_uses_stem_and_index() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = save_numbered(temp.path(), "generated_image", 1, "png", b"x")?;
        assert_eq!(path, temp.path().join("generated_image_1.png"));
        Ok(())
    }

    #[test]
    fn html_lists_newest_first_and_escapes_prompts() {
        let history = history_with(&["first <b>", "second & last"]);
        let html = render_history_html(&history);

        let second = html.find("second &amp; last").unwrap();
        let first = html.find("first &lt;b&gt;").unwrap();
        assert!(second < first);
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains(&BASE64.encode(b"second & last")));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn html_for_empty_history_shows_hint() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let out = temp.path().join("history.html");
        export_history_html(&SessionHistory::new(), &out)?;
        let html = fs::read_to_string(&out)?;
        assert!(html.contains("No images yet."));
        Ok(())
    }
}
