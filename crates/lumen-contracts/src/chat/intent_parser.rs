use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS, PATH_AND_TEXT_COMMANDS, RAW_ARG_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    fn generate(raw: &str, prompt: &str) -> Self {
        let mut intent = Self::new("generate", raw);
        intent.prompt = Some(prompt.to_string());
        intent
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn arg_list(&self, key: &str) -> Vec<String> {
        self.command_args
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

/// Splits `"/tmp/a b.png" make it blue` into the path and the remaining text.
/// Only the leading token is unquoted so apostrophes in the text survive.
fn split_leading_path(arg: &str) -> (String, String) {
    let trimmed = arg.trim();
    let Some(first) = trimmed.chars().next() else {
        return (String::new(), String::new());
    };
    if first == '"' || first == '\'' {
        let body = &trimmed[first.len_utf8()..];
        if let Some(end) = body.find(first) {
            let path = body[..end].to_string();
            let rest = body[end + first.len_utf8()..].trim().to_string();
            return (path, rest);
        }
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((path, rest)) => (path.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

fn parse_enhance_arg(arg: &str) -> Value {
    match arg.trim().to_ascii_lowercase().as_str() {
        "" | "toggle" => Value::Null,
        "on" | "true" | "yes" | "1" => Value::Bool(true),
        "off" | "false" | "no" | "0" => Value::Bool(false),
        _ => Value::Null,
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                if action == "generate" {
                    return Intent::generate(text, arg);
                }
                let mut intent = Intent::new(action, text);
                let value = if action == "set_enhance" {
                    parse_enhance_arg(arg)
                } else {
                    Value::String(arg.to_string())
                };
                let key = if action == "set_enhance" {
                    "enabled"
                } else {
                    "model"
                };
                intent.command_args.insert(key.to_string(), value);
                return intent;
            }

            if let Some(action) = find_action(&command, PATH_AND_TEXT_COMMANDS) {
                let (path, instruction) = split_leading_path(arg);
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("path".to_string(), Value::String(path));
                intent.prompt = Some(instruction);
                return intent;
            }

            if let Some(action) = find_action(&command, MULTI_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "paths".to_string(),
                    Value::Array(
                        parse_path_args(arg)
                            .into_iter()
                            .map(Value::String)
                            .collect(),
                    ),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    Intent::generate(text, raw_trimmed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn blank_input_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn plain_text_and_generate_command_both_generate() {
        let plain = parse_intent("  a neon city in the rain  ");
        assert_eq!(plain.action, "generate");
        assert_eq!(plain.prompt.as_deref(), Some("a neon city in the rain"));

        let command = parse_intent("/generate a neon city");
        assert_eq!(command.action, "generate");
        assert_eq!(command.prompt.as_deref(), Some("a neon city"));

        let empty = parse_intent("/generate");
        assert_eq!(empty.action, "generate");
        assert_eq!(empty.prompt.as_deref(), Some(""));
    }

    #[test]
    fn parse_edit_with_quoted_path_keeps_apostrophes() {
        let intent = parse_intent("/edit \"/tmp/my photo.png\" don't change the face");
        assert_eq!(intent.action, "edit");
        assert_eq!(intent.command_args["path"], json!("/tmp/my photo.png"));
        assert_eq!(intent.prompt.as_deref(), Some("don't change the face"));

        let bare = parse_intent("/edit cat.jpg add a hat");
        assert_eq!(bare.arg_str("path"), Some("cat.jpg"));
        assert_eq!(bare.prompt.as_deref(), Some("add a hat"));

        let missing = parse_intent("/edit");
        assert_eq!(missing.arg_str("path"), None);
        assert_eq!(missing.prompt.as_deref(), Some(""));
    }

    #[test]
    fn parse_pose_paths() {
        let intent = parse_intent("/pose \"/tmp/base a.png\" ref.jpg");
        assert_eq!(intent.action, "pose_transfer");
        assert_eq!(intent.arg_list("paths"), vec!["/tmp/base a.png", "ref.jpg"]);
    }

    #[test]
    fn parse_history_commands() {
        assert_eq!(parse_intent("/history").action, "history");
        assert_eq!(parse_intent("/clear").action, "clear_history");
        assert_eq!(parse_intent("/HELP").action, "help");

        let save = parse_intent("/save 2 \"/tmp/out dir/x.png\"");
        assert_eq!(save.action, "save");
        assert_eq!(save.arg_list("paths"), vec!["2", "/tmp/out dir/x.png"]);

        let export = parse_intent("/export");
        assert_eq!(export.action, "export");
        assert!(export.arg_list("paths").is_empty());
    }

    #[test]
    fn parse_settings_commands() {
        let text_model = parse_intent("/text_model gemini-2.0-flash");
        assert_eq!(text_model.action, "set_text_model");
        assert_eq!(text_model.command_args["model"], json!("gemini-2.0-flash"));

        let image_model = parse_intent("/image_model gemini-3-pro-image-preview");
        assert_eq!(image_model.action, "set_image_model");

        assert_eq!(parse_intent("/enhance on").command_args["enabled"], json!(true));
        assert_eq!(parse_intent("/enhance OFF").command_args["enabled"], json!(false));
        assert_eq!(parse_intent("/enhance").command_args["enabled"], json!(null));
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
