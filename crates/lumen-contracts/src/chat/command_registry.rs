#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose argument is kept verbatim.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "text_model",
        action: "set_text_model",
    },
    CommandSpec {
        command: "image_model",
        action: "set_image_model",
    },
    CommandSpec {
        command: "enhance",
        action: "set_enhance",
    },
];

/// Commands taking one path followed by free text.
pub(crate) const PATH_AND_TEXT_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "edit",
    action: "edit",
}];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "pose",
        action: "pose_transfer",
    },
    CommandSpec {
        command: "save",
        action: "save",
    },
    CommandSpec {
        command: "export",
        action: "export",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "clear",
        action: "clear_history",
    },
    CommandSpec {
        command: "models",
        action: "models",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/generate <prompt>",
    "/edit <image> <instruction>",
    "/pose <base> <reference>",
    "/history",
    "/save <n> [path]",
    "/export [path]",
    "/clear",
    "/enhance on|off",
    "/text_model <name>",
    "/image_model <name>",
    "/models",
    "/help",
    "/quit",
];
