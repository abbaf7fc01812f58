//! Priming instructions for the generation flows

use buildora_core::FileNode;

use crate::extract::{PROJECT_FILES, PROJECT_NAME};
use crate::types::{ChatMessage, Role};

const FORMAT_RULES: &str = "\
Return the files in exactly this delimited format, each marker on its own line:

=== index.html ===
(HTML only. Link the other files with <link rel=\"stylesheet\" href=\"style.css\"> and <script src=\"script.js\"></script>. No inline <style> or <script> code.)

=== style.css ===
(CSS only)

=== script.js ===
(JavaScript only)

Do not add explanations. Do not wrap anything in markdown code fences.";

const DESIGN_BRIEF: &str = "\
You are a senior front-end designer and developer. Build modern, responsive, \
mobile-first interfaces with deliberate typography, layered depth, smooth \
transitions and hover micro-interactions. Avoid flat, unstyled or table-based layouts.";

/// Messages for generating a whole new project from a description
pub fn create_project(description: &str) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n\nGenerate a complete single-page web tool. Start with the project name:\n\n=== {} ===\n(Short project name)\n\n{}",
        DESIGN_BRIEF, PROJECT_NAME, FORMAT_RULES
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("Create a web tool: {}", description.trim())),
    ]
}

/// Messages for rewriting one file, optionally spilling into its siblings
pub fn edit_file(file: &FileNode, instruction: &str) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n\nWhen the change spans several files, answer with all of them. {}\n\n\
         When only the current file changes, you may return just its new content.",
        DESIGN_BRIEF, FORMAT_RULES
    );
    let user = format!(
        "Current File: {}\nLanguage: {}\n\nCode:\n{}\n\nInstruction: {}",
        file.name,
        file.kind,
        file.content,
        instruction.trim()
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

const CHAT_PRIMING: &str = "\
You are an expert web developer. Never combine HTML, CSS and JavaScript in one file. \
When you provide code for a working page or app, always split it into index.html, \
style.css and script.js.";

const CHAT_FORMAT: &str = "\
If the user asks for a simple explanation you can answer normally, but code for a \
functional page must use the format above.";

/// Messages for one assistant turn: priming, every prior turn in order, then `input`
///
/// System turns found in `history` are dropped; the priming instruction is
/// always the only one.
pub fn chat(history: &[ChatMessage], input: &str) -> Vec<ChatMessage> {
    let system = format!("{} {}\n\n{}", CHAT_PRIMING, FORMAT_RULES, CHAT_FORMAT);
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned(),
    );
    messages.push(ChatMessage::user(input.trim()));
    messages
}

/// Names to look for in a create-project response
pub fn create_expected() -> Vec<&'static str> {
    let mut names = vec![PROJECT_NAME];
    names.extend(PROJECT_FILES);
    names
}

/// Names to look for in an edit response
///
/// The edited file is always included, even if it is not one of the
/// standard three.
pub fn edit_expected(file_name: &str) -> Vec<String> {
    let mut names: Vec<String> = PROJECT_FILES.iter().map(|s| s.to_string()).collect();
    if !names.iter().any(|n| n.eq_ignore_ascii_case(file_name)) {
        names.push(file_name.to_string());
    }
    names
}
