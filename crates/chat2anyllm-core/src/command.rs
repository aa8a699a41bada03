//! Slash commands typed into the chat box (`/roles`, `/role <name>`).

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// `/roles`: list defined roles.
    ListRoles,
    /// `/role <name>`: select a role. The name may be empty.
    SelectRole(String),
    /// Any other `/word`.
    Unknown(String),
}

impl SlashCommand {
    /// Parse user input. Returns `None` when the input is an ordinary message.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let rest = trimmed.strip_prefix('/')?;

        let (name, args) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };

        Some(match name {
            "roles" => Self::ListRoles,
            "role" => Self::SelectRole(args.to_string()),
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Reply for `/roles`.
pub fn format_role_list<S: AsRef<str>>(names: &[S]) -> String {
    if names.is_empty() {
        return "No roles defined.".to_string();
    }
    let lines: Vec<String> = names.iter().map(|n| format!("• {}", n.as_ref())).collect();
    format!("Roles:\n{}", lines.join("\n"))
}

pub const ROLE_USAGE: &str = "Usage: /role <name>";
pub const UNKNOWN_COMMAND: &str = "Unknown command";

pub fn role_not_found(name: &str) -> String {
    format!("Role not found: {}", name)
}

pub fn role_selected(name: &str) -> String {
    format!("Selected role: {}", name)
}
