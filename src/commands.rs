/// Available `:` commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Hidden from non-admin users
  pub admin_only: bool,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "projects",
    aliases: &["p", "project", "dashboard", "home"],
    description: "Project dashboard",
    admin_only: false,
  },
  Command {
    name: "admins",
    aliases: &["a", "admin", "sysadmins"],
    description: "Manage system administrators",
    admin_only: true,
  },
  Command {
    name: "logout",
    aliases: &["signout", "sign-out"],
    description: "Forget the stored session",
    admin_only: false,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit conflux",
    admin_only: false,
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str, is_admin: bool) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();
  let visible = COMMANDS.iter().filter(|cmd| is_admin || !cmd.admin_only);

  if input_lower.is_empty() {
    return visible.collect();
  }

  let mut matches: Vec<(&Command, u32)> = visible
    .filter_map(|cmd| match_priority(cmd, &input_lower).map(|p| (cmd, p)))
    .collect();

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; `None` means no match
fn match_priority(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}
