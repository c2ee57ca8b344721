//! Policy rendering.
//!
//! The rendered text is a pure function of the grant: no timestamps, no host
//! names, nothing that changes between runs. Reinstalling an unchanged grant
//! therefore produces a byte-identical file.

use std::fmt;

use crate::error::{Error, Result};
use crate::identity::GroupName;

use super::command::CommandSet;

/// Rendered policy text for one grant file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyText {
    text: String,
    line: String,
}

impl PolicyText {
    fn with_header(group: &GroupName, line: String) -> Self {
        let text = format!(
            "# Managed by labctl: sudo grant for group {}.\n\
             # Change it through labctl; manual edits are overwritten.\n\
             {}\n",
            group, line
        );
        Self { text, line }
    }

    /// Full file content, header comments included.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// The single policy line, without header or newline.
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for PolicyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A group, the commands it may run as root, and whether sudo asks for a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub group: GroupName,
    pub commands: CommandSet,
    pub require_password: bool,
}

impl Grant {
    pub fn new(group: GroupName, commands: CommandSet, require_password: bool) -> Self {
        Self {
            group,
            commands,
            require_password,
        }
    }

    pub fn render(&self) -> Result<PolicyText> {
        render(&self.group, &self.commands, self.require_password)
    }
}

/// Render `%<group> ALL=(root) [NOPASSWD: ]<cmd1>, <cmd2>, ...` with header comments.
pub fn render(group: &GroupName, commands: &CommandSet, require_password: bool) -> Result<PolicyText> {
    if commands.is_empty() {
        return Err(Error::EmptyCommandSet {
            group: group.to_string(),
        });
    }

    let list = commands
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let tag = if require_password { "" } else { "NOPASSWD: " };

    Ok(PolicyText::with_header(
        group,
        format!("%{} ALL=(root) {}{}", group, tag, list),
    ))
}

/// Render the fixed full-privilege line for the administrative group.
pub fn render_full_admin(group: &GroupName) -> PolicyText {
    PolicyText::with_header(group, full_admin_line(group))
}

/// `%<group> ALL=(ALL:ALL) ALL`
pub fn full_admin_line(group: &GroupName) -> String {
    format!("%{} ALL=(ALL:ALL) ALL", group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::command::CommandRef;

    fn commands(paths: &[&str]) -> CommandSet {
        paths.iter().map(|p| CommandRef::new(*p).unwrap()).collect()
    }

    fn blue_team() -> GroupName {
        GroupName::new("blue-team").unwrap()
    }

    #[test]
    fn test_render_with_password() {
        let text = render(
            &blue_team(),
            &commands(&["/usr/bin/systemctl", "/usr/bin/journalctl"]),
            true,
        )
        .unwrap();

        assert_eq!(
            text.line(),
            "%blue-team ALL=(root) /usr/bin/systemctl, /usr/bin/journalctl"
        );
        assert!(text.as_str().ends_with(
            "%blue-team ALL=(root) /usr/bin/systemctl, /usr/bin/journalctl\n"
        ));
    }

    #[test]
    fn test_render_nopasswd_tag_precedes_command_list() {
        let text = render(
            &blue_team(),
            &commands(&["/usr/bin/systemctl", "/usr/bin/journalctl"]),
            false,
        )
        .unwrap();

        assert_eq!(
            text.line(),
            "%blue-team ALL=(root) NOPASSWD: /usr/bin/systemctl, /usr/bin/journalctl"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let set = commands(&["/usr/bin/systemctl", "/usr/bin/journalctl", "/usr/bin/id"]);
        let first = render(&blue_team(), &set, false).unwrap();
        let second = render(&blue_team(), &set.clone(), false).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_render_keeps_caller_order() {
        let text = render(
            &blue_team(),
            &commands(&["/usr/bin/journalctl", "/usr/bin/systemctl", "/usr/bin/journalctl"]),
            true,
        )
        .unwrap();
        assert!(text.line().ends_with("/usr/bin/journalctl, /usr/bin/systemctl"));
    }

    #[test]
    fn test_render_rejects_empty_command_set() {
        let err = render(&blue_team(), &CommandSet::new(), true).unwrap_err();
        assert!(matches!(err, Error::EmptyCommandSet { ref group } if group == "blue-team"));
    }

    #[test]
    fn test_text_has_one_policy_line() {
        let text = render(&blue_team(), &commands(&["/usr/bin/id"]), true).unwrap();
        let policy_lines: Vec<&str> = text
            .as_str()
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
            .collect();
        assert_eq!(policy_lines, vec![text.line()]);
    }

    #[test]
    fn test_full_admin_line() {
        let admins = GroupName::new("lab-admins").unwrap();
        assert_eq!(full_admin_line(&admins), "%lab-admins ALL=(ALL:ALL) ALL");
        assert_eq!(render_full_admin(&admins).line(), "%lab-admins ALL=(ALL:ALL) ALL");
    }
}
