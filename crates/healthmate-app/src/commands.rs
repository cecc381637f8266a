//! Slash commands understood by the terminal front end.

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to submit to the conversation.
    Say(String),
    Lang(String),
    History,
    Usage,
    Symptoms {
        list: String,
        details: Option<String>,
    },
    Tip,
    Login {
        uid: String,
        admin: bool,
    },
    Logout,
    Admin,
    Help,
    Quit,
    /// A slash command that is unknown or missing its argument.
    Invalid(String),
}

pub const HELP: &str = "\
Commands:
  /lang <en|hi|es|fr>            change language
  /history                       show the conversation
  /usage                         show usage against the quota
  /symptoms <a,b,...> [details]  check symptoms (headache, fever, cough, fatigue,
                                 nausea, dizziness, pain, rash)
  /tip                           today's health tip
  /login <uid> [admin]           sign in; history is saved
  /logout                        sign out
  /admin                         check content-management access
  /help                          this text
  /quit                          exit
Anything else is sent to the assistant.";

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Say(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "lang" | "language" if !arg.is_empty() => Command::Lang(arg.to_string()),
            "history" => Command::History,
            "usage" => Command::Usage,
            "symptoms" if !arg.is_empty() => {
                let (list, details) = match arg.split_once(char::is_whitespace) {
                    Some((list, details)) => (list, Some(details.trim().to_string())),
                    None => (arg, None),
                };
                Command::Symptoms {
                    list: list.to_string(),
                    details: details.filter(|d| !d.is_empty()),
                }
            }
            "tip" => Command::Tip,
            "login" if !arg.is_empty() => {
                let mut parts = arg.split_whitespace();
                let uid = parts.next().unwrap_or_default().to_string();
                let admin = parts.next().is_some_and(|p| p.eq_ignore_ascii_case("admin"));
                Command::Login { uid, admin }
            }
            "logout" => Command::Logout,
            "admin" => Command::Admin,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Invalid(line.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_submitted() {
        assert_eq!(
            Command::parse("  I have a cough  "),
            Command::Say("I have a cough".to_string())
        );
        assert_eq!(Command::parse(""), Command::Say(String::new()));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("/history"), Command::History);
        assert_eq!(Command::parse("/usage"), Command::Usage);
        assert_eq!(Command::parse("/tip"), Command::Tip);
        assert_eq!(Command::parse("/logout"), Command::Logout);
        assert_eq!(Command::parse("/admin"), Command::Admin);
        assert_eq!(Command::parse("/QUIT"), Command::Quit);
        assert_eq!(Command::parse("/help"), Command::Help);
    }

    #[test]
    fn test_lang() {
        assert_eq!(Command::parse("/lang hi"), Command::Lang("hi".to_string()));
        assert!(matches!(Command::parse("/lang"), Command::Invalid(_)));
    }

    #[test]
    fn test_symptoms_with_details() {
        assert_eq!(
            Command::parse("/symptoms fever,cough  for three days"),
            Command::Symptoms {
                list: "fever,cough".to_string(),
                details: Some("for three days".to_string()),
            }
        );
        assert_eq!(
            Command::parse("/symptoms rash"),
            Command::Symptoms {
                list: "rash".to_string(),
                details: None,
            }
        );
        assert!(matches!(Command::parse("/symptoms"), Command::Invalid(_)));
    }

    #[test]
    fn test_login() {
        assert_eq!(
            Command::parse("/login u-1"),
            Command::Login {
                uid: "u-1".to_string(),
                admin: false
            }
        );
        assert_eq!(
            Command::parse("/login u-2 admin"),
            Command::Login {
                uid: "u-2".to_string(),
                admin: true
            }
        );
        assert!(matches!(Command::parse("/login"), Command::Invalid(_)));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("/dance now"),
            Command::Invalid("/dance now".to_string())
        );
    }
}
