//! Operator command grammar.
//!
//! Commands are plain text messages from the operator account, all prefixed
//! with `!`. Anything unrecognized is ignored so normal conversations never
//! trigger the bot.

/// Which prepared template a `!send` variant refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateChoice {
    Primary,
    Alt1,
    Alt2,
    Alt3,
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { phone: String, name: Option<String> },
    Import { path: String },
    Scan,
    List,
    Stats,
    Validate,
    QuickValidate,
    Clean,
    CleanInvalid,
    Clear,
    ClearConfirm,
    Send(TemplateChoice),
    SendCustom { text: String },
    Batch { size: usize, text: String },
    Test,
    Texts,
    AutoStart,
    AutoStop,
    AutoStatus,
    Reset,
    ResetCounter,
    SetCounter { value: u32 },
    Ai { prompt: String },
    AiReset,
    Help,
}

/// Parse a message body into a command. Returns None for anything that is
/// not a recognized command.
pub fn parse(text: &str) -> Option<Command> {
    let text = text.trim();

    match text {
        "!scan" => return Some(Command::Scan),
        "!list" => return Some(Command::List),
        "!stats" | "!status" => return Some(Command::Stats),
        "!validate" => return Some(Command::Validate),
        "!quickvalidate" => return Some(Command::QuickValidate),
        "!clean" => return Some(Command::Clean),
        "!cleaninvalid" => return Some(Command::CleanInvalid),
        "!clear" => return Some(Command::Clear),
        "!clear confirm" => return Some(Command::ClearConfirm),
        "!send" => return Some(Command::Send(TemplateChoice::Primary)),
        "!send1" => return Some(Command::Send(TemplateChoice::Alt1)),
        "!send2" => return Some(Command::Send(TemplateChoice::Alt2)),
        "!send3" => return Some(Command::Send(TemplateChoice::Alt3)),
        "!test" => return Some(Command::Test),
        "!texts" => return Some(Command::Texts),
        "!autostart" => return Some(Command::AutoStart),
        "!autostop" => return Some(Command::AutoStop),
        "!autostatus" => return Some(Command::AutoStatus),
        "!reset" => return Some(Command::Reset),
        "!resetcounter" => return Some(Command::ResetCounter),
        "!aireset" => return Some(Command::AiReset),
        "!help" => return Some(Command::Help),
        _ => {}
    }

    if let Some(args) = text.strip_prefix("!add ") {
        let mut parts = args.splitn(2, ',');
        let phone = parts.next().unwrap_or("").trim().to_string();
        if phone.is_empty() {
            return None;
        }
        let name = parts
            .next()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);
        return Some(Command::Add { phone, name });
    }

    if let Some(path) = text.strip_prefix("!import ") {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        return Some(Command::Import { path: path.to_string() });
    }

    if let Some(rest) = text.strip_prefix("!batch ") {
        let mut parts = rest.splitn(2, ' ');
        let size: usize = parts.next()?.trim().parse().ok()?;
        let text = parts.next()?.trim().to_string();
        if text.is_empty() {
            return None;
        }
        return Some(Command::Batch { size, text });
    }

    if let Some(value) = text.strip_prefix("!setcounter ") {
        let value: u32 = value.trim().parse().ok()?;
        return Some(Command::SetCounter { value });
    }

    if let Some(body) = text.strip_prefix("!send ") {
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        return Some(Command::SendCustom { text: body.to_string() });
    }

    // "!ai" and its legacy alias "!gpt"
    for prefix in ["!ai ", "!gpt "] {
        if let Some(prompt) = text.strip_prefix(prefix) {
            let prompt = prompt.trim();
            if prompt.is_empty() {
                return None;
            }
            return Some(Command::Ai { prompt: prompt.to_string() });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("!list"), Some(Command::List));
        assert_eq!(parse("  !stats  "), Some(Command::Stats));
        assert_eq!(parse("!status"), Some(Command::Stats));
        assert_eq!(parse("!autostart"), Some(Command::AutoStart));
        assert_eq!(parse("!clear confirm"), Some(Command::ClearConfirm));
    }

    #[test]
    fn test_parse_add() {
        assert_eq!(
            parse("!add +77012345678,Acme Corp"),
            Some(Command::Add { phone: "+77012345678".into(), name: Some("Acme Corp".into()) })
        );
        assert_eq!(
            parse("!add +77012345678"),
            Some(Command::Add { phone: "+77012345678".into(), name: None })
        );
        assert_eq!(parse("!add "), None);
    }

    #[test]
    fn test_parse_send_variants() {
        assert_eq!(parse("!send"), Some(Command::Send(TemplateChoice::Primary)));
        assert_eq!(parse("!send2"), Some(Command::Send(TemplateChoice::Alt2)));
        assert_eq!(
            parse("!send Custom offer text"),
            Some(Command::SendCustom { text: "Custom offer text".into() })
        );
    }

    #[test]
    fn test_parse_batch() {
        assert_eq!(
            parse("!batch 15 Hello there"),
            Some(Command::Batch { size: 15, text: "Hello there".into() })
        );
        assert_eq!(parse("!batch abc Hello"), None);
        assert_eq!(parse("!batch 15"), None);
    }

    #[test]
    fn test_parse_setcounter() {
        assert_eq!(parse("!setcounter 42"), Some(Command::SetCounter { value: 42 }));
        assert_eq!(parse("!setcounter x"), None);
    }

    #[test]
    fn test_parse_ai_aliases() {
        assert_eq!(parse("!ai what time is it"), Some(Command::Ai { prompt: "what time is it".into() }));
        assert_eq!(parse("!gpt hello"), Some(Command::Ai { prompt: "hello".into() }));
        assert_eq!(parse("!ai "), None);
    }

    #[test]
    fn test_parse_rejects_noise() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("!unknown"), None);
        assert_eq!(parse(""), None);
    }
}
