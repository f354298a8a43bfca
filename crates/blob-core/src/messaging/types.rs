/// Commands the bot answers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    /// `/start`: send one random meme.
    Start,
    /// `/daily`: subscribe the chat to a daily meme.
    Daily,
    /// `/stopdaily`: cancel the chat's daily meme.
    StopDaily,
}

impl BotCommand {
    pub const ALL: [BotCommand; 3] = [BotCommand::Start, BotCommand::Daily, BotCommand::StopDaily];

    /// Parse a message text into a command.
    ///
    /// Telegram may send `/cmd@botname arg1 ...`. Arguments are ignored; a
    /// command addressed to another bot is rejected. With no known username
    /// only unaddressed commands are accepted.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let (name, target) = match first.strip_prefix('/')?.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (first.strip_prefix('/')?, None),
        };

        if let Some(target) = target {
            let me = bot_username?.trim_start_matches('@');
            if !target.eq_ignore_ascii_case(me) {
                return None;
            }
        }

        match name.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "daily" => Some(Self::Daily),
            "stopdaily" => Some(Self::StopDaily),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Daily => "daily",
            Self::StopDaily => "stopdaily",
        }
    }

    /// Short description shown in the Telegram command menu.
    pub fn description(self) -> &'static str {
        match self {
            Self::Start => "Get a random Big Boi Blob meme",
            Self::Daily => "Subscribe to a daily blob meme",
            Self::StopDaily => "Unsubscribe from the daily blob meme",
        }
    }
}

/// A photo upload: original file name plus its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingPhoto {
    pub file_name: String,
    pub bytes: Vec<u8>,
}
