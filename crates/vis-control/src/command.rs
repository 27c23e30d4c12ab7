//! Subscriber command grammar.

use tracing::debug;

/// A parsed subscriber command. Unrecognized text and out-of-set argument
/// values never produce a variant here — [`Command::parse`] returns `None`
/// for them, and the caller silently drops the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetSources,
    SetSource(String),
    SetFps(u32),
    SetFreqMax(u32),
    SetBarCount(usize),
}

impl Command {
    /// Parse one text command. Returns `None` for unknown commands and for
    /// known commands whose argument is out of the valid set — both are
    /// silently ignored on the wire (no JSON reply), but logged at `debug`
    /// for diagnostics per spec §7 ("stderr is not part of the contract").
    pub fn parse(text: &str) -> Option<Command> {
        let trimmed = text.trim();

        if trimmed == "GET_SOURCES" {
            return Some(Command::GetSources);
        }

        let Some((head, arg)) = trimmed.split_once(':') else {
            debug!(%text, "dropping unrecognized command");
            return None;
        };

        let parsed = match head {
            "SET_SOURCE" => Some(Command::SetSource(arg.to_string())),
            "SET_FPS" => arg
                .parse::<u32>()
                .ok()
                .filter(|&n| vis_dsp::is_valid_fps(n))
                .map(Command::SetFps),
            "SET_FREQ_MAX" => arg
                .parse::<u32>()
                .ok()
                .filter(|&hz| vis_dsp::is_valid_freq_max(hz))
                .map(Command::SetFreqMax),
            "SET_BAR_COUNT" => arg
                .parse::<usize>()
                .ok()
                .filter(|&k| vis_dsp::is_valid_bar_count(k))
                .map(Command::SetBarCount),
            _ => None,
        };

        if parsed.is_none() {
            debug!(%text, "dropping unknown or out-of-set command");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_sources() {
        assert_eq!(Command::parse("GET_SOURCES"), Some(Command::GetSources));
    }

    #[test]
    fn parses_set_source_with_arbitrary_name() {
        assert_eq!(
            Command::parse("SET_SOURCE:alsa_output.pci-0000_00_1f.3.analog-stereo.monitor"),
            Some(Command::SetSource(
                "alsa_output.pci-0000_00_1f.3.analog-stereo.monitor".to_string()
            ))
        );
    }

    #[test]
    fn rejects_out_of_set_bar_count() {
        assert_eq!(Command::parse("SET_BAR_COUNT:50"), None);
    }

    #[test]
    fn accepts_in_set_bar_count() {
        assert_eq!(Command::parse("SET_BAR_COUNT:16"), Some(Command::SetBarCount(16)));
    }

    #[test]
    fn rejects_unknown_command() {
        assert_eq!(Command::parse("PLAY_MUSIC"), None);
    }

    #[test]
    fn rejects_non_numeric_fps_argument() {
        assert_eq!(Command::parse("SET_FPS:abc"), None);
    }
}
