use playback::{ControlMessage, DownloadKind, UserAction};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
<url>            open a page; watch pages and .m3u8 manifests play natively
p                play / pause
+N, -N           seek N seconds forward / back
seek N           seek to N seconds
scrub            press the seek bar
drag N           drag it to N seconds
release N        release it at N seconds
back             stop playback and return to browsing
dl video|audio   download the current video
vol N            volume 0-100
mute             toggle mute
quit";

#[derive(Debug)]
pub enum Command {
    Message(ControlMessage),
    Help,
    Invalid(String),
}

fn seconds(arg: Option<&str>) -> Option<u64> {
    let value: f64 = arg?.parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some((value * 1000.0) as u64)
    } else {
        None
    }
}

fn offset(arg: &str, sign: i64) -> Option<i64> {
    let ms = i64::try_from(seconds(Some(arg))?).unwrap_or(i64::MAX);
    Some(sign * ms)
}

fn user(action: UserAction) -> Command {
    Command::Message(ControlMessage::User(action))
}

pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.contains("://") {
        return Some(Command::Message(ControlMessage::Navigation(line.to_string())));
    }

    let mut words = line.split_whitespace();
    let head = words.next()?;
    let arg = words.next();
    let invalid = || Command::Invalid(line.to_string());

    let command = match head {
        "p" | "pause" | "play" => user(UserAction::TogglePlayPause),
        "seek" => seconds(arg).map_or_else(invalid, |ms| user(UserAction::SeekAbsolute(ms))),
        "scrub" => user(UserAction::ScrubBegin),
        "drag" => seconds(arg).map_or_else(invalid, |ms| user(UserAction::ScrubDrag(ms))),
        "release" => seconds(arg).map_or_else(invalid, |ms| user(UserAction::ScrubEnd(ms))),
        "back" => user(UserAction::Back),
        "dl" => match arg {
            Some("video") => user(UserAction::Download(DownloadKind::Video)),
            Some("audio") => user(UserAction::Download(DownloadKind::Audio)),
            _ => invalid(),
        },
        "vol" => match arg.and_then(|v| v.parse::<u8>().ok()) {
            Some(volume) if volume <= 100 => user(UserAction::SetVolume(volume)),
            _ => invalid(),
        },
        "mute" => user(UserAction::ToggleMute),
        "quit" | "exit" | "q" => Command::Message(ControlMessage::Shutdown),
        "help" | "?" => Command::Help,
        _ => match (head.strip_prefix('+'), head.strip_prefix('-')) {
            (Some(n), _) => offset(n, 1)
                .map_or_else(invalid, |ms| user(UserAction::SeekRelative(ms))),
            (_, Some(n)) => offset(n, -1)
                .map_or_else(invalid, |ms| user(UserAction::SeekRelative(ms))),
            _ => invalid(),
        },
    };
    Some(command)
}

/// Feeds stdin lines into the control queue until `quit` or end of input.
pub async fn read_stdin(queue: mpsc::UnboundedSender<ControlMessage>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("[console]Failed to read stdin: {}", e);
                break;
            }
        };
        match parse_line(&line) {
            Some(Command::Message(ControlMessage::Shutdown)) => break,
            Some(Command::Message(message)) => {
                if queue.send(message).is_err() {
                    return;
                }
            }
            Some(Command::Help) => println!("{}", HELP),
            Some(Command::Invalid(line)) => println!("unknown command: {} (try help)", line),
            None => {}
        }
    }
    let _ = queue.send(ControlMessage::Shutdown);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(line: &str) -> UserAction {
        match parse_line(line) {
            Some(Command::Message(ControlMessage::User(action))) => action,
            other => panic!("{line:?} parsed to {other:?}"),
        }
    }

    #[test]
    fn test_urls_are_navigation() {
        assert!(matches!(
            parse_line("  https://www.youtube.com/watch?v=abc "),
            Some(Command::Message(ControlMessage::Navigation(url))) if url == "https://www.youtube.com/watch?v=abc"
        ));
    }

    #[test]
    fn test_playback_commands() {
        assert_eq!(action("p"), UserAction::TogglePlayPause);
        assert_eq!(action("+10"), UserAction::SeekRelative(10_000));
        assert_eq!(action("-2.5"), UserAction::SeekRelative(-2_500));
        assert_eq!(action("seek 90"), UserAction::SeekAbsolute(90_000));
        assert_eq!(action("scrub"), UserAction::ScrubBegin);
        assert_eq!(action("drag 30"), UserAction::ScrubDrag(30_000));
        assert_eq!(action("release 120"), UserAction::ScrubEnd(120_000));
        assert_eq!(action("dl audio"), UserAction::Download(DownloadKind::Audio));
        assert_eq!(action("vol 40"), UserAction::SetVolume(40));
        assert_eq!(action("back"), UserAction::Back);
    }

    #[test]
    fn test_huge_offsets_saturate() {
        assert_eq!(action("+1e300"), UserAction::SeekRelative(i64::MAX));
        assert_eq!(action("-1e300"), UserAction::SeekRelative(-i64::MAX));
        assert_eq!(action("seek 1e300"), UserAction::SeekAbsolute(u64::MAX));
    }

    #[test]
    fn test_bad_input() {
        assert!(parse_line("   ").is_none());
        assert!(matches!(parse_line("seek"), Some(Command::Invalid(_))));
        assert!(matches!(parse_line("vol 300"), Some(Command::Invalid(_))));
        assert!(matches!(parse_line("dl"), Some(Command::Invalid(_))));
        assert!(matches!(parse_line("+x"), Some(Command::Invalid(_))));
        assert!(matches!(parse_line("jump"), Some(Command::Invalid(_))));
        assert!(matches!(
            parse_line("quit"),
            Some(Command::Message(ControlMessage::Shutdown))
        ));
    }
}
