//! UCI command parsing.

use std::time::Duration;

use garnet_search::position::move_from_uci;
use garnet_search::Position;

use crate::error::UciError;

/// Parameters of the `go` command. All fields are optional; a bare
/// `go` searches until stopped.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    /// White's remaining time.
    pub wtime: Option<Duration>,
    /// Black's remaining time.
    pub btime: Option<Duration>,
    /// White's increment per move.
    pub winc: Option<Duration>,
    /// Black's increment per move.
    pub binc: Option<Duration>,
    /// Moves until the next time control.
    pub movestogo: Option<u32>,
    /// Search to this depth only.
    pub depth: Option<u8>,
    /// Search for exactly this long.
    pub movetime: Option<Duration>,
    /// Search this many nodes only.
    pub nodes: Option<u64>,
    /// Search until `stop`.
    pub infinite: bool,
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- reset engine state.
    UciNewGame,
    /// `setoption name <K> value <V>`.
    SetOption {
        name: String,
        value: String,
    },
    /// `position` -- set up a board with optional moves applied.
    Position(Box<Position>),
    /// `go` -- start searching.
    Go(GoParams),
    /// `stop` -- halt the current search.
    Stop,
    /// `quit` -- exit the engine.
    Quit,
    /// Anything unrecognized (ignored per UCI convention).
    Unknown(String),
}

/// Parse one line of input.
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "setoption" => parse_setoption(&tokens[1..]),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Parse `setoption name <K> [value <V>]`; both key and value may span
/// several tokens.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.first() != Some(&"name") {
        return Err(UciError::InvalidOption {
            message: "expected 'name' keyword".to_string(),
        });
    }
    let rest = &tokens[1..];
    let split = rest.iter().position(|&t| t == "value").unwrap_or(rest.len());
    let name = rest[..split].join(" ");
    let value = rest.get(split + 1..).unwrap_or(&[]).join(" ");

    if name.is_empty() {
        return Err(UciError::InvalidOption {
            message: "empty option name".to_string(),
        });
    }
    Ok(Command::SetOption { name, value })
}

/// Parse the `position` command:
/// `position (startpos | fen <fen>) [moves <m1> <m2> ...]`.
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (mut position, rest) = if tokens[0] == "startpos" {
        (Position::startpos(), &tokens[1..])
    } else if tokens[0] == "fen" {
        // A FEN is six space-separated fields
        if tokens.len() < 7 {
            return Err(UciError::InvalidFen {
                fen: tokens[1..].join(" "),
            });
        }
        let fen = tokens[1..7].join(" ");
        let position = Position::from_fen(&fen).map_err(|_| UciError::InvalidFen {
            fen: fen.clone(),
        })?;
        (position, &tokens[7..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    if rest.first() == Some(&"moves") {
        for text in &rest[1..] {
            let mv = move_from_uci(position.board(), text).ok_or_else(|| {
                UciError::InvalidMove {
                    uci_move: text.to_string(),
                }
            })?;
            position.make_move(mv);
        }
    }

    Ok(Command::Position(Box::new(position)))
}

/// Parse the `go` command arguments. Unknown tokens are skipped.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();
    let mut rest = tokens.iter();

    while let Some(&token) = rest.next() {
        let mut arg = || numeric_arg(rest.next().copied(), token);
        match token {
            "infinite" => params.infinite = true,
            "wtime" => params.wtime = Some(Duration::from_millis(arg()?)),
            "btime" => params.btime = Some(Duration::from_millis(arg()?)),
            "winc" => params.winc = Some(Duration::from_millis(arg()?)),
            "binc" => params.binc = Some(Duration::from_millis(arg()?)),
            "movetime" => params.movetime = Some(Duration::from_millis(arg()?)),
            "movestogo" => params.movestogo = Some(arg()? as u32),
            "nodes" => params.nodes = Some(arg()?),
            "depth" => {
                // Anything past the search's ply ceiling means "full depth"
                params.depth = Some(u8::try_from(arg()?).unwrap_or(u8::MAX));
            }
            _ => {}
        }
    }

    Ok(Command::Go(params))
}

/// The numeric argument that must follow `param`, if it is there.
fn numeric_arg(token: Option<&str>, param: &str) -> Result<u64, UciError> {
    match token {
        None => Err(UciError::MissingGoValue {
            param: param.to_string(),
        }),
        Some(text) => text.parse().map_err(|_| UciError::InvalidGoValue {
            param: param.to_string(),
            value: text.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_chess::Color;

    #[test]
    fn parse_simple_commands() {
        assert!(matches!(parse_command("uci").unwrap(), Command::Uci));
        assert!(matches!(parse_command("isready").unwrap(), Command::IsReady));
        assert!(matches!(
            parse_command("ucinewgame").unwrap(),
            Command::UciNewGame
        ));
        assert!(matches!(parse_command("stop").unwrap(), Command::Stop));
        assert!(matches!(parse_command("quit").unwrap(), Command::Quit));
    }

    #[test]
    fn parse_position_startpos() {
        let cmd = parse_command("position startpos").unwrap();
        assert!(matches!(cmd, Command::Position(_)));
    }

    #[test]
    fn parse_position_with_moves_updates_side() {
        let cmd = parse_command("position startpos moves e2e4 e7e5 g1f3").unwrap();
        let Command::Position(pos) = cmd else {
            panic!("expected Position");
        };
        assert_eq!(pos.side_to_move(), Color::Black);
    }

    #[test]
    fn parse_position_with_castling_move() {
        let cmd = parse_command(
            "position fen r3k2r/pppq1ppp/2n2n2/3pp3/3PP3/2N2N2/PPPQ1PPP/R3K2R w KQkq - 0 1 \
             moves e1g1",
        )
        .unwrap();
        let Command::Position(pos) = cmd else {
            panic!("expected Position");
        };
        assert_eq!(pos.side_to_move(), Color::Black);
    }

    #[test]
    fn parse_position_fen() {
        let cmd = parse_command(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        )
        .unwrap();
        assert!(matches!(cmd, Command::Position(_)));
    }

    #[test]
    fn parse_position_rejects_bad_input() {
        assert!(parse_command("position").is_err());
        assert!(parse_command("position fen invalid").is_err());
        assert!(parse_command("position startpos moves e2e5").is_err());
    }

    #[test]
    fn parse_go_depth_and_nodes() {
        let Command::Go(params) = parse_command("go depth 6 nodes 5000").unwrap() else {
            panic!("expected Go");
        };
        assert_eq!(params.depth, Some(6));
        assert_eq!(params.nodes, Some(5000));
    }

    #[test]
    fn parse_go_clock() {
        let Command::Go(params) =
            parse_command("go wtime 300000 btime 300000 winc 2000 binc 2000 movestogo 30").unwrap()
        else {
            panic!("expected Go");
        };
        assert_eq!(params.wtime, Some(Duration::from_millis(300_000)));
        assert_eq!(params.binc, Some(Duration::from_millis(2000)));
        assert_eq!(params.movestogo, Some(30));
    }

    #[test]
    fn parse_go_movetime_and_infinite() {
        let Command::Go(params) = parse_command("go movetime 500").unwrap() else {
            panic!("expected Go");
        };
        assert_eq!(params.movetime, Some(Duration::from_millis(500)));

        let Command::Go(params) = parse_command("go infinite").unwrap() else {
            panic!("expected Go");
        };
        assert!(params.infinite);
    }

    #[test]
    fn parse_go_bad_values_error() {
        assert!(parse_command("go wtime").is_err());
        assert!(parse_command("go depth abc").is_err());
    }

    #[test]
    fn parse_go_skips_unknown_tokens() {
        let Command::Go(params) = parse_command("go searchmoves e2e4 depth 3").unwrap() else {
            panic!("expected Go");
        };
        assert_eq!(params.depth, Some(3));
    }

    #[test]
    fn parse_setoption_hash() {
        let Command::SetOption { name, value } =
            parse_command("setoption name Hash value 64").unwrap()
        else {
            panic!("expected SetOption");
        };
        assert_eq!(name, "Hash");
        assert_eq!(value, "64");
    }

    #[test]
    fn parse_setoption_multiword_name() {
        let Command::SetOption { name, value } =
            parse_command("setoption name Clear Hash").unwrap()
        else {
            panic!("expected SetOption");
        };
        assert_eq!(name, "Clear Hash");
        assert!(value.is_empty());
    }

    #[test]
    fn parse_setoption_without_name_errors() {
        assert!(parse_command("setoption Hash 64").is_err());
    }

    #[test]
    fn parse_unknown_and_empty() {
        assert!(matches!(
            parse_command("foobar").unwrap(),
            Command::Unknown(_)
        ));
        assert!(matches!(parse_command("").unwrap(), Command::Unknown(_)));
    }
}
