//! Line commands for the interactive navigator.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::cursor::Cursor;
use crate::error::{AstoundError, Result};
use crate::session::Session;

pub const MENU: &str = "\
Commands:
  A <line,col>   attach the child starting at line,col and move onto it
  A <path>       link another source file as a child and move onto it
  L <path>       link another source file as a child without moving
  D <key>        move to an attached child (attaching a line,col key if new)
  U              move up to the parent
  C              show the cursor state
  P node         print the current node's source
  P <a,b>        print source lines a..=b
  P tree         print the attached tree
  S              summarize from the current node
  M              show this menu
  Q              quit";

pub const PROMPT: &str = "A/L/D/U/C/P/S/M/Q> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Attach(String),
    AttachSource(String),
    Link(String),
    Down(String),
    Up,
    Cursor,
    PrintNode,
    PrintLines(usize, usize),
    PrintTree,
    Summarize,
    Menu,
    Quit,
}

pub enum Outcome {
    Continue(String),
    Quit,
}

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+),(\d+)$").expect("location pattern is valid"))
}

/// Spaces and quotes carry no meaning in commands.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .collect()
}

pub fn parse_command(input: &str) -> Result<Command> {
    let line = normalize(input);
    let invalid = || AstoundError::InvalidCommand(input.trim().to_string());

    let mut chars = line.chars();
    let Some(letter) = chars.next() else {
        return Err(invalid());
    };
    let arg = chars.as_str();

    let cmd = match (letter.to_ascii_uppercase(), arg) {
        ('A', "") | ('L', "") | ('D', "") | ('P', "") => return Err(invalid()),
        ('A', arg) if location_re().is_match(arg) => Command::Attach(arg.to_string()),
        ('A', arg) => Command::AttachSource(arg.to_string()),
        ('L', arg) => Command::Link(arg.to_string()),
        ('D', arg) => Command::Down(arg.to_string()),
        ('P', arg) if arg.eq_ignore_ascii_case("node") => Command::PrintNode,
        ('P', arg) if arg.eq_ignore_ascii_case("tree") => Command::PrintTree,
        ('P', arg) => {
            let caps = location_re().captures(arg).ok_or_else(invalid)?;
            let start: usize = caps[1].parse().map_err(|_| invalid())?;
            let end: usize = caps[2].parse().map_err(|_| invalid())?;
            if start == 0 || start > end {
                return Err(invalid());
            }
            Command::PrintLines(start, end)
        }
        ('U', "") => Command::Up,
        ('C', "") => Command::Cursor,
        ('S', "") => Command::Summarize,
        ('M', "") => Command::Menu,
        ('Q', "") => Command::Quit,
        _ => return Err(invalid()),
    };
    Ok(cmd)
}

/// Run one command. Navigation commands print the new cursor state.
pub fn execute(cursor: &mut Cursor, session: &Session, command: Command) -> Result<Outcome> {
    let output = match command {
        Command::Attach(key) => {
            cursor.attach(&key, session)?;
            cursor.report(session)?
        }
        Command::AttachSource(path) => {
            check_source_path(&path)?;
            cursor.link_source_and_descend(&path)?;
            cursor.report(session)?
        }
        Command::Link(path) => {
            check_source_path(&path)?;
            cursor.link_source(&path)?;
            cursor.report(session)?
        }
        Command::Down(key) => {
            cursor.down(&key, session)?;
            cursor.report(session)?
        }
        Command::Up => {
            cursor.up()?;
            cursor.report(session)?
        }
        Command::Cursor => cursor.report(session)?,
        Command::PrintNode => cursor.node_text(),
        Command::PrintLines(start, end) => cursor.view_lines(start, end),
        Command::PrintTree => cursor.render_tree(),
        Command::Summarize => cursor.summarize(session)?,
        Command::Menu => MENU.to_string(),
        Command::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Continue(output))
}

fn check_source_path(path: &str) -> Result<()> {
    if Path::new(path).is_file() {
        Ok(())
    } else {
        Err(AstoundError::InvalidCommand(format!("'{path}' is not a file")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_and_paths() {
        assert_eq!(parse_command("A 3, 4").unwrap(), Command::Attach("3,4".into()));
        assert_eq!(
            parse_command("a 'lib/util.py'").unwrap(),
            Command::AttachSource("lib/util.py".into())
        );
        assert_eq!(parse_command("L util.py").unwrap(), Command::Link("util.py".into()));
        assert_eq!(parse_command("D helper").unwrap(), Command::Down("helper".into()));
    }

    #[test]
    fn print_variants() {
        assert_eq!(parse_command("P node").unwrap(), Command::PrintNode);
        assert_eq!(parse_command("p TREE").unwrap(), Command::PrintTree);
        assert_eq!(parse_command("P 2, 9").unwrap(), Command::PrintLines(2, 9));
        assert!(parse_command("P 9,2").is_err());
        assert!(parse_command("P 0,2").is_err());
        assert!(parse_command("P nodes").is_err());
    }

    #[test]
    fn bare_letters() {
        assert_eq!(parse_command(" u ").unwrap(), Command::Up);
        assert_eq!(parse_command("C").unwrap(), Command::Cursor);
        assert_eq!(parse_command("S").unwrap(), Command::Summarize);
        assert_eq!(parse_command("M").unwrap(), Command::Menu);
        assert_eq!(parse_command("q").unwrap(), Command::Quit);
    }

    #[test]
    fn malformed_input_is_a_typed_error() {
        for input in ["", "   ", "A", "U 1", "X", "Q now"] {
            assert!(
                matches!(parse_command(input), Err(AstoundError::InvalidCommand(_))),
                "{input:?} should be rejected"
            );
        }
    }
}
