//! Operator command parsing.
//!
//! One command per line. Arguments are separated by whitespace and may be
//! double-quoted. A selector argument can list fallbacks separated by `||`.

use regex::Regex;
use url::Url;

use webpilot_core::{ActionRequest, CandidateSelectors, Error, Key, Result};

const SEARCH_URL: &str = "https://duckduckgo.com/";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run an action through the recovery pipeline
    Action(ActionRequest),
    /// Print the metrics snapshot
    Status,
    /// Print recognized commands
    Help,
    /// Zero the metrics
    Reset,
    /// Establish a new session
    Reconnect,
    /// Release the session and stop
    Quit,
    /// Blank line
    Empty,
}

/// Turns input lines into [`Command`]s.
#[derive(Debug, Clone)]
pub struct CommandParser {
    token: Regex,
}

impl CommandParser {
    /// Create a parser.
    pub fn new() -> Result<Self> {
        let token = Regex::new(r#""([^"]*)"|(\S+)"#)
            .map_err(|e| Error::Other(format!("invalid tokenizer pattern: {e}")))?;
        Ok(Self { token })
    }

    /// Parse one line. Unknown verbs and bad arguments yield `Error::Parse`.
    pub fn parse(&self, line: &str) -> Result<Command> {
        let tokens = self.tokenize(line);
        let Some((verb, args)) = tokens.split_first() else {
            return Ok(Command::Empty);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "navigate" | "goto" => {
                let [url] = exactly::<1>("navigate <url>", args)?;
                Command::Action(ActionRequest::navigate(url))
            }
            "search" => {
                if args.is_empty() {
                    return Err(usage("search <query>"));
                }
                Command::Action(ActionRequest::navigate(search_url(&args.join(" "))?))
            }
            "click" => {
                let [selector] = exactly::<1>("click <selector>", args)?;
                Command::Action(ActionRequest::click(selectors(&selector)?))
            }
            "type" => {
                if args.len() < 2 {
                    return Err(usage("type <selector> <text>"));
                }
                Command::Action(ActionRequest::type_text(
                    selectors(&args[0])?,
                    args[1..].join(" "),
                ))
            }
            "find" => {
                let [selector] = exactly::<1>("find <selector>", args)?;
                Command::Action(ActionRequest::Find {
                    selectors: selectors(&selector)?,
                    timeout: None,
                })
            }
            "read" => match args {
                [selector] => Command::Action(ActionRequest::read(selectors(selector)?)),
                [selector, attribute] => Command::Action(ActionRequest::Read {
                    selectors: selectors(selector)?,
                    attribute: Some(attribute.clone()),
                    timeout: None,
                }),
                _ => return Err(usage("read <selector> [attribute]")),
            },
            "press" => {
                let [selector, key] = exactly::<2>("press <selector> <key>", args)?;
                let key = Key::parse(&key).map_err(|e| Error::Parse(e.to_string()))?;
                Command::Action(ActionRequest::PressKey {
                    selectors: selectors(&selector)?,
                    key,
                    timeout: None,
                })
            }
            "screenshot" => no_args("screenshot", args, Command::Action(ActionRequest::Screenshot))?,
            "info" => no_args("info", args, Command::Action(ActionRequest::PageInfo))?,
            "analyze" => no_args("analyze", args, Command::Action(ActionRequest::Analyze))?,
            "status" => no_args("status", args, Command::Status)?,
            "help" | "?" => Command::Help,
            "reset" => no_args("reset", args, Command::Reset)?,
            "reconnect" => no_args("reconnect", args, Command::Reconnect)?,
            "quit" | "exit" | "q" => Command::Quit,
            other => {
                return Err(Error::Parse(format!(
                    "unknown command '{other}', type 'help' for a list"
                )))
            }
        };

        Ok(command)
    }

    fn tokenize(&self, line: &str) -> Vec<String> {
        self.token
            .captures_iter(line)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

fn usage(form: &str) -> Error {
    Error::Parse(format!("usage: {form}"))
}

fn exactly<const N: usize>(form: &str, args: &[String]) -> Result<[String; N]> {
    <[String; N]>::try_from(args.to_vec()).map_err(|_| usage(form))
}

fn no_args(verb: &str, args: &[String], command: Command) -> Result<Command> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(Error::Parse(format!("'{verb}' takes no arguments")))
    }
}

fn selectors(arg: &str) -> Result<CandidateSelectors> {
    CandidateSelectors::new(arg.split("||")).map_err(|e| Error::Parse(e.to_string()))
}

/// DuckDuckGo results URL for a free-text query.
pub fn search_url(query: &str) -> Result<String> {
    Url::parse_with_params(SEARCH_URL, &[("q", query)])
        .map(String::from)
        .map_err(|e| Error::Parse(format!("cannot build search URL: {e}")))
}
