//! Collaborators living in child processes, spoken to over newline-delimited
//! JSON on stdin/stdout. The child's stderr is inherited.
//!
//! Scraper and markup parser protocol, one reply per request:
//!
//! ```text
//! > {"op":"scrape","url":"..."}                 < {"ok":<page>} | {"error":"..."}
//! > {"op":"parse","url":"...","markup":"..."}   < {"ok":<document>} | {"error":"..."}
//! ```
//!
//! Engine protocol; the engine may ask any number of questions before it
//! answers with outcomes:
//!
//! ```text
//! > {"op":"evaluate","rule":"R2","page":<page>,"oracle":true}
//! < {"question":{"uri":"...","type":"boolean","subject":...}}
//! > {"answer":<answer>|null}
//! < {"outcomes":[{"rule":"R2","outcome":"passed"}]} | {"error":"..."}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use actc_error::{HarnessError, Result};
use actc_types::{Answer, PageSnapshot, Question};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::{Engine, EngineOutcome};
use crate::fetch::{MarkupParser, Scraper, ScraperFactory};
use crate::oracle::Oracle;

/// Command line of a collaborator process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// A running child process with a JSON-lines conversation on its pipes.
/// Dropping the channel kills the child if it is still running.
pub struct LineChannel {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl LineChannel {
    pub fn spawn(command: &CommandSpec) -> Result<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| HarnessError::config(format!("cannot start {}: {err}", command.program)))?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::internal("child stdout was not captured"))?;
        debug!(program = %command.program, pid = child.id(), "collaborator started");
        Ok(Self {
            program: command.program.clone(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    pub fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let mut line = serde_json::to_string(message)
            .map_err(|err| HarnessError::json(format!("request to {}", self.program), err))?;
        line.push('\n');
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| HarnessError::protocol(format!("{} input is already closed", self.program)))?;
        stdin.write_all(line.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    pub fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(HarnessError::protocol(format!(
                "{} closed its output",
                self.program
            )));
        }
        serde_json::from_str(line.trim_end())
            .map_err(|err| HarnessError::protocol(format!("unreadable reply from {}: {err}", self.program)))
    }

    /// Close stdin and wait for the child to exit.
    pub fn shutdown(mut self) -> Result<()> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            warn!(program = %self.program, %status, "collaborator exited unsuccessfully");
        }
        Ok(())
    }
}

impl Drop for LineChannel {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Reply<T> {
    Ok(T),
    Error(String),
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ScraperRequest<'a> {
    Scrape { url: &'a str },
    Parse { url: &'a str, markup: &'a str },
}

/// Starts one scraper process per fetch phase.
#[derive(Debug, Clone)]
pub struct ProcessScraperFactory {
    command: CommandSpec,
}

impl ProcessScraperFactory {
    pub const fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl ScraperFactory for ProcessScraperFactory {
    fn open(&mut self) -> Result<Box<dyn Scraper>> {
        let channel = LineChannel::spawn(&self.command)?;
        Ok(Box::new(ProcessScraper {
            channel: Some(channel),
        }))
    }
}

pub struct ProcessScraper {
    channel: Option<LineChannel>,
}

impl Scraper for ProcessScraper {
    fn scrape(&mut self, url: &str) -> Result<PageSnapshot> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| HarnessError::scrape(url, "scraper is closed"))?;
        channel
            .send(&ScraperRequest::Scrape { url })
            .and_then(|()| channel.receive::<Reply<Value>>())
            .map_err(|err| HarnessError::scrape(url, err))
            .and_then(|reply| match reply {
                Reply::Ok(page) => Ok(PageSnapshot::new(page)),
                Reply::Error(message) => Err(HarnessError::scrape(url, message)),
            })
    }

    fn close(&mut self) -> Result<()> {
        self.channel.take().map_or(Ok(()), LineChannel::shutdown)
    }
}

/// Standalone markup parser, kept alive for the whole fetch.
pub struct ProcessMarkupParser {
    channel: LineChannel,
}

impl ProcessMarkupParser {
    pub fn spawn(command: &CommandSpec) -> Result<Self> {
        Ok(Self {
            channel: LineChannel::spawn(command)?,
        })
    }

    pub fn shutdown(self) -> Result<()> {
        self.channel.shutdown()
    }
}

impl MarkupParser for ProcessMarkupParser {
    fn parse_document(&mut self, markup: &str, url: &str) -> Result<Value> {
        self.channel.send(&ScraperRequest::Parse { url, markup })?;
        match self.channel.receive::<Reply<Value>>()? {
            Reply::Ok(document) => Ok(document),
            Reply::Error(message) => Err(HarnessError::scrape(url, message)),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum EngineRequest<'a> {
    Evaluate {
        rule: &'a str,
        page: &'a PageSnapshot,
        oracle: bool,
    },
}

#[derive(Serialize)]
struct AnswerMessage<'a> {
    answer: Option<&'a Answer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EngineMessage {
    Question(Question),
    Outcomes(Vec<EngineOutcome>),
    Error(String),
}

/// Evaluation engine in a long-lived child process.
pub struct ProcessEngine {
    channel: LineChannel,
}

impl ProcessEngine {
    pub fn spawn(command: &CommandSpec) -> Result<Self> {
        Ok(Self {
            channel: LineChannel::spawn(command)?,
        })
    }

    pub fn shutdown(self) -> Result<()> {
        self.channel.shutdown()
    }
}

impl Engine for ProcessEngine {
    fn evaluate(
        &mut self,
        page: &PageSnapshot,
        rule: &str,
        mut oracle: Option<&mut dyn Oracle>,
    ) -> Result<Vec<EngineOutcome>> {
        self.channel.send(&EngineRequest::Evaluate {
            rule,
            page,
            oracle: oracle.is_some(),
        })?;
        loop {
            match self.channel.receive::<EngineMessage>()? {
                EngineMessage::Question(question) => {
                    let answer = match oracle.as_mut() {
                        Some(oracle) => oracle.answer(&question)?,
                        None => None,
                    };
                    self.channel.send(&AnswerMessage {
                        answer: answer.as_ref(),
                    })?;
                }
                EngineMessage::Outcomes(outcomes) => return Ok(outcomes),
                EngineMessage::Error(message) => return Err(HarnessError::engine(message)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use actc_types::AnswerKind;
    use serde_json::json;

    use super::*;

    #[test]
    fn request_wire_shapes() {
        let scrape = serde_json::to_value(ScraperRequest::Scrape { url: "https://a.org/" }).expect("encode");
        assert_eq!(scrape, json!({ "op": "scrape", "url": "https://a.org/" }));
        let page = PageSnapshot::new(json!({ "document": {} }));
        let evaluate = serde_json::to_value(EngineRequest::Evaluate {
            rule: "R2",
            page: &page,
            oracle: false,
        })
        .expect("encode");
        assert_eq!(
            evaluate,
            json!({ "op": "evaluate", "rule": "R2", "page": { "document": {} }, "oracle": false })
        );
        let unknown = serde_json::to_value(AnswerMessage { answer: None }).expect("encode");
        assert_eq!(unknown, json!({ "answer": null }));
    }

    #[test]
    fn engine_messages_decode() {
        let question: EngineMessage = serde_json::from_value(json!({
            "question": { "uri": "has-audio", "type": "boolean" }
        }))
        .expect("question decodes");
        assert!(matches!(question, EngineMessage::Question(ref q) if q.kind == AnswerKind::Boolean));
        let outcomes: EngineMessage =
            serde_json::from_value(json!({ "outcomes": [{ "rule": "R2", "outcome": "failed" }] }))
                .expect("outcomes decode");
        assert!(matches!(outcomes, EngineMessage::Outcomes(ref list) if list.len() == 1));
        let reply: Reply<Value> = serde_json::from_value(json!({ "error": "timeout" })).expect("reply");
        assert!(matches!(reply, Reply::Error(ref message) if message == "timeout"));
    }

    #[test]
    fn missing_program_is_a_config_error() {
        let result = LineChannel::spawn(&CommandSpec::new("/nonexistent/actc-collaborator", Vec::new()));
        assert!(matches!(result, Err(HarnessError::Config { .. })));
    }
}
