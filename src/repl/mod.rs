use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fmt::Write as _;

use crate::raft::NodeId;
use crate::sim::{Controller, Snapshot};

/// Upper bound for a single `step n`.
pub const MAX_STEPS: u64 = 100_000;

const HELP: &str = "\
Commands:
  start            run the scheduler
  pause            stop the scheduler
  step [n]         run n steps now (default 1, at most 100000)
  write <value>    submit a client command to the leader
  toggle <id>      power a node off or back on (ids start at 0)
  reset [n]        rebuild the cluster, optionally with n nodes
  status           show nodes
  messages         show messages in flight
  events           show the event log
  json             dump the full snapshot as JSON
  help             show this text
  exit             quit";

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Start,
    Pause,
    Step(u64),
    Write(String),
    Toggle(NodeId),
    Reset(Option<usize>),
    Status,
    Messages,
    Events,
    Json,
    Help,
    Exit,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "start" | "run" => ReplCommand::Start,
            "pause" | "stop" => ReplCommand::Pause,
            "step" => {
                if rest.is_empty() {
                    ReplCommand::Step(1)
                } else {
                    let n = rest
                        .parse::<u64>()
                        .map_err(|_| format!("invalid step count: {rest}"))?;
                    if n > MAX_STEPS {
                        return Err(format!("step count {n} exceeds {MAX_STEPS}"));
                    }
                    ReplCommand::Step(n)
                }
            }
            "write" | "send" => {
                if rest.is_empty() {
                    return Err("write needs a value, e.g. `write x=1`".to_string());
                }
                ReplCommand::Write(rest.to_string())
            }
            "toggle" | "power" => {
                let id = rest
                    .parse::<NodeId>()
                    .map_err(|_| format!("invalid node id: {rest:?}"))?;
                ReplCommand::Toggle(id)
            }
            "reset" | "init" => {
                if rest.is_empty() {
                    ReplCommand::Reset(None)
                } else {
                    let n = rest
                        .parse::<usize>()
                        .map_err(|_| format!("invalid cluster size: {rest}"))?;
                    ReplCommand::Reset(Some(n))
                }
            }
            "status" | "nodes" => ReplCommand::Status,
            "messages" | "msgs" => ReplCommand::Messages,
            "events" | "log" => ReplCommand::Events,
            "json" => ReplCommand::Json,
            "help" | "?" => ReplCommand::Help,
            "exit" | "quit" => ReplCommand::Exit,
            other => return Err(format!("unknown command: {other} (try `help`)")),
        };
        Ok(command)
    }
}

pub fn render_status(snap: &Snapshot) -> String {
    let mut out = String::new();
    let state = if snap.running { "running" } else { "paused" };
    let leader = snap
        .leader
        .map(|id| format!("S{}", id + 1))
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "tick {} ({state}), leader {leader}", snap.tick);

    let header_width = 10;
    for col in ["node", "role", "term", "voted", "log", "commit", "timer"] {
        let _ = write!(out, "{col:header_width$}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "-".repeat(header_width * 7));

    for node in &snap.nodes {
        let voted = node
            .voted_for
            .map(|id| format!("S{}", id + 1))
            .unwrap_or_else(|| "-".to_string());
        let timer = format!("{}/{}", node.election_timer, node.election_timeout);
        let cells = [
            format!("S{}", node.id + 1),
            node.role.to_string(),
            node.current_term.to_string(),
            voted,
            node.log.len().to_string(),
            node.commit_index.to_string(),
            timer,
        ];
        for cell in cells {
            let _ = write!(out, "{cell:header_width$}");
        }
        let _ = writeln!(out);
    }
    out
}

pub fn render_messages(snap: &Snapshot) -> String {
    if snap.messages.is_empty() {
        return "no messages in flight\n".to_string();
    }

    let mut out = String::new();
    for msg in &snap.messages {
        let _ = writeln!(
            out,
            "#{:<6} {:<22} S{} -> S{}  term {:<4} {:>5.1}%",
            msg.id,
            msg.kind().to_string(),
            msg.from + 1,
            msg.to + 1,
            msg.term,
            msg.progress
        );
    }
    out
}

pub fn render_events(snap: &Snapshot) -> String {
    let mut out = String::new();
    for event in &snap.events {
        let _ = writeln!(
            out,
            "[tick {:>6}] {:<8} {}",
            event.tick,
            event.severity.to_string(),
            event.message
        );
    }
    out
}

pub struct Repl {
    controller: Controller,
    rl: DefaultEditor,
}

impl Repl {
    pub fn new(controller: Controller) -> rustyline::Result<Self> {
        Ok(Self {
            controller,
            rl: DefaultEditor::new()?,
        })
    }

    /// Applies one command. Returns false when the REPL should exit.
    fn execute(&mut self, command: ReplCommand) -> bool {
        match command {
            ReplCommand::Start => {
                if !self.controller.start() {
                    println!("already running");
                }
            }
            ReplCommand::Pause => {
                if !self.controller.pause() {
                    println!("already paused");
                }
            }
            ReplCommand::Step(n) => {
                let tick = self.controller.step(n);
                println!("tick {tick}");
            }
            ReplCommand::Write(value) => match self.controller.submit_client_command(&value) {
                Ok(index) => println!("appended at index {index}"),
                Err(e) => eprintln!("Error: {e}"),
            },
            ReplCommand::Toggle(id) => match self.controller.toggle_power(id) {
                Ok(role) => println!("S{} is now {role}", id + 1),
                Err(e) => eprintln!("Error: {e}"),
            },
            ReplCommand::Reset(size) => match self.controller.reset(size) {
                Ok(()) => print!("{}", render_status(&self.controller.snapshot())),
                Err(e) => eprintln!("Error: {e}"),
            },
            ReplCommand::Status => print!("{}", render_status(&self.controller.snapshot())),
            ReplCommand::Messages => print!("{}", render_messages(&self.controller.snapshot())),
            ReplCommand::Events => print!("{}", render_events(&self.controller.snapshot())),
            ReplCommand::Json => match self.controller.snapshot().to_json() {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error: {e}"),
            },
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Exit => return false,
        }
        true
    }

    pub async fn run(&mut self) {
        println!("Welcome to raftsim");
        println!("Enter commands or 'help'; 'exit' to quit");

        loop {
            let readline = self.rl.readline("raftsim> ");
            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    let _ = self.rl.add_history_entry(line.as_str());

                    match ReplCommand::parse(&line) {
                        Ok(command) => {
                            if !self.execute(command) {
                                println!("Goodbye!");
                                break;
                            }
                        }
                        Err(e) => eprintln!("Error: {e}"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        self.controller.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::raft::FixedTimeouts;
    use crate::sim::Simulation;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(ReplCommand::parse("start"), Ok(ReplCommand::Start));
        assert_eq!(ReplCommand::parse("  PAUSE "), Ok(ReplCommand::Pause));
        assert_eq!(ReplCommand::parse("step"), Ok(ReplCommand::Step(1)));
        assert_eq!(ReplCommand::parse("step 40"), Ok(ReplCommand::Step(40)));
        assert_eq!(
            ReplCommand::parse("write x = 1"),
            Ok(ReplCommand::Write("x = 1".to_string()))
        );
        assert_eq!(ReplCommand::parse("toggle 2"), Ok(ReplCommand::Toggle(2)));
        assert_eq!(ReplCommand::parse("reset"), Ok(ReplCommand::Reset(None)));
        assert_eq!(ReplCommand::parse("reset 7"), Ok(ReplCommand::Reset(Some(7))));
        assert_eq!(ReplCommand::parse("quit"), Ok(ReplCommand::Exit));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(ReplCommand::parse("write").is_err());
        assert!(ReplCommand::parse("toggle S1").is_err());
        assert!(ReplCommand::parse("step -3").is_err());
        assert!(ReplCommand::parse("elect").is_err());
    }

    #[test]
    fn step_count_is_capped() {
        assert_eq!(
            ReplCommand::parse(&format!("step {MAX_STEPS}")),
            Ok(ReplCommand::Step(MAX_STEPS))
        );
        assert!(ReplCommand::parse("step 100001").is_err());
        assert!(ReplCommand::parse("step 18446744073709551615").is_err());
    }

    #[test]
    fn status_table_lists_every_node() {
        let sim = Simulation::with_timeouts(SimConfig::default(), Box::new(FixedTimeouts::new()))
            .expect("simulation");
        let text = render_status(&sim.snapshot(false));

        assert!(text.starts_with("tick 0 (paused), leader S1"));
        for label in ["S1", "S2", "S3", "S4", "S5"] {
            assert!(text.contains(label), "missing {label} in\n{text}");
        }
        assert!(text.contains("Leader"));
    }

    #[test]
    fn empty_message_list_is_reported() {
        let sim = Simulation::with_timeouts(SimConfig::default(), Box::new(FixedTimeouts::new()))
            .expect("simulation");
        assert_eq!(render_messages(&sim.snapshot(false)), "no messages in flight\n");
        assert!(render_events(&sim.snapshot(false)).contains("Cluster initialized"));
    }
}
