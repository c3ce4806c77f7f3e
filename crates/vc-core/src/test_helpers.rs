// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test doubles shared by the backend crates' tests

use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::sync::Mutex;

use crate::error::{VcError, VcResult};
use crate::process::{ProcessCommand, ProcessOutput, ProcessRunner};

/// A [`ProcessRunner`] that replays canned output per program name and
/// records every invocation.
///
/// Responses for one program are consumed in order; the last one keeps
/// answering until a newer response is queued. A program with no response
/// behaves like a missing binary.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<ProcessCommand>>,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<ProcessOutput>,
    /// The front entry has been replayed at least once
    replayed: bool,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, program: &str, output: ProcessOutput) -> &Self {
        let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        let script = responses.entry(program.to_string()).or_default();
        if script.replayed {
            script.queue.clear();
            script.replayed = false;
        }
        script.queue.push_back(output);
        self
    }

    /// Answer `program` with `stdout` and exit status 0.
    pub fn respond_stdout(&self, program: &str, stdout: &str) -> &Self {
        self.respond_status(program, stdout, 0)
    }

    pub fn respond_status(&self, program: &str, stdout: &str, status: i32) -> &Self {
        self.respond(
            program,
            ProcessOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
                status: Some(status),
            },
        )
    }

    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<ProcessCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.program_name() == program)
            .collect()
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.calls_to(program).len()
    }

    fn next_output(&self, command: &ProcessCommand) -> VcResult<ProcessOutput> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(command.clone());

        let program = command.program_name();
        let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        match responses.get_mut(&program) {
            Some(script) if script.queue.len() > 1 => {
                Ok(script.queue.pop_front().unwrap_or_default())
            }
            Some(script) if !script.queue.is_empty() => {
                script.replayed = true;
                Ok(script.queue[0].clone())
            }
            _ => Err(VcError::Spawn {
                program,
                source: io::Error::new(io::ErrorKind::NotFound, "no scripted response"),
            }),
        }
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, command: &ProcessCommand) -> VcResult<ProcessOutput> {
        self.next_output(command)
    }

    fn stream(&self, command: &ProcessCommand) -> VcResult<Box<dyn Read + Send>> {
        let output = self.next_output(command)?;
        Ok(Box::new(Cursor::new(output.stdout)))
    }
}
