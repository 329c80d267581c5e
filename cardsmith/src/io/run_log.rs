//! Run artifacts under `<state_dir>/runs/<run-id>/`.
//!
//! Each model call gets a numbered directory (`01-plan`, `02-draft-1`, ...)
//! holding its prompt, schema, output and backend log. Workflow events are
//! appended to `events.jsonl` as they happen and the terminal state is written
//! to `state.json`.

use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;

pub const EVENTS_FILE: &str = "events.jsonl";
pub const STATE_FILE: &str = "state.json";

#[derive(Debug)]
pub struct RunLog {
    run_id: String,
    dir: PathBuf,
    calls: Cell<u32>,
}

impl RunLog {
    /// Create the directory for a new run. Fails if it already exists.
    pub fn create(runs_dir: &Path, run_id: &str) -> Result<Self> {
        let dir = runs_dir.join(run_id);
        if dir.exists() {
            bail!("run directory {} already exists", dir.display());
        }
        fs::create_dir_all(&dir).with_context(|| format!("create run dir {}", dir.display()))?;
        Ok(Self {
            run_id: run_id.to_string(),
            dir,
            calls: Cell::new(0),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocate the next numbered call directory.
    pub fn call_dir(&self, label: &str) -> Result<PathBuf> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        let dir = self.dir.join(format!("{n:02}-{label}"));
        fs::create_dir_all(&dir).with_context(|| format!("create call dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Append one JSON line to `events.jsonl`.
    pub fn record_event<T: Serialize>(&self, event: &T) -> Result<()> {
        let path = self.dir.join(EVENTS_FILE);
        let mut line = serde_json::to_string(event).context("serialize event")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", path.display()))
    }

    pub fn write_state<T: Serialize>(&self, state: &T) -> Result<()> {
        let path = self.dir.join(STATE_FILE);
        let mut buf = serde_json::to_string_pretty(state).context("serialize state")?;
        buf.push('\n');
        fs::write(&path, buf).with_context(|| format!("write {}", path.display()))
    }
}

/// `run-<UTC timestamp>-<6 lowercase alphanumerics>`.
pub fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let mut rng = rand::thread_rng();
    let suffix = std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase();
    format!("run-{timestamp}-{suffix}")
}
