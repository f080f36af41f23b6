use crate::solver::error::SolverResult;
use crate::solver::options::SimulationConfig;
use crate::solver::stepper::{ProjectionSolver, StepDiagnostics};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const TRACE_FORMAT_VERSION: u32 = 1;

/// One line of a JSON-lines run trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TraceEvent {
    Header(TraceHeader),
    Step(StepDiagnostics),
    Footer(TraceFooter),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceHeader {
    pub format_version: u32,
    pub created_unix_ms: u64,
    pub case: TraceCase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceCase {
    pub name: String,
    pub resolution: [usize; 3],
    pub extent: [f64; 3],
    pub obstacle_cells: usize,
    pub temperature: bool,
    pub config: SimulationConfig,
}

impl TraceCase {
    pub fn describe(name: impl Into<String>, solver: &ProjectionSolver) -> Self {
        let g = &solver.grid;
        let span = |n: &[f64]| n.last().copied().unwrap_or(0.0) - n.first().copied().unwrap_or(0.0);
        Self {
            name: name.into(),
            resolution: g.rc,
            extent: [span(&g.xn), span(&g.yn), span(&g.zn)],
            obstacle_cells: solver.obst.iter().filter(|&&o| o != 0.0).count(),
            temperature: solver.t.is_some(),
            config: solver.config.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFooter {
    pub closed_unix_ms: u64,
    pub steps: usize,
}

/// Receives the diagnostics of every step.
pub trait DiagnosticsSink {
    fn record(&mut self, diagnostics: &StepDiagnostics) -> SolverResult<()>;
}

impl DiagnosticsSink for Vec<StepDiagnostics> {
    fn record(&mut self, diagnostics: &StepDiagnostics) -> SolverResult<()> {
        self.push(*diagnostics);
        Ok(())
    }
}

/// Writes a one-line summary of each step to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn record(&mut self, d: &StepDiagnostics) -> SolverResult<()> {
        log::info!(
            "step {:>6} t={:.5} vol_err={:.3e} cfl={:.3} p_iters={} p_res={:.3e}",
            d.step,
            d.time,
            d.max_error_after,
            d.cfl,
            d.pressure.iterations,
            d.pressure.residual
        );
        Ok(())
    }
}

pub struct TraceWriter {
    path: PathBuf,
    writer: std::io::BufWriter<std::fs::File>,
    events_written: usize,
    steps_written: usize,
    flush_every: usize,
}

impl TraceWriter {
    /// Creates the file and writes the header line.
    pub fn create(path: impl AsRef<Path>, case: TraceCase) -> SolverResult<Self> {
        let path = path.as_ref().to_owned();
        let file = std::fs::File::create(&path)?;
        let mut writer = Self {
            path,
            writer: std::io::BufWriter::new(file),
            events_written: 0,
            steps_written: 0,
            flush_every: 25,
        };
        writer.write_event(&TraceEvent::Header(TraceHeader {
            format_version: TRACE_FORMAT_VERSION,
            created_unix_ms: now_unix_ms(),
            case,
        }))?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_event(&mut self, event: &TraceEvent) -> SolverResult<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.events_written += 1;
        if self.events_written % self.flush_every == 0 {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Writes the footer and flushes.
    pub fn close(mut self) -> SolverResult<()> {
        let footer = TraceEvent::Footer(TraceFooter {
            closed_unix_ms: now_unix_ms(),
            steps: self.steps_written,
        });
        self.write_event(&footer)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl DiagnosticsSink for TraceWriter {
    fn record(&mut self, diagnostics: &StepDiagnostics) -> SolverResult<()> {
        self.steps_written += 1;
        self.write_event(&TraceEvent::Step(*diagnostics))
    }
}

/// Reads every event of a trace file.
pub fn read_trace(path: impl AsRef<Path>) -> SolverResult<Vec<TraceEvent>> {
    let file = std::fs::File::open(path)?;
    let mut events = Vec::new();
    for line in std::io::BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}

pub fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
