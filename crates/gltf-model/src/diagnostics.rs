//! Load-time diagnostics, injected per model instead of kept in globals.
use std::{collections::HashMap, time::Duration};

use web_time::Instant;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    Format,
    Parse,
    Buffers,
    Textures,
    Meshes,
    Nodes,
    Skins,
    Animations,
    Transforms,
    Bones,
    Validation,
}

/// Receives progress and per-resource failures while a model loads.
///
/// Every method has an empty default body.
pub trait Diagnostics {
    fn stage_finished(&mut self, _stage: LoadStage, _elapsed: Duration) {}

    /// A resource failed without failing the load.
    fn resource_failed(&mut self, _kind: ErrorKind, _message: &str) {}
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn stage_finished(&mut self, stage: LoadStage, elapsed: Duration) {
        (**self).stage_finished(stage, elapsed)
    }

    fn resource_failed(&mut self, kind: ErrorKind, message: &str) {
        (**self).resource_failed(kind, message)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {}

/// Records stage timings and counts failures by kind.
#[derive(Debug, Clone, Default)]
pub struct LoadStatistics {
    stages: Vec<(LoadStage, Duration)>,
    failures: HashMap<ErrorKind, usize>,
    messages: Vec<String>,
}

impl LoadStatistics {
    pub fn stages(&self) -> &[(LoadStage, Duration)] {
        &self.stages
    }

    pub fn stage_time(&self, stage: LoadStage) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(item, _)| *item == stage)
            .map(|(_, elapsed)| *elapsed)
    }

    pub fn total_time(&self) -> Duration {
        self.stages.iter().map(|(_, elapsed)| *elapsed).sum()
    }

    pub fn failures(&self, kind: ErrorKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Diagnostics for LoadStatistics {
    fn stage_finished(&mut self, stage: LoadStage, elapsed: Duration) {
        self.stages.push((stage, elapsed));
    }

    fn resource_failed(&mut self, kind: ErrorKind, message: &str) {
        *self.failures.entry(kind).or_default() += 1;
        self.messages.push(message.to_string());
    }
}

/// Measures one stage and reports it when finished.
#[derive(Debug)]
pub(crate) struct StageTimer {
    stage: LoadStage,
    start: Instant,
}

impl StageTimer {
    pub(crate) fn start(stage: LoadStage) -> Self {
        Self {
            stage,
            start: Instant::now(),
        }
    }

    pub(crate) fn finish<D: Diagnostics>(self, diagnostics: &mut D) -> Duration {
        let elapsed = self.start.elapsed();
        diagnostics.stage_finished(self.stage, elapsed);
        elapsed
    }
}
