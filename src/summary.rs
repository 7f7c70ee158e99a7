//! Run-wide pass/fail aggregation
//!
//! Only the verdict of each model is kept once its [`ModelResult`] has been
//! reported; the diagnostics are not retained.

use crate::verify::ModelResult;

#[derive(Debug, Clone)]
struct ModelStatus {
    model: String,
    ok: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    models: Vec<ModelStatus>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the verdict of a finished model
    pub fn record(&mut self, result: &ModelResult) -> bool {
        let ok = result.is_ok();
        self.models.push(ModelStatus {
            model: result.model.clone(),
            ok,
        });
        ok
    }

    pub fn passed(&self) -> usize {
        self.models.iter().filter(|m| m.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.models.iter().filter(|m| !m.ok).count()
    }

    pub fn total(&self) -> usize {
        self.models.len()
    }

    pub fn is_success(&self) -> bool {
        self.models.iter().all(|m| m.ok)
    }

    pub fn render(&self) -> String {
        let status = if self.is_success() { "PASS" } else { "FAIL" };
        let mut out = format!(
            "Result: {} ({}/{} models passed)",
            status,
            self.passed(),
            self.total()
        );
        for model in self.models.iter().filter(|m| !m.ok) {
            out.push_str(&format!("\n  [FAIL] {}", model.model));
        }
        out
    }
}
