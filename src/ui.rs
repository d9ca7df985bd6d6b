//! Status presentation.
//!
//! The mapping from detection outcomes to user-facing text is pure: label
//! formatting, severity, recommendation, and confidence percentage are
//! computed fresh for every render and never stored. Side effects live
//! behind `StatusPresenter` so the capture/classify path can be exercised
//! without a terminal.

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::detect::Prediction;

/// Visual weight of a status or detection line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Danger,
    Neutral,
}

/// Turn a snake_case wire label into a display label
/// ("no_mask" -> "No Mask").
pub fn format_prediction_label(raw: &str) -> String {
    raw.split('_')
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn severity_for(prediction: &Prediction) -> Severity {
    match prediction {
        Prediction::CorrectMask => Severity::Success,
        Prediction::IncorrectMask => Severity::Warning,
        Prediction::NoMask => Severity::Danger,
        Prediction::Other(_) => Severity::Neutral,
    }
}

pub fn recommendation_for(prediction: &Prediction) -> &'static str {
    match prediction {
        Prediction::CorrectMask => "Great! You are wearing your mask correctly.",
        Prediction::IncorrectMask => "Please adjust your mask to cover your nose and mouth.",
        Prediction::NoMask => "No mask detected. Please wear a mask for safety.",
        Prediction::Other(_) => "",
    }
}

/// Rounded percentage for the confidence bar.
pub fn confidence_percent(confidence: f32) -> u8 {
    (confidence * 100.0).round() as u8
}

/// Everything one render needs, derived from a classification.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionView {
    pub label: String,
    pub severity: Severity,
    pub confidence_pct: u8,
    pub recommendation: &'static str,
    pub raw_line: String,
}

impl DetectionView {
    pub fn from_classification(prediction: &Prediction, confidence: f32) -> Self {
        Self {
            label: format_prediction_label(prediction.label()),
            severity: severity_for(prediction),
            confidence_pct: confidence_percent(confidence),
            recommendation: recommendation_for(prediction),
            raw_line: format!("{} (confidence: {:.1}%)", prediction.label(), confidence * 100.0),
        }
    }
}

/// Display seam between the monitor and whatever renders its output.
pub trait StatusPresenter {
    /// Update the status line.
    fn set_status(&mut self, severity: Severity, text: &str);
    /// Render a fresh classification.
    fn show_detection(&mut self, view: &DetectionView);
}

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal presenter. Pretty mode drives an indicatif bar as the confidence
/// indicator; plain mode writes lines to stderr.
pub struct TerminalPresenter {
    bar: Option<ProgressBar>,
}

impl TerminalPresenter {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let use_pretty = match mode {
            UiMode::Pretty => true,
            UiMode::Auto => is_tty,
            UiMode::Plain => false,
        };

        let bar = if use_pretty {
            let bar = ProgressBar::new(100);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("confidence [{bar:30}] {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            Some(bar)
        } else {
            None
        };
        Self { bar }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn emit(&self, line: String) {
        if let Some(bar) = &self.bar {
            bar.println(line);
        } else {
            eprintln!("{}", line);
        }
    }
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "ok",
        Severity::Warning => "warn",
        Severity::Danger => "error",
        Severity::Neutral => "info",
    }
}

impl StatusPresenter for TerminalPresenter {
    fn set_status(&mut self, severity: Severity, text: &str) {
        self.emit(format!("[{}] {}", severity_tag(severity), text));
    }

    fn show_detection(&mut self, view: &DetectionView) {
        if let Some(bar) = &self.bar {
            bar.set_position(view.confidence_pct as u64);
        }
        self.emit(format!(
            "[{}] {} - {}",
            severity_tag(view.severity),
            view.label,
            view.raw_line
        ));
        if self.bar.is_none() {
            self.emit(format!("confidence: {}%", view.confidence_pct));
        }
        if !view.recommendation.is_empty() {
            self.emit(view.recommendation.to_string());
        }
    }
}

/// Presenter that records every update. Used by tests and available for
/// headless embedding.
#[derive(Clone, Default)]
pub struct MemoryPresenter {
    events: Arc<Mutex<Vec<PresenterEvent>>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PresenterEvent {
    Status { severity: Severity, text: String },
    Detection(DetectionView),
}

impl MemoryPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresenterEvent> {
        self.lock_events().clone()
    }

    pub fn last_status(&self) -> Option<(Severity, String)> {
        self.lock_events()
            .iter()
            .rev()
            .find_map(|event| match event {
                PresenterEvent::Status { severity, text } => Some((*severity, text.clone())),
                PresenterEvent::Detection(_) => None,
            })
    }

    pub fn last_detection(&self) -> Option<DetectionView> {
        self.lock_events()
            .iter()
            .rev()
            .find_map(|event| match event {
                PresenterEvent::Detection(view) => Some(view.clone()),
                PresenterEvent::Status { .. } => None,
            })
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<PresenterEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StatusPresenter for MemoryPresenter {
    fn set_status(&mut self, severity: Severity, text: &str) {
        self.lock_events().push(PresenterEvent::Status {
            severity,
            text: text.to_string(),
        });
    }

    fn show_detection(&mut self, view: &DetectionView) {
        self.lock_events().push(PresenterEvent::Detection(view.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_format_to_title_case() {
        assert_eq!(format_prediction_label("correct_mask"), "Correct Mask");
        assert_eq!(format_prediction_label("incorrect_mask"), "Incorrect Mask");
        assert_eq!(format_prediction_label("no_mask"), "No Mask");
    }

    #[test]
    fn odd_labels_format_without_panicking() {
        assert_eq!(format_prediction_label("mask"), "Mask");
        assert_eq!(format_prediction_label("__double__"), "Double");
        assert_eq!(format_prediction_label(""), "");
    }

    #[test]
    fn unknown_predictions_are_neutral() {
        let prediction = Prediction::Other("helmet".to_string());
        assert_eq!(severity_for(&prediction), Severity::Neutral);
        assert_eq!(recommendation_for(&prediction), "");
    }

    #[test]
    fn confidence_percent_rounds() {
        assert_eq!(confidence_percent(0.0), 0);
        assert_eq!(confidence_percent(0.004), 0);
        assert_eq!(confidence_percent(0.005), 1);
        assert_eq!(confidence_percent(0.87), 87);
        assert_eq!(confidence_percent(1.0), 100);
    }

    #[test]
    fn no_mask_view_matches_the_expected_render() {
        let view = DetectionView::from_classification(&Prediction::NoMask, 0.87);
        assert_eq!(view.label, "No Mask");
        assert_eq!(view.severity, Severity::Danger);
        assert_eq!(view.confidence_pct, 87);
        assert_eq!(
            view.recommendation,
            "No mask detected. Please wear a mask for safety."
        );
        assert_eq!(view.raw_line, "no_mask (confidence: 87.0%)");
    }

    #[test]
    fn memory_presenter_records_in_order() {
        let presenter = MemoryPresenter::new();
        let mut sink = presenter.clone();
        sink.set_status(Severity::Success, "Camera is ON. Detecting...");
        sink.show_detection(&DetectionView::from_classification(
            &Prediction::CorrectMask,
            0.5,
        ));

        let events = presenter.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            presenter.last_status(),
            Some((Severity::Success, "Camera is ON. Detecting...".to_string()))
        );
        assert!(presenter.last_detection().is_some());
    }
}
