//! Plain-text rendering of a [`PipelineResult`] for a downstream text-generation model.
//!
//! Output is deterministic for a given result: images keep their submission order
//! and the class breakdown is sorted by class name.

use crate::common::Detection;
use crate::data::PipelineResult;

const HEADER: &str = "ON-DEVICE WOUND DETECTION RESULTS";

pub const NOT_ANALYZED: &str = "Unable to analyze images with wound detection model.";

fn nothing_found(classes: &str) -> String {
    format!(
        "The wound detection model analyzed the provided image(s) but did not detect any injuries ({}).",
        classes
    )
}

fn format_detection(det: &Detection) -> String {
    format!("{} ({:.0}% confidence)", det.class_name.to_uppercase(), det.confidence * 100.)
}

fn format_image(detections: &[Detection], index: usize, total: usize) -> String {
    let label = if total > 1 {
        format!("Image {}", index + 1)
    } else {
        "Uploaded image".to_string()
    };

    if detections.is_empty() {
        return format!("{}: No wounds detected", label);
    }

    let mut lines = vec![format!("{}:", label)];
    lines.extend(detections.iter().map(|d| format!("- {}", format_detection(d))));
    lines.join("\n")
}

fn format_summary(result: &PipelineResult) -> String {
    let breakdown = result
        .summary
        .by_class
        .iter()
        .map(|(name, count)| format!("{} {}{}", count, name, if *count > 1 { "s" } else { "" }))
        .collect::<Vec<_>>()
        .join(", ");

    let highest = match &result.summary.highest_confidence {
        Some(d) => format!("{} at {:.0}%", d.class_name.to_uppercase(), d.confidence * 100.),
        None => "N/A".to_string(),
    };

    format!(
        "Total: {} wound(s) detected ({}). Highest confidence: {}.",
        result.total_detections, breakdown, highest
    )
}

/// Renders `result` as a text block.
///
/// A run where no image could be analyzed and a run that analyzed images but
/// found nothing produce different, fixed messages.
pub fn format_for_llm(result: &PipelineResult) -> String {
    let mut lines: Vec<String> = vec![HEADER.to_string(), "=".repeat(HEADER.len()), String::new()];
    let classes = result.model_config.class_names.join(", ");

    if result.successful_images == 0 {
        lines.push(NOT_ANALYZED.to_string());
        lines.push(String::new());
        log::debug!("No images were analyzed successfully");
        return lines.join("\n");
    }

    if result.total_detections == 0 {
        lines.push(nothing_found(&classes));
        lines.push(String::new());
        lines.push(
            "This does not mean no injury exists, only that the model did not identify any with sufficient confidence."
                .to_string(),
        );
        lines.push("Please assess the images clinically.".to_string());
        lines.push(String::new());
        return lines.join("\n");
    }

    lines.push("An automated wound detection model has analyzed the patient's photos.".to_string());
    lines.push(format!("The model detects: {}.", classes));
    lines.push(String::new());

    let total = result.results.len();
    for (index, image) in result.results.iter().enumerate() {
        if image.is_success() {
            lines.push(format_image(image.detections(), index, total));
            lines.push(String::new());
        }
    }

    lines.push("SUMMARY:".to_string());
    lines.push(format_summary(result));
    lines.push(String::new());
    lines.push("Please incorporate these findings into your clinical assessment.".to_string());

    let out = lines.join("\n");
    log::debug!("Generated detection context ({} chars)", out.len());
    out
}

/// True when at least one image was analyzed, i.e. the formatted text says something
/// about the photos rather than only reporting that analysis failed.
pub fn has_context(result: Option<&PipelineResult>) -> bool {
    result.is_some_and(|r| r.successful_images > 0)
}
