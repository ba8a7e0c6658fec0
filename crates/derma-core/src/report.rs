//! PDF case report rendering.
//!
//! A fixed-layout, single-page, text-only report built with `lopdf`:
//! assessment summary, routine plan, disclaimer.

use crate::routine::RoutinePlan;
use crate::types::Assessment;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use thiserror::Error;

// A4 portrait in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: f32 = 56.0;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 11.0;
const LEADING: f32 = 16.0;

const DISCLAIMER: &str = "Automated demo analysis. This is not medical advice.";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("pdf: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the report needs about one case.
pub struct CaseReport<'a> {
    pub session_id: &'a str,
    pub created_at: &'a str,
    pub assessment: &'a Assessment,
    pub routine: &'a RoutinePlan,
}

/// One typeset line: text, font size, bold flag.
struct Line {
    text: String,
    size: f32,
    bold: bool,
}

impl Line {
    fn title(text: impl Into<String>) -> Self {
        Self { text: text.into(), size: TITLE_SIZE, bold: true }
    }

    fn heading(text: impl Into<String>) -> Self {
        Self { text: text.into(), size: HEADING_SIZE, bold: true }
    }

    fn body(text: impl Into<String>) -> Self {
        Self { text: text.into(), size: BODY_SIZE, bold: false }
    }

    fn blank() -> Self {
        Self::body("")
    }
}

/// Render a case report to PDF bytes.
pub fn render(case: &CaseReport<'_>) -> Result<Vec<u8>, ReportError> {
    let lines = layout(case);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut operations = Vec::new();
    let mut y = PAGE_HEIGHT as f32 - MARGIN;
    for line in &lines {
        y -= if line.size > BODY_SIZE { line.size + 4.0 } else { LEADING };
        if y < MARGIN {
            // Fixed layout: everything the original ever printed fits one
            // page; clip rather than paginate if a label list ever grows.
            break;
        }
        if line.text.is_empty() {
            continue;
        }
        let font = if line.bold { "F2" } else { "F1" };
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec![font.into(), line.size.into()]));
        operations.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.text.as_str())],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut std::io::Cursor::new(&mut bytes))?;
    Ok(bytes)
}

fn layout(case: &CaseReport<'_>) -> Vec<Line> {
    let assessment = case.assessment;
    let mut lines = vec![
        Line::title("Skin Analysis Report"),
        Line::body(format!("Session: {}", case.session_id)),
        Line::body(format!("Generated: {}", case.created_at)),
        Line::blank(),
        Line::heading("Assessment"),
        Line::body(format!("Skin type: {}", assessment.skin_type)),
        Line::body(format!("Confidence: {}%", assessment.confidence)),
    ];

    if assessment.issues.is_empty() {
        lines.push(Line::body("Issues: none reported"));
    } else {
        lines.push(Line::body("Issues:"));
        for issue in &assessment.issues {
            lines.push(Line::body(format!("  - {issue}")));
        }
    }
    lines.push(Line::body(format!("Notes: {}", assessment.notes)));

    if assessment.doctor_flag {
        lines.push(Line::blank());
        lines.push(Line::body(
            "We recommend consulting a dermatologist for further evaluation.",
        ));
    }

    lines.push(Line::blank());
    lines.push(Line::heading("Morning routine"));
    for (i, step) in case.routine.morning.iter().enumerate() {
        lines.push(Line::body(format!("  {}. {step}", i + 1)));
    }
    lines.push(Line::heading("Evening routine"));
    for (i, step) in case.routine.evening.iter().enumerate() {
        lines.push(Line::body(format!("  {}. {step}", i + 1)));
    }

    lines.push(Line::blank());
    lines.push(Line::body(DISCLAIMER));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SkinType;

    fn sample_case() -> (Assessment, RoutinePlan) {
        let assessment = Assessment {
            skin_type: SkinType::Combination,
            issues: vec!["Mild acne".into(), "Dullness".into()],
            confidence: 72,
            doctor_flag: false,
            notes: "Consensus result from multiple AI models.".into(),
        };
        let routine = crate::routine::build(&assessment);
        (assessment, routine)
    }

    #[test]
    fn test_render_produces_a_pdf() {
        let (assessment, routine) = sample_case();
        let bytes = render(&CaseReport {
            session_id: "a6c1e2f4",
            created_at: "2026-02-11T09:30:00Z",
            assessment: &assessment,
            routine: &routine,
        })
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn test_render_with_doctor_flag_and_no_issues() {
        let (mut assessment, routine) = sample_case();
        assessment.issues.clear();
        assessment.doctor_flag = true;
        let bytes = render(&CaseReport {
            session_id: "s",
            created_at: "t",
            assessment: &assessment,
            routine: &routine,
        })
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_layout_includes_every_routine_step() {
        let (assessment, routine) = sample_case();
        let lines = layout(&CaseReport {
            session_id: "s",
            created_at: "t",
            assessment: &assessment,
            routine: &routine,
        });
        let text: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        for step in routine.morning.iter().chain(&routine.evening) {
            assert!(
                text.iter().any(|t| t.contains(step.as_str())),
                "missing step: {step}"
            );
        }
        assert!(text.iter().any(|t| t.contains("not medical advice")));
    }
}
