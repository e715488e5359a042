//! The grading prompt sent to the model.
//!
//! All prompt text lives here so it can be changed in one place and
//! inspected by unit tests without calling a real model.
//!
//! The rubric and the OCR text are embedded exactly as received: no
//! trimming, escaping or truncation. Whatever the instructor pasted and
//! whatever tesseract produced is what the model sees.

/// Fixed instructions placed before the rubric.
pub const GRADING_INSTRUCTIONS: &str = r#"You are an expert, strict, and fair teaching assistant. Your task is to grade a student's answer paper based on question-wise rubrics.

**Strict Rules:**
1.  You will be given <Rubrics> provided by the teacher.
2.  You will be given <StudentAnswerText> extracted by OCR.
3.  You **MUST** grade the student's text *only* using the criteria in the rubrics.
4.  The rubrics are "question-wise." Match the student's answer for "Question 1" to the "Rubric for Question 1," and so on.
5.  The student's text may have OCR errors (e.g., "Photosynthosis" instead of "Photosynthesis"). Be tolerant of such minor typos.
6.  For **EACH** question, provide a score for **EACH** criterion.
7.  For **EACH** criterion, you **MUST** provide a short justification for the score, quoting the student's text where possible to support your reasoning.
8.  Calculate a total score for each question.
9.  Format your output clearly using Markdown."#;

/// Section delimiter between prompt parts.
const SECTION_RULE: &str = "---";

/// Build the grading prompt for one submission.
///
/// Pure and deterministic: identical inputs always yield byte-identical
/// output.
pub fn build_grading_prompt(rubric: &str, student_answer: &str) -> String {
    let mut prompt = String::with_capacity(
        GRADING_INSTRUCTIONS.len() + rubric.len() + student_answer.len() + 256,
    );

    prompt.push_str(GRADING_INSTRUCTIONS);
    prompt.push_str("\n\n");

    push_section(&mut prompt, "**<Rubrics>**", rubric);
    push_section(&mut prompt, "**<StudentAnswerText>**", student_answer);

    prompt.push_str(SECTION_RULE);
    prompt.push('\n');
    prompt.push_str("**<EvaluationOutput>**\n");
    prompt.push_str("[Begin your detailed, well-justified evaluation here]\n");
    prompt
}

fn push_section(prompt: &mut String, heading: &str, body: &str) {
    prompt.push_str(SECTION_RULE);
    prompt.push('\n');
    prompt.push_str(heading);
    prompt.push('\n');
    prompt.push_str(body);
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUBRIC: &str = "Q1: 5pts for mentioning X. Q2: 5pts for mentioning Y.";
    const ANSWER: &str = "\n--- Page 1 ---\nQuestion 1: X is ...\n\n--- Page 2 ---\nQuestion 2: Y is ...\n";

    #[test]
    fn embeds_inputs_verbatim() {
        let p = build_grading_prompt(RUBRIC, ANSWER);
        assert!(p.contains(RUBRIC));
        assert!(p.contains(ANSWER));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(
            build_grading_prompt(RUBRIC, ANSWER),
            build_grading_prompt(RUBRIC, ANSWER)
        );
    }

    #[test]
    fn rubric_precedes_answer() {
        let p = build_grading_prompt(RUBRIC, ANSWER);
        let r = p.find("<Rubrics>").unwrap();
        let a = p.find("<StudentAnswerText>").unwrap();
        let e = p.find("<EvaluationOutput>").unwrap();
        assert!(r < a && a < e);
        assert!(p.find(RUBRIC).unwrap() > r);
        assert!(p.find(ANSWER).unwrap() > a);
    }

    #[test]
    fn braces_and_whitespace_survive() {
        let rubric = "  Q1: {name} gets 2pts {{}}\t\n\n";
        let answer = "{0} {student_answer} \u{00e9}\r\n";
        let p = build_grading_prompt(rubric, answer);
        assert!(p.contains(rubric));
        assert!(p.contains(answer));
    }

    #[test]
    fn instructions_cover_grading_rules() {
        assert!(GRADING_INSTRUCTIONS.contains("question-wise"));
        assert!(GRADING_INSTRUCTIONS.contains("OCR errors"));
        assert!(GRADING_INSTRUCTIONS.contains("justification"));
        assert!(GRADING_INSTRUCTIONS.contains("total score"));
        assert!(GRADING_INSTRUCTIONS.contains("Markdown"));
    }
}
