use serde::{Deserialize, Serialize};

/// Built-in rubrics selectable from the run file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricKind {
    /// A single overall rating on a 1 to 4 scale
    Simple,
    /// Relevance, clarity, consistency and creativity on a 1 to 10 scale
    #[default]
    MultiDimension,
}

/// Inclusive integer range a score must fall in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreScale {
    pub min: u8,
    pub max: u8,
}

impl ScoreScale {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u8) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// One graded aspect of an answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RubricDimension {
    /// Short key, used for score maps and log column names
    pub name: &'static str,
    /// Label the judge is asked to write before the number
    pub label: &'static str,
    pub description: &'static str,
    /// Meaning of the lowest, middle and highest score
    pub anchors: [&'static str; 3],
}

/// The fixed set of dimensions an answer is graded on, plus the total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rubric {
    pub kind: RubricKind,
    pub scale: ScoreScale,
    pub dimensions: Vec<RubricDimension>,
}

const SIMPLE_TEMPLATE: &str = "You are an expert evaluator assessing the quality of AI-generated answers.

Question: {question}

Answer: {answer}

Please evaluate this answer based on the following criteria:
1. **Accuracy**: Is the answer factually correct and relevant to the question?
2. **Completeness**: Does it address all aspects of the question?
3. **Clarity**: Is the answer well-structured and easy to understand?
4. **Depth**: Does it provide sufficient detail and insight?

Provide your evaluation in the following format:

**Evaluation:**
[Your detailed feedback here]

**Total Rating:** [A number from 1 to 4, where:
- 1 = Poor (major issues in accuracy, completeness, or clarity)
- 2 = Fair (some issues but partially addresses the question)
- 3 = Good (solid answer with minor issues)
- 4 = Excellent (comprehensive, accurate, and well-presented)]
";

const MULTI_DIMENSION_HEADER: &str = "You are an expert evaluator grading an AI-generated answer against a rubric.

Question: {question}

Answer: {answer}

Score the answer on each dimension below using a whole number from {min} to {max}.
";

const MULTI_DIMENSION_FOOTER: &str = "
Provide your evaluation in the following format, one score per line:

**Evaluation:**
[Your detailed feedback here]

{score_lines}Total Score: [the average of the dimension scores above, rounded to a whole number]
";

impl Rubric {
    pub fn new(kind: RubricKind) -> Self {
        match kind {
            RubricKind::Simple => Self {
                kind,
                scale: ScoreScale::new(1, 4),
                dimensions: Vec::new(),
            },
            RubricKind::MultiDimension => Self {
                kind,
                scale: ScoreScale::new(1, 10),
                dimensions: vec![
                    RubricDimension {
                        name: "relevance",
                        label: "Relevance Score",
                        description: "Does the answer address the question that was asked?",
                        anchors: [
                            "off-topic or ignores the question",
                            "partially on-topic, misses key parts of the question",
                            "fully focused on the question",
                        ],
                    },
                    RubricDimension {
                        name: "clarity",
                        label: "Clarity Score",
                        description: "Is the answer well-structured and easy to follow?",
                        anchors: [
                            "confusing or disorganised",
                            "understandable with some effort",
                            "clear, concise and well organised",
                        ],
                    },
                    RubricDimension {
                        name: "consistency",
                        label: "Consistency Score",
                        description: "Is the answer free of contradictions and factually coherent?",
                        anchors: [
                            "contradicts itself or states falsehoods",
                            "mostly coherent with minor inconsistencies",
                            "fully coherent and accurate",
                        ],
                    },
                    RubricDimension {
                        name: "creativity",
                        label: "Creativity Score",
                        description: "Does the answer show insight beyond the obvious?",
                        anchors: [
                            "generic or formulaic",
                            "some original framing or examples",
                            "insightful and original",
                        ],
                    },
                ],
            },
        }
    }

    /// Render the evaluation request for a question and answer.
    ///
    /// Both strings are inserted verbatim; braces inside them are never
    /// treated as placeholders.
    pub fn build_prompt(&self, question: &str, answer: &str) -> String {
        let template = self.template();
        render(&template, &[("question", question), ("answer", answer)])
    }

    fn template(&self) -> String {
        match self.kind {
            RubricKind::Simple => SIMPLE_TEMPLATE.to_string(),
            RubricKind::MultiDimension => {
                let (low, high) = (self.scale.min, self.scale.max);
                let mid = low + (high - low) / 2;

                let mut template = MULTI_DIMENSION_HEADER
                    .replace("{min}", &low.to_string())
                    .replace("{max}", &high.to_string());
                let mut score_lines = String::new();

                for (index, dimension) in self.dimensions.iter().enumerate() {
                    template.push_str(&format!(
                        "\n{}. **{}**: {}\n   - {} = {}\n   - {} = {}\n   - {} = {}\n",
                        index + 1,
                        title_case(dimension.name),
                        dimension.description,
                        low,
                        dimension.anchors[0],
                        mid,
                        dimension.anchors[1],
                        high,
                        dimension.anchors[2],
                    ));
                    score_lines.push_str(&format!("{}: [{}-{}]\n", dimension.label, low, high));
                }

                template.push_str(&MULTI_DIMENSION_FOOTER.replace("{score_lines}", &score_lines));
                template
            }
        }
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::new(RubricKind::default())
    }
}

/// Single-pass `{name}` substitution over the template text only
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        let replaced = values.iter().find_map(|(name, value)| {
            let placeholder = format!("{{{}}}", name);
            tail.starts_with(&placeholder).then(|| (*value, placeholder.len()))
        });

        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
