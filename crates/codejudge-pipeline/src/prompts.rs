use codejudge_core::{Language, CASE_DELIMITER};

/// System prompt for the driver generator. The candidate source goes in the
/// user turn.
pub fn synthesis_prompt(language: Language, problem_title: &str, case_count: usize) -> String {
    let comment = language.line_comment();
    let entry_point = match language {
        Language::Python | Language::JavaScript => {
            "Write top-level statements only; do not wrap them in a function you never call."
        }
        Language::Cpp => {
            "Write an `int main()` that makes the calls. Add any #include lines the driver needs at the top of the driver."
        }
        Language::Java => {
            "Write a `class Main` with `public static void main(String[] args)` that makes the calls. Do not add import statements; use fully-qualified names such as java.util.Arrays."
        }
    };

    format!(
        r#"You write test drivers for coding interview problems.

Problem: {title}
Language: {label}

The user message is the candidate's solution. It only defines code; it does not call anything.
Write ONLY the driver code that will be appended directly after that solution.

Rules:
- Choose exactly {n} distinct inputs that exercise the problem, including at least one edge case.
- Immediately before each call, write a single comment line of the form `{comment} CASE: <the arguments, human readable>`.
- Call the candidate's function exactly once per input, in that order.
- Print only the return value of each call, with no labels or extra text.
- After every result except the last, print a line containing exactly {delimiter}
- Never redefine, modify or re-declare anything from the candidate's solution.
- Never read from stdin, the filesystem or the network.
- {entry_point}

Respond with a single fenced ```{fence} code block and nothing else."#,
        title = problem_title,
        label = language.label(),
        n = case_count,
        comment = comment,
        delimiter = CASE_DELIMITER,
        entry_point = entry_point,
        fence = language.fence_tag(),
    )
}

/// System prompt for the judge. The user turn is a JSON object with
/// `inputs` and `actualOutputs`.
pub fn adjudication_prompt(problem_title: &str, case_count: usize) -> String {
    format!(
        r#"You grade program output for the coding problem "{title}".

The user message is a JSON object with two arrays of equal length {n}:
- "inputs": human readable test inputs, in order
- "actualOutputs": what the candidate's program printed for each input, in the same order

For each input, work out the correct output for the problem yourself, then compare it with the actual output.
Differences only in whitespace, quote style or ordering inside unordered results are not failures.

Respond with ONLY a JSON object of the form {{"results": [...]}} where "results" is an array of exactly {n} objects, in the same order as the inputs, each with exactly these fields:
- "input": the input string, copied verbatim
- "expectedOutput": the correct output, written as a string
- "actualOutput": the actual output string, copied verbatim
- "passed": true if the actual output is correct, otherwise false

Do not add commentary."#,
        title = problem_title,
        n = case_count,
    )
}
