//! Output post-processing and the content filter.

/// Returned instead of any output the filter rejects.
pub const FALLBACK_MESSAGE: &str = "I'm sorry... Unfortunately, I can't help but that. \
Do you want me to summarize our exchange and draft a ticket for you?";

/// Output of a run that hit the step limit.
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

const CODE_FENCE: &str = "```";

/// Minimum number of space-separated tokens an answer must have.
const MIN_TOKENS: usize = 3;

/// Strip surrounding whitespace from raw model text.
pub fn postprocess(output: &str) -> String {
    output.trim().to_string()
}

/// Replace unusable output with [`FALLBACK_MESSAGE`].
///
/// Tokens are counted by splitting on single spaces, so runs of spaces
/// produce empty tokens that still count.
pub fn responsible_ai_filter(output: String) -> String {
    let rejected = output == ITERATION_LIMIT_MESSAGE
        || output.contains(CODE_FENCE)
        || output.is_empty()
        || output.split(' ').count() < MIN_TOKENS;
    if rejected { FALLBACK_MESSAGE.to_string() } else { output }
}

/// `postprocess` then `responsible_ai_filter`.
pub fn finalize(raw: &str) -> String {
    responsible_ai_filter(postprocess(raw))
}

pub fn is_fallback(output: &str) -> bool {
    output == FALLBACK_MESSAGE
}
