// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps narrative output tied to the computed evidence.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Base every statement on the canonical entities and scorecard provided. \
    Do NOT infer skills, employers, or qualifications that are not listed. \
    Do NOT restate or change any score; the scorecard is final.";
