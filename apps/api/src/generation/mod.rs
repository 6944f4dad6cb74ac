// LLM-backed generation: resume optimization and cover letters.
// All LLM calls go through llm_client; no direct Anthropic SDK calls here.
// Both endpoints sit behind the entitlement gate.

pub mod handlers;
pub mod scrape;
