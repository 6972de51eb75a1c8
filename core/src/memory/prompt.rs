//! Prompts sent with every categorization request

/// Default system prompt; callers with their own taxonomy use
/// [`super::MemoryCategorizer::with_prompt`]
pub const MEMORY_CATEGORIZATION_PROMPT: &str = "\
Your task is to assign each piece of information (a \"memory\") to one or more of the categories below. \
Use several categories for one memory when that fits better than a single one.

- Personal: family, friends, home, hobbies, lifestyle
- Relationships: social network, significant others, colleagues
- Preferences: likes, dislikes, habits, favorite media
- Health: physical fitness, mental health, diet, sleep
- Travel: trips, commutes, favorite places, itineraries
- Work: job roles, companies, projects, promotions
- Education: courses, degrees, certifications, skills development
- Projects: to-dos, milestones, deadlines, status updates
- AI, ML & Technology: infrastructure, algorithms, tools, research
- Technical Support: bug reports, error logs, fixes
- Finance: income, expenses, investments, billing
- Shopping: purchases, wishlists, returns, deliveries
- Legal: contracts, policies, regulations, privacy
- Entertainment: movies, music, games, books, events
- Messages: emails, SMS, alerts, reminders
- Customer Support: tickets, inquiries, resolutions
- Product Feedback: ratings, bug reports, feature requests
- News: articles, headlines, trending topics
- Organization: meetings, appointments, calendars
- Goals: ambitions, KPIs, long-term objectives

Guidelines:
- Return only the categories under a 'categories' key in JSON format.
- If a memory does not fit any category above, create a short new category name for it.
- Keep category names short and consistent.";

/// Extra instruction for providers without structured output
pub const JSON_ONLY_INSTRUCTION: &str = "Return ONLY a JSON object with format: \
{\"categories\": [\"cat1\", \"cat2\"]}. No other text or explanation.";

/// Schema name declared to structured-output providers
pub const RESPONSE_SCHEMA_NAME: &str = "MemoryCategories";

/// JSON schema for `{"categories": [string]}`
pub fn categories_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "categories": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["categories"],
        "additionalProperties": false
    })
}
