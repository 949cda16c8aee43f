pub const CATEGORIES: &[&str] = &[
    "Business",
    "Real Estate",
    "Infrastructure",
    "Public Safety",
    "Budget",
    "Other",
];

pub const ANALYSIS_PROMPT: &str = r####"
Analyze the following transcript of a local government meeting.

Respond with a single JSON object and nothing else, using this structure:
{
    "summary": "Concise summary of the meeting.",
    "meetingDate": "YYYY-MM-DD if the date is mentioned, otherwise null",
    "meetingType": "e.g. City Council, County Commission, Planning Commission, School Board",
    "location": {
        "city": "City name if identifiable, otherwise null",
        "county": "County name if identifiable, otherwise null",
        "state": "Two letter state code if identifiable, otherwise null"
    },
    "issues": [
        {
            "title": "Short title of the issue",
            "description": "Brief description of the issue and the sentiment around it.",
            "category": "One of: {categories}"
        }
    ]
}

Transcript:
{transcript}
"####;

pub const QUICK_ANALYSIS_PROMPT: &str = r####"
You are an expert policy analyst. Analyze the following town hall meeting transcript.

Respond with a single JSON object and nothing else, using this structure:
{
    "summary": "A concise executive summary of the meeting (simple HTML such as <p> and <strong> is allowed).",
    "issues": [
        {
            "title": "Short title of the issue",
            "description": "Brief description of the issue and its sentiment or outcome."
        }
    ]
}

Transcript:
{transcript}
"####;

pub const REPORT_PROMPT: &str = r####"
You are a strategic analyst writing an "Executive Dashboard" in Markdown from the meeting summaries below.
{focus}
Goal: a visual, easy to scan picture of what local governments are dealing with.

Cover EVERY meeting summary provided. Do not skip any location or meeting.

Use exactly these sections:

# Critical Alerts
- The 3 to 5 most urgent or high impact issues across all meetings.
- Put the **Issue Title** in bold and say briefly why it matters.

# Location Breakdown
- One subsection per location, e.g. "## Tupelo, MS".
- List the meetings covered for that location.
- Add a Markdown table per location with the columns Category, Issue, Impact (High/Med/Low) and Details (one sentence).
- Every significant issue from the summaries must appear in a table.

# Trend Analysis
- Two or three themes that recur across locations, if there are any.

# Data Coverage
- Total number of meetings analyzed.
- The unique locations covered.

Meeting summaries:
{summaries}
"####;

pub const REPORT_FOCUS: &str = "Focus: the reader only cares about **{category}** issues. Leave out analysis of other categories.";

pub fn render_analysis_prompt(transcript: &str) -> String {
    ANALYSIS_PROMPT
        .replace("{categories}", &CATEGORIES.join(", "))
        .replace("{transcript}", transcript)
}

pub fn render_quick_analysis_prompt(transcript: &str) -> String {
    QUICK_ANALYSIS_PROMPT.replace("{transcript}", transcript)
}

pub fn render_report_prompt(summaries: &str, category: Option<&str>) -> String {
    let focus = category
        .map(|category| REPORT_FOCUS.replace("{category}", category))
        .unwrap_or_default();
    // Split first so neither substitution rewrites the other's text.
    let (head, tail) = REPORT_PROMPT
        .split_once("{summaries}")
        .unwrap_or((REPORT_PROMPT, ""));
    format!("{}{}{}", head.replace("{focus}", &focus), summaries, tail)
}
