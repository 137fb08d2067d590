//! Prompt templates for every model call in the research pipeline.

use crate::types::{render_transcript, TranscriptEntry};

/// Today's date in the form injected into prompts.
pub fn today() -> String {
    chrono::Local::now().format("%a %b %-d, %Y").to_string()
}

fn conversation_text(conversation: &[TranscriptEntry]) -> String {
    render_transcript(conversation)
}

// ============= Brief Builder =============

pub const CLARIFY_SYSTEM: &str = "You decide whether a research request is specific enough to start work. \
Return JSON only.";

pub fn clarify_with_user(conversation: &[TranscriptEntry]) -> String {
    format!(
        r#"These are the messages exchanged so far with the user asking for a report:
<Messages>
{messages}
</Messages>

Today's date is {date}.

Decide whether you need to ask a clarifying question, or whether the request is clear enough to begin research.
If there are acronyms, abbreviations or unknown terms, or the subject of the request cannot be identified, ask the user to clarify.
If you already asked a clarifying question in the messages above, almost always proceed without asking another.

Respond with:
- "need_clarification": true if a question is needed
- "question": the question to ask (empty when no question is needed)
- "verification": when no question is needed, a short message confirming you will start research, summarizing what you understood (empty otherwise)"#,
        messages = conversation_text(conversation),
        date = today()
    )
}

pub const BRIEF_SYSTEM: &str = "You turn a conversation into a single research brief. Return JSON only.";

pub fn research_brief(conversation: &[TranscriptEntry]) -> String {
    format!(
        r#"These are the messages exchanged so far with the user:
<Messages>
{messages}
</Messages>

Today's date is {date}.

Translate these messages into one detailed, concrete research question that will guide the research.
- Keep every detail and preference the user gave.
- Where the user left a dimension open, say it is open rather than inventing constraints.
- Write in the first person, from the user's perspective.
- Prefer primary and official sources when the request implies them.

Respond with "research_brief": the research question."#,
        messages = conversation_text(conversation),
        date = today()
    )
}

// ============= Supervisor =============

pub fn supervisor_system(max_concurrent: usize, max_iterations: usize) -> String {
    format!(
        r#"You are a research supervisor. Your job is to conduct research by calling the "conduct_research" tool. Today's date is {date}.

<Tools>
1. conduct_research: delegate one focused sub-topic to a researcher. Describe the topic in full; researchers cannot see the brief.
2. research_complete: call when the gathered findings are enough to write the report.
3. think: reflect on progress before and after delegating.
</Tools>

<Limits>
- At most {max_concurrent} conduct_research calls per turn; extra calls are not dispatched.
- At most {max_iterations} delegation rounds in total.
- Bias towards a single researcher unless the brief has clearly separable parts, such as a comparison.
- Stop when you can answer confidently; do not keep delegating to polish.
</Limits>"#,
        date = today(),
        max_concurrent = max_concurrent,
        max_iterations = max_iterations
    )
}

pub fn supervisor_kickoff(brief: &str) -> String {
    format!(
        "Research brief:\n\n{}\n\nPlan the research and delegate it.",
        brief
    )
}

// ============= Researcher =============

pub fn researcher_system(max_iterations: usize, has_search: bool) -> String {
    let search_line = if has_search {
        "1. web_search: run one or more search queries and receive summarized results.\n"
    } else {
        "1. (web search is disabled in this deployment)\n"
    };
    format!(
        r#"You are a research assistant investigating one topic. Today's date is {date}.

<Tools>
{search_line}2. think: reflect after each search on what you found and what is missing.
3. research_complete: call when you have enough to answer the topic.
</Tools>

<Limits>
- You have at most {max_iterations} tool-calling turns.
- Start broad, then narrow. Stop once three or more good sources agree, or after the last useful search.
</Limits>"#,
        date = today(),
        search_line = search_line,
        max_iterations = max_iterations
    )
}

pub const COMPRESS_SYSTEM: &str = "You clean up research findings without losing information. \
Keep every relevant fact and every source URL. Output plain markdown.";

pub fn compress_research(topic: &str, transcript: &str) -> String {
    format!(
        r####"A researcher investigated this topic:
<Topic>
{topic}
</Topic>

Here is everything they did and found:
<Transcript>
{transcript}
</Transcript>

Today's date is {date}.

Rewrite the findings as a clean, comprehensive summary:
1. Start with a list of the queries and tool calls that were made.
2. Then present all relevant findings, preserving facts and figures verbatim.
3. Cite sources inline as [1], [2] and finish with a "### Sources" list of numbered URLs.
Do not drop anything relevant to the topic."####,
        topic = topic,
        transcript = transcript,
        date = today()
    )
}

// ============= Report =============

pub const REPORT_SYSTEM: &str = "You write well-structured, sourced research reports in markdown.";

pub fn final_report(brief: &str, findings: &str) -> String {
    format!(
        r####"<Research Brief>
{brief}
</Research Brief>

Today's date is {date}.

<Findings>
{findings}
</Findings>

Write a detailed report answering the brief.
- Use markdown headings and sections that fit the question (comparisons, overviews, lists).
- Write in the language of the brief.
- Cite sources inline as [1], [2] and end with a "### Sources" section listing each URL once, numbered sequentially.
- Some findings may be marked as failed research; work around them without inventing facts."####,
        brief = brief,
        findings = findings,
        date = today()
    )
}

// ============= Search Summaries =============

pub const SUMMARIZE_WEBPAGE_SYSTEM: &str =
    "You summarize raw web page content for a researcher. Return JSON only.";

pub fn summarize_webpage(content: &str) -> String {
    format!(
        r#"Summarize this web page. Today's date is {date}.

<webpage_content>
{content}
</webpage_content>

Respond with:
- "summary": the main points, keeping key facts, figures and dates (about a quarter of the original length)
- "key_excerpts": up to five short verbatim quotes worth citing, one per line"#,
        content = content,
        date = today()
    )
}
