// Prompt construction for match scoring. Required items must be listed
// before (and weighted above) nice-to-have items.

use crate::models::matching::{FinderJob, JobCriteria};

/// Single-posting prompt template. Placeholders: {title}, {description},
/// {requirements}, {nice_to_have_section}, {cv_section}.
const MATCH_PROMPT_TEMPLATE: &str = r#"You are an experienced recruiting expert. Your task is to compare a CV with a job posting and compute a match score.

## Job Posting

**Title:** {title}

**Description:**
{description}

**Requirements (MUST):**
{requirements}

{nice_to_have_section}{cv_section}

## Task

Assess how well the candidate fits the role. Keep in mind:
1. MUST requirements weigh more than NICE TO HAVE items
2. Professional experience in similar positions is a plus
3. A missing requirement is not automatically disqualifying

Respond ONLY with a valid JSON object in this format:

{
  "score": <number 0-100>,
  "category": "<low|medium|high>",
  "message": "<short rationale, max 2 sentences>",
  "matchedSkills": ["<met requirement 1>", "<met requirement 2>"],
  "missingSkills": ["<missing requirement 1>"],
  "recommendations": ["<application tip>"]
}

Categories:
- "low" (0-40%): probably not a fit
- "medium" (41-70%): partial fit
- "high" (71-100%): strong fit

Respond ONLY with the JSON, no explanations before or after."#;

/// Multi-posting prompt template. Placeholders: {jobs_json}, {cv_text},
/// {limit}.
const FINDER_PROMPT_TEMPLATE: &str = r#"You are an experienced recruiting expert. Your task is to compare a CV against ALL of the job postings below and score the match for each posting.

## Job Postings

{jobs_json}

## CV (anonymized)

{cv_text}

## Task

Score every posting. Keep in mind:
1. MUST requirements weigh more than NICE TO HAVE items
2. Professional experience in similar positions is a plus
3. A missing requirement is not automatically disqualifying

Respond ONLY with a valid JSON array containing one object per posting, using the posting's numeric id as "jobId":

[
  {
    "jobId": <posting id>,
    "score": <number 0-100>,
    "category": "<low|medium|high>",
    "message": "<short rationale, max 2 sentences>",
    "matchedSkills": ["<met requirement>"],
    "missingSkills": ["<missing requirement>"],
    "recommendations": ["<application tip>"]
  }
]

Categories:
- "low" (0-40%): probably not a fit
- "medium" (41-70%): partial fit
- "high" (71-100%): strong fit

The {limit} best matches will be shown to the candidate. Respond ONLY with the JSON array, no explanations before or after."#;

/// Renders the single-posting prompt. In image mode the CV section is
/// replaced with an instruction to analyze the attached image.
pub fn build_match_prompt(cv_text: &str, criteria: &JobCriteria, image_mode: bool) -> String {
    let cv_section = if image_mode {
        "The CV is attached as an image. Analyze the visible content.".to_string()
    } else {
        format!("## CV (anonymized)\n\n{cv_text}")
    };

    let nice_to_have_section = if criteria.nice_to_have.is_empty() {
        String::new()
    } else {
        format!(
            "**Nice to have (CAN):**\n{}\n\n",
            bullet_list(&criteria.nice_to_have)
        )
    };

    MATCH_PROMPT_TEMPLATE
        .replace("{title}", &criteria.title)
        .replace("{description}", &criteria.description)
        .replace("{requirements}", &bullet_list(&criteria.requirements))
        .replace("{nice_to_have_section}", &nice_to_have_section)
        .replace("{cv_section}", &cv_section)
}

/// Renders the multi-posting prompt with all postings embedded as JSON.
pub fn build_finder_prompt(cv_text: &str, jobs: &[FinderJob], limit: usize) -> String {
    let jobs_json =
        serde_json::to_string_pretty(jobs).unwrap_or_else(|_| "[]".to_string());

    FINDER_PROMPT_TEMPLATE
        .replace("{jobs_json}", &jobs_json)
        .replace("{cv_text}", cv_text)
        .replace("{limit}", &limit.to_string())
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
