//! Prompt composition for the four pipeline stages.
//!
//! Each stage sends a fixed instruction block followed by delimited context
//! sections, so a single prompt string carries both role and input.

/// Instruction for the brief stage.
pub const BRIEF_INSTRUCTION: &str = r#"You are a world-class marketing strategist. Create a structured, professional and concise marketing brief for the request below.
The output must be Markdown with exactly these sections:

### Objective
- The primary goal of this campaign.

### Target Audience
- Who we are trying to reach: demographics and psychographics.

### Key Message
- The single most important message to convey.

### Tone of Voice
- The desired personality of the campaign (e.g. witty, empowering, serious).

### Mandatories & Constraints
- Absolute must-haves or things to avoid (brand guidelines, legal disclaimers)."#;

/// Instruction for the script stage.
pub const SCRIPT_INSTRUCTION: &str = r#"You are a professional screenwriter specializing in short-form commercials. Write a script for the request below.
Use industry-standard screenplay format: clear scene headings (e.g. INT. COFFEE SHOP - DAY), concise action lines and properly formatted dialogue.
Pace the script for a 30-second commercial unless the request says otherwise.
When a marketing brief is provided, the script must directly reflect it."#;

/// Instruction for splitting a script into storyboard scenes.
pub const SCENE_SPLIT_INSTRUCTION: &str = r#"You are a film director's assistant. Read the script below and identify 3-5 key visual moments for a storyboard.
For each moment write a concise visual description suitable for an image generation model.
Output ONLY a valid JSON array of objects, each with two keys: "scene" (int) and "description" (string).
Example: [{"scene": 1, "description": "Close-up of a steaming cup of coffee on a rustic wooden table, morning light."}]
Do not output any text other than the JSON array."#;

/// Instruction for synthesizing a script into one video prompt.
pub const VIDEO_PROMPT_INSTRUCTION: &str = r#"You are an expert video editor. Synthesize the script below into a single, descriptive, temporally-aware prompt for a video generation model.
Describe the visual flow of the whole commercial from start to finish, focusing on the key visual moments.
Include cues for audio: dialogue in quotes (e.g. "This is amazing!") and sound effects as SFX notes (e.g. SFX: a car horn honks)."#;

/// Style suffix appended to every storyboard image prompt.
pub const IMAGE_STYLE_SUFFIX: &str = ", cinematic storyboard style, high quality, professional grade";

/// Request line used when a script is asked for with only a brief as input.
const DEFAULT_SCRIPT_REQUEST: &str =
    "Write the 30-second spot script for the campaign described in the brief.";

/// Prompt for the brief stage.
pub fn brief_prompt(request: &str) -> String {
    format!("{BRIEF_INSTRUCTION}\n\n=== REQUEST ===\n{request}")
}

/// Prompt for the script stage.
///
/// At least one of `request` and `brief` must be present; the orchestrator
/// enforces that before composing.
pub fn script_prompt(request: Option<&str>, brief: Option<&str>) -> String {
    let request = request
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_SCRIPT_REQUEST);

    match brief {
        Some(brief) => format!(
            "{SCRIPT_INSTRUCTION}\n\n=== PRIOR BRIEF ===\n{brief}\n\n=== REQUEST ===\n{request}"
        ),
        None => format!("{SCRIPT_INSTRUCTION}\n\n=== REQUEST ===\n{request}"),
    }
}

/// Prompt for the scene-split call of the storyboard stage.
pub fn scene_split_prompt(script: &str) -> String {
    format!("{SCENE_SPLIT_INSTRUCTION}\n\n=== SCRIPT ===\n{script}")
}

/// Prompt for the video-prompt synthesis call of the animatic stage.
pub fn video_synthesis_prompt(script: &str) -> String {
    format!("{VIDEO_PROMPT_INSTRUCTION}\n\n=== SCRIPT ===\n{script}")
}

/// Image prompt for one storyboard scene.
pub fn image_prompt(description: &str) -> String {
    format!("{description}{IMAGE_STYLE_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_prompt_includes_brief_context() {
        let prompt = script_prompt(Some("sell the app"), Some("### Objective\nGrowth"));
        assert!(prompt.contains("=== PRIOR BRIEF ==="));
        assert!(prompt.contains("### Objective"));
        assert!(prompt.contains("=== REQUEST ===\nsell the app"));
    }

    #[test]
    fn test_script_prompt_without_brief_has_no_context_block() {
        let prompt = script_prompt(Some("sell the app"), None);
        assert!(!prompt.contains("=== PRIOR BRIEF ==="));
        assert!(prompt.contains("sell the app"));
    }

    #[test]
    fn test_script_prompt_defaults_request_from_brief() {
        let prompt = script_prompt(None, Some("### Objective\nGrowth"));
        assert!(prompt.contains(DEFAULT_SCRIPT_REQUEST));
    }

    #[test]
    fn test_image_prompt_suffix() {
        let prompt = image_prompt("A wide shot of a desert road");
        assert!(prompt.starts_with("A wide shot of a desert road"));
        assert!(prompt.ends_with("professional grade"));
    }
}
