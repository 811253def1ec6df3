//! Scene splitting for storyboards.
//!
//! Turns the scene-split model output into an ordered [`Scene`] list. Model
//! output is messy: indices may repeat, skip, or be missing entirely, and the
//! payload may arrive fenced or as numbered prose instead of JSON.

use adloom_models::Scene;
use serde::Deserialize;
use tracing::{debug, warn};

/// Scene substituted when the model output yields nothing parseable.
pub const FALLBACK_SCENE: &str = "Wide establishing shot of the scenario";

#[derive(Deserialize)]
struct RawScene {
    #[serde(default)]
    scene: Option<u32>,
    #[serde(default)]
    description: String,
}

/// Split model output into an ordered, re-sequenced scene list.
///
/// Accepts a JSON array of `{"scene": n, "description": s}` objects (code
/// fences tolerated) or, failing that, numbered lines (`1)`, `1.`, `1 -`).
/// Supplied indices determine order (stable on ties) but are never trusted:
/// the result is always re-sequenced 1..=n. Unparseable output yields exactly
/// one fallback scene so the storyboard stage always has work.
pub fn split_scenes(raw: &str) -> Vec<Scene> {
    let cleaned = strip_fences(raw);

    let mut parsed = parse_json_scenes(cleaned);
    if parsed.is_empty() {
        parsed = parse_numbered_lines(cleaned);
    }

    if parsed.is_empty() {
        warn!("scene split produced no usable scenes, substituting fallback");
        return vec![Scene::new(1, FALLBACK_SCENE)];
    }

    parsed.sort_by_key(|(index, _)| *index);
    parsed
        .into_iter()
        .enumerate()
        .map(|(pos, (_, description))| Scene::new(pos as u32 + 1, description))
        .collect()
}

fn parse_json_scenes(cleaned: &str) -> Vec<(u32, String)> {
    let Ok(raw_scenes) = serde_json::from_str::<Vec<RawScene>>(cleaned) else {
        return Vec::new();
    };

    raw_scenes
        .into_iter()
        .enumerate()
        .filter_map(|(pos, raw)| {
            let description = raw.description.trim().to_string();
            if description.is_empty() {
                debug!(position = pos, "dropping scene without description");
                return None;
            }
            Some((raw.scene.unwrap_or(pos as u32 + 1), description))
        })
        .collect()
}

fn parse_numbered_lines(cleaned: &str) -> Vec<(u32, String)> {
    cleaned.lines().filter_map(parse_numbered_line).collect()
}

fn parse_numbered_line(line: &str) -> Option<(u32, String)> {
    let trimmed = line.trim();
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let index: u32 = digits.parse().ok()?;
    let rest = trimmed[digits.len()..]
        .trim_start()
        .trim_start_matches(['.', ')', '-', ':'])
        .trim();
    if rest.is_empty() {
        return None;
    }

    Some((index, rest.to_string()))
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // the opening fence may carry a language tag
    match inner.split_once('\n') {
        Some((_, rest)) => rest.trim(),
        None => inner.trim(),
    }
}
