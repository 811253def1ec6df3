//! Content addressing for generated artifacts.
//!
//! Paths are derived purely from the inputs; the addresser never consults
//! the store. Readability comes from a slug of the seed text, uniqueness
//! from the prefixed component (epoch millis or a job id) plus the hash
//! suffix the slug carries when the seed is truncated.

use adloom_models::{slugify, JobId, MAX_SLUG_LEN};
use chrono::Utc;

/// Name used when the seed text slugs down to nothing.
const FALLBACK_NAME: &str = "asset";

/// Derives store paths of the form `{category}/{unique}_{slug}.{extension}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentAddresser;

impl ContentAddresser {
    /// Path with an epoch-millisecond uniqueness prefix.
    ///
    /// Two calls in the same millisecond with the same seed collide; callers
    /// that need stable per-job paths should use [`path_for_job`] instead.
    ///
    /// [`path_for_job`]: ContentAddresser::path_for_job
    pub fn path_for(category: &str, seed: &str, extension: &str) -> String {
        let unique = Utc::now().timestamp_millis().to_string();
        Self::path_with_unique(category, &unique, seed, extension)
    }

    /// Path with the job id as the uniqueness prefix.
    ///
    /// Deterministic: the same job and seed always yield the same path, so
    /// a re-run of a stage overwrites its own artifact instead of leaking
    /// a new one.
    pub fn path_for_job(category: &str, job_id: &JobId, seed: &str, extension: &str) -> String {
        Self::path_with_unique(category, job_id.as_str(), seed, extension)
    }

    fn path_with_unique(category: &str, unique: &str, seed: &str, extension: &str) -> String {
        let slug = slugify(seed, MAX_SLUG_LEN);
        let name = if slug.is_empty() { FALLBACK_NAME } else { &slug };
        format!("{category}/{unique}_{name}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_paths_are_deterministic() {
        let job = JobId::new();
        let a = ContentAddresser::path_for_job("storyboards", &job, "Neon city at dusk", "png");
        let b = ContentAddresser::path_for_job("storyboards", &job, "Neon city at dusk", "png");
        assert_eq!(a, b);
        assert_eq!(a, format!("storyboards/{}_neon-city-at-dusk.png", job));
    }

    #[test]
    fn test_distinct_jobs_yield_distinct_paths() {
        let a = ContentAddresser::path_for_job("storyboards", &JobId::new(), "same seed", "png");
        let b = ContentAddresser::path_for_job("storyboards", &JobId::new(), "same seed", "png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_timestamp_path_shape() {
        let path = ContentAddresser::path_for("animatics", "Launch teaser", "mp4");
        let rest = path.strip_prefix("animatics/").unwrap();
        let (unique, name) = rest.split_once('_').unwrap();
        assert!(unique.parse::<i64>().is_ok());
        assert_eq!(name, "launch-teaser.mp4");
    }

    #[test]
    fn test_empty_seed_falls_back() {
        let job = JobId::new();
        let path = ContentAddresser::path_for_job("briefs", &job, "!!! ???", "md");
        assert_eq!(path, format!("briefs/{}_asset.md", job));
    }

    #[test]
    fn test_long_seed_is_truncated() {
        let seed = "a very long scene description that keeps going well past the point \
                    where a filename stays readable";
        let job = JobId::new();
        let path = ContentAddresser::path_for_job("storyboards", &job, seed, "png");
        let rest = path.strip_prefix("storyboards/").unwrap();
        let name = rest
            .strip_prefix(&format!("{}_", job))
            .unwrap()
            .strip_suffix(".png")
            .unwrap();
        assert!(name.len() <= MAX_SLUG_LEN);
    }
}
