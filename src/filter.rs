// Glob-based inclusion/exclusion over runner lists

use std::sync::Arc;

use glob::Pattern;

use crate::error::CollectError;
use crate::runner::Runner;

/// Compile every pattern up front so one bad glob aborts the whole filter
/// before any runner is dropped.
fn compile(patterns: &[String]) -> Result<Vec<Pattern>, CollectError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| CollectError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Keep only runners whose ID matches at least one pattern. An empty
/// pattern list keeps everything.
pub fn select(
    patterns: &[String],
    runners: Vec<Arc<dyn Runner>>,
) -> Result<Vec<Arc<dyn Runner>>, CollectError> {
    if patterns.is_empty() {
        return Ok(runners);
    }
    let globs = compile(patterns)?;
    Ok(runners
        .into_iter()
        .filter(|r| globs.iter().any(|g| g.matches(&r.id())))
        .collect())
}

/// Keep only runners whose ID matches none of the patterns.
pub fn exclude(
    patterns: &[String],
    runners: Vec<Arc<dyn Runner>>,
) -> Result<Vec<Arc<dyn Runner>>, CollectError> {
    if patterns.is_empty() {
        return Ok(runners);
    }
    let globs = compile(patterns)?;
    Ok(runners
        .into_iter()
        .filter(|r| !globs.iter().any(|g| g.matches(&r.id())))
        .collect())
}

/// Apply a product's filters. Selects take absolute precedence: when any
/// select pattern is present the excludes are ignored entirely.
pub fn apply(
    selects: &[String],
    excludes: &[String],
    runners: Vec<Arc<dyn Runner>>,
) -> Result<Vec<Arc<dyn Runner>>, CollectError> {
    if !selects.is_empty() {
        return select(selects, runners);
    }
    exclude(excludes, runners)
}
