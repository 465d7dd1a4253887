use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

const SUFFIX_LEN: usize = 6;

lazy_static! {
    static ref NON_SLUG_RE: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Lowercased, dash-separated title plus a random suffix, e.g. `hello-world-x45Aj8`.
pub fn create_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let base = NON_SLUG_RE.replace_all(&lowered, "-");
    let base = base.trim_matches('-');

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();

    if base.is_empty() {
        suffix
    } else {
        format!("{base}-{suffix}")
    }
}
