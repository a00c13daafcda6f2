//! Text rendering for diagnostics.
//!
//! Turns dependency chains and fully qualified type names into
//! something a person can read in a terminal.

/// Joins a chain of names with arrows.
///
/// # Examples
/// ```
/// use weft_support::rendering::render_chain;
///
/// let chain = ["Service", "Repo", "Db", "Service"];
/// assert_eq!(render_chain(&chain), "Service → Repo → Db → Service");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    let mut out = String::new();
    for (i, item) in chain.iter().enumerate() {
        if i > 0 {
            out.push_str(" → ");
        }
        out.push_str(item.as_ref());
    }
    out
}

/// Renders a type name with an optional qualifier, e.g. `[primary]Config`.
///
/// ```
/// use weft_support::rendering::render_qualified;
///
/// assert_eq!(render_qualified("Config", Some("primary")), "[primary]Config");
/// assert_eq!(render_qualified("Config", None), "Config");
/// ```
pub fn render_qualified(type_name: &str, qualifier: Option<&str>) -> String {
    match qualifier {
        Some(q) => format!("[{q}]{type_name}"),
        None => type_name.to_string(),
    }
}

/// Strips module paths from a type name, keeping generic structure.
///
/// ```
/// use weft_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("app::db::Pool"), "Pool");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn app::log::Sink + Send>"),
///     "Arc<dyn Sink + Send>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(&segment);
                out.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    out.push_str(&segment);
    out
}

/// Picks the registered names closest to `requested`, best first.
///
/// Matching is deliberately cheap: substring containment on the full
/// and the shortened names, then a shared-prefix and character overlap
/// score for likely typos.
pub fn suggest_similar(requested: &str, available: &[&str], limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }

    let full = requested.to_lowercase();
    let short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(usize, &str)> = available
        .iter()
        .filter(|candidate| **candidate != requested)
        .filter_map(|&candidate| {
            let candidate_full = candidate.to_lowercase();
            let candidate_short = shorten_type_name(candidate).to_lowercase();

            let score = if candidate_full.contains(&full) || full.contains(&candidate_full) {
                100
            } else if candidate_short.contains(&short) || short.contains(&candidate_short) {
                80
            } else if is_close(&short, &candidate_short) {
                60
            } else {
                let prefix = common_prefix(&short, &candidate_short);
                if prefix < 3 {
                    return None;
                }
                prefix * 10
            };

            Some((score, candidate))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.to_string())
        .collect()
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

// Positional overlap of at least 60% with a length difference of at most 3.
fn is_close(a: &str, b: &str) -> bool {
    if a.len().abs_diff(b.len()) > 3 {
        return false;
    }
    let longest = a.len().max(b.len());
    if longest == 0 {
        return false;
    }
    let same = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    same * 100 / longest >= 60
}
