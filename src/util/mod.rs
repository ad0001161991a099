pub mod clock;
pub mod vec2;

/// Sanitize a display name: trim, drop control and markup characters,
/// collapse whitespace and cap at 16 characters.
pub fn sanitize_name(raw: &str) -> String {
    let filtered: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .filter(|c| *c != '<' && *c != '>' && *c != '&')
        .take(16)
        .collect();

    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "Player".to_string()
    } else {
        collapsed
    }
}
