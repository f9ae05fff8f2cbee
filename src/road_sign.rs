use crate::route::RoadLabel;

// Codes starting with one of these carry no province prefix.
const ROUTE_CLASSES: &str = "GSXYQT";
const INTERCHANGE_SUFFIXES: [&str; 3] = ["互通", "立交", "枢纽"];
const TOLL_SUFFIX: &str = "收费站";

fn badge(text: &str, color: &str) -> String {
    format!("{{% label {text} {color} %}}")
}

/// Renders one road code as a coloured badge.
///
/// `G105` (national) is red, `S306` (provincial) orange, and other four
/// character codes like `X175` white. Anything else is an expressway and green;
/// five character expressway codes such as `G4511` get the last two digits as
/// a subscript. A leading province abbreviation (`赣S22`) is kept in front of
/// the badge.
pub fn render_road_code(code: &str) -> String {
    let code = code.trim();
    let mut chars = code.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return String::new(),
    };
    let (prefix, code) = if ROUTE_CLASSES.contains(first) {
        (String::new(), code)
    } else {
        (format!("{first} "), chars.as_str())
    };

    let badge = match code.chars().count() {
        4 if code.starts_with('G') => badge(code, "red"),
        4 if code.starts_with('S') => badge(code, "orange"),
        4 => badge(code, "white"),
        5 => {
            let split = code
                .char_indices()
                .nth(3)
                .map(|(i, _)| i)
                .unwrap_or(code.len());
            let (head, tail) = code.split_at(split);
            badge(&format!("{head}<sub>{tail}</sub>"), "green")
        }
        _ => badge(code, "green"),
    };
    format!("{prefix}{badge}")
}

/// Badges joined with " / ", then the road name. Empty for `None`.
pub fn render_road_label(road: Option<&RoadLabel>) -> String {
    let road = match road {
        Some(road) => road,
        None => return String::new(),
    };
    let mut text = road
        .codes
        .iter()
        .map(|code| render_road_code(code))
        .collect::<Vec<_>>()
        .join(" / ");
    if !road.codes.is_empty() {
        text.push(' ');
    }
    if let Some(name) = &road.name {
        text.push_str(name);
    }
    text
}

fn is_interchange(item: &str) -> bool {
    INTERCHANGE_SUFFIXES
        .iter()
        .any(|suffix| item.ends_with(suffix))
}

fn is_toll_station(item: &str) -> bool {
    item.ends_with(TOLL_SUFFIX)
}

/// Folds an interchange and an adjacent toll station into one item,
/// `"A互通（B收费站）"`, whichever order they come in. Pairs do not overlap:
/// once two items are merged, scanning resumes after both.
pub fn merge_interchange_and_toll(items: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(items.len());
    let mut iter = items.into_iter().peekable();
    while let Some(current) = iter.next() {
        let merged = match iter.peek() {
            Some(next) if is_interchange(&current) && is_toll_station(next) => {
                Some(format!("{current}（{next}）"))
            }
            Some(next) if is_toll_station(&current) && is_interchange(next) => {
                Some(format!("{next}（{current}）"))
            }
            _ => None,
        };
        match merged {
            Some(merged) => {
                iter.next();
                result.push(merged);
            }
            None => result.push(current),
        }
    }
    result
}

/// Drops empty items, and where an empty item sits between two equal ones,
/// collapses all three into one. Repeats until nothing changes, so
/// `X, "", X, "", X` ends up as a single `X`.
pub fn merge_empty_bridges(items: Vec<String>) -> Vec<String> {
    let mut items = items;
    loop {
        let mut changed = false;
        let mut merged: Vec<String> = Vec::with_capacity(items.len());
        let mut i = 0;
        while i < items.len() {
            if items[i].is_empty() {
                if i + 1 < items.len() && merged.last() == Some(&items[i + 1]) {
                    i += 2;
                    changed = true;
                    continue;
                }
            } else {
                merged.push(items[i].clone());
            }
            i += 1;
        }
        items = merged;
        if !changed {
            return items;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn province_prefix() {
        assert_eq!(render_road_code("赣S22"), "赣 {% label S22 green %}");
        assert_eq!(render_road_code(""), "");
    }
}
