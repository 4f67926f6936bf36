//! Textual path helpers.
//!
//! Locations are handled as strings so that both `C:\Users\me` and
//! `/home/me` style paths behave the same on every host. `\` and `/` are
//! both separators; derived paths keep the separator style of their input.

pub fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// `C:\`, `c:/` or a bare `C:`.
pub fn is_drive_root(path: &str) -> bool {
    let bytes = path.as_bytes();
    let drive_prefix = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    drive_prefix && (bytes.len() == 2 || (bytes.len() == 3 && is_separator(bytes[2] as char)))
}

/// A drive root or the POSIX root.
pub fn is_root(path: &str) -> bool {
    is_drive_root(path) || path == "/" || path == "\\"
}

fn separator_of(path: &str) -> char {
    path.chars().find(|c| is_separator(*c)).unwrap_or(std::path::MAIN_SEPARATOR)
}

/// Trim, expand environment references and drop trailing separators
/// (roots keep theirs; a bare `C:` becomes `C:\`).
pub fn normalize(path: &str) -> String {
    let expanded = expand_env(path.trim());
    if is_drive_root(&expanded) {
        let mut root = expanded[..2].to_string();
        root.push(if expanded.len() == 3 { expanded.as_bytes()[2] as char } else { '\\' });
        return root;
    }
    let trimmed = expanded.trim_end_matches(is_separator);
    if trimmed.is_empty() && !expanded.is_empty() {
        // Only separators, i.e. the POSIX root.
        return "/".to_string();
    }
    trimmed.to_string()
}

/// Expand `%VAR%`, `${VAR}` and `$VAR`. Unknown variables are left as written.
pub fn expand_env(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let chars: Vec<char> = path.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '%' => {
                if let Some(end) = chars[i + 1..].iter().position(|c| *c == '%') {
                    let name: String = chars[i + 1..i + 1 + end].iter().collect();
                    if !name.is_empty() {
                        if let Ok(value) = std::env::var(&name) {
                            out.push_str(&value);
                            i += end + 2;
                            continue;
                        }
                    }
                }
                out.push('%');
                i += 1;
            }
            '$' => {
                let (name, consumed) = if chars.get(i + 1) == Some(&'{') {
                    match chars[i + 2..].iter().position(|c| *c == '}') {
                        Some(end) => (chars[i + 2..i + 2 + end].iter().collect::<String>(), end + 3),
                        None => (String::new(), 0),
                    }
                } else {
                    let len = chars[i + 1..]
                        .iter()
                        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                        .count();
                    (chars[i + 1..i + 1 + len].iter().collect::<String>(), len + 1)
                };
                match (!name.is_empty()).then(|| std::env::var(&name).ok()).flatten() {
                    Some(value) => {
                        out.push_str(&value);
                        i += consumed;
                    }
                    None => {
                        out.push('$');
                        i += 1;
                    }
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Textual parent used by "go to upper level" and by watched-root recovery.
///
/// `None` means the parent is the Home location: drive roots, the POSIX root
/// and paths without any separator all go Home.
pub fn parent(path: &str) -> Option<String> {
    if is_root(path) {
        return None;
    }
    let index = path.rfind(is_separator)?;
    if index == 2 && is_drive_root(&path[..3]) {
        // Keep the separator of `C:\`.
        return Some(path[..3].to_string());
    }
    if index == 0 {
        return Some(path[..1].to_string());
    }
    Some(path[..index].to_string())
}

/// Last path component.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    match trimmed.rfind(is_separator) {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Lower-cased extension without the dot. Dot-files have none.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(index) if index > 0 && index + 1 < name.len() => Some(name[index + 1..].to_lowercase()),
        _ => None,
    }
}

pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with(is_separator) {
        format!("{}{}", dir, name)
    } else {
        format!("{}{}{}", dir, separator_of(dir), name)
    }
}

/// True when `candidate` lies strictly beneath `ancestor`.
pub fn is_descendant(candidate: &str, ancestor: &str) -> bool {
    if candidate.len() <= ancestor.len() || !candidate.starts_with(ancestor) {
        return false;
    }
    ancestor.ends_with(is_separator) || candidate[ancestor.len()..].starts_with(is_separator)
}
