/// Expand `$VAR`, `${VAR}`, `${VAR:-default}` and `%VAR%` in a path.
///
/// Undefined variables are left as written so the resulting path is
/// obviously wrong instead of silently pointing somewhere else.
pub fn expand_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

pub(crate) fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                let mut body = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    body.push(c);
                }
                if !closed {
                    out.push_str("${");
                    out.push_str(&body);
                    continue;
                }
                match body.split_once(":-") {
                    Some((name, default)) => match lookup(name) {
                        Some(val) if !val.is_empty() => out.push_str(&val),
                        _ => out.push_str(default),
                    },
                    None => match lookup(&body) {
                        Some(val) => out.push_str(&val),
                        None => {
                            out.push_str("${");
                            out.push_str(&body);
                            out.push('}');
                        }
                    },
                }
            }
            '$' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match lookup(&name).filter(|_| !name.is_empty()) {
                    Some(val) => out.push_str(&val),
                    None => {
                        out.push('$');
                        out.push_str(&name);
                    }
                }
            }
            '%' => {
                let rest: String = chars.clone().take_while(|&c| c != '%').collect();
                let terminated = chars.clone().nth(rest.chars().count()) == Some('%');
                let valid = !rest.is_empty()
                    && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                match (terminated && valid).then(|| lookup(&rest)).flatten() {
                    Some(val) => {
                        // 跳过 NAME 和结尾的 %
                        for _ in 0..=rest.chars().count() {
                            chars.next();
                        }
                        out.push_str(&val);
                    }
                    None => out.push('%'),
                }
            }
            _ => out.push(c),
        }
    }
    out
}
