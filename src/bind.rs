/// Bind-marker style of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMarkers {
    /// Plain `?`, left untouched
    Anonymous,
    /// `prefix` followed by the 1-based parameter position, e.g. `$1`
    Indexed { prefix: char },
}

impl BindMarkers {
    pub const POSTGRES: BindMarkers = BindMarkers::Indexed { prefix: '$' };
    pub const SQLITE: BindMarkers = BindMarkers::Indexed { prefix: '?' };
}

/// Rewrite each anonymous `?` into the driver's marker.
///
/// Markers inside string literals, quoted identifiers and line comments are
/// left alone.
pub fn replace_binding_arguments(sql: &str, markers: BindMarkers) -> String {
    let prefix = match markers {
        BindMarkers::Anonymous => return sql.to_string(),
        BindMarkers::Indexed { prefix } => prefix,
    };

    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    let mut index = 0;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if in_comment {
            in_comment = c != '\n';
            out.push(c);
            continue;
        }
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    in_comment = true;
                    out.push(c);
                }
                '?' => {
                    index += 1;
                    out.push(prefix);
                    out.push_str(&index.to_string());
                }
                _ => out.push(c),
            },
        }
    }
    out
}
