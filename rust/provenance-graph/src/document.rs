use std::path::Path;

use crate::{Identifier, ProvenanceGraphError, Triple};

/// The serializations a provenance document may arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// A JSON array of `{ "subject", "predicate", "object" }` objects
    Json,
    /// One statement per line, `<subject> <predicate> <object> .`, in the
    /// style of N-Triples. Terms may be `<iri>`, `_:blank` nodes, `"quoted"`
    /// literals or bare tokens; `#` starts a comment.
    Lines,
}

impl DocumentFormat {
    /// Guess the format from a file extension; anything that is not `.json`
    /// is read line by line
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Lines,
        }
    }
}

/// Parse a whole provenance document. Nothing is returned unless every
/// statement in the document is well formed.
pub fn parse_document(
    text: &str,
    format: DocumentFormat,
) -> Result<Vec<Triple>, ProvenanceGraphError> {
    match format {
        DocumentFormat::Json => Ok(serde_json::from_str(text)?),
        DocumentFormat::Lines => text
            .lines()
            .enumerate()
            .filter_map(|(index, line)| parse_line(index + 1, line).transpose())
            .collect(),
    }
}

fn parse_line(number: usize, line: &str) -> Result<Option<Triple>, ProvenanceGraphError> {
    let malformed = |reason: String| ProvenanceGraphError::MalformedDocument {
        line: number,
        reason,
    };

    let mut rest = line.trim();
    let mut terms: Vec<Identifier> = Vec::with_capacity(3);

    loop {
        rest = rest.trim_start();

        if rest.is_empty() || rest.starts_with('#') {
            break;
        }

        if let Some(after) = rest.strip_prefix('.') {
            if !after.trim().is_empty() && !after.trim_start().starts_with('#') {
                return Err(malformed(format!("Unexpected content after '.': {after:?}")));
            }
            if terms.len() != 3 {
                return Err(malformed(format!(
                    "Expected 3 terms before '.', found {}",
                    terms.len()
                )));
            }
            return Ok(Some(Triple::new(
                terms[0].clone(),
                terms[1].clone(),
                terms[2].clone(),
            )));
        }

        if terms.len() == 3 {
            return Err(malformed("Statement has more than 3 terms".into()));
        }

        let (term, remainder) = next_term(rest).map_err(malformed)?;
        terms.push(term.parse().map_err(|error| malformed(format!("{error}")))?);
        rest = remainder;
    }

    if terms.is_empty() {
        Ok(None)
    } else {
        Err(malformed("Statement is not terminated by '.'".into()))
    }
}

fn unescape(escaped: char) -> Result<char, String> {
    Ok(match escaped {
        't' => '\t',
        'b' => '\u{8}',
        'n' => '\n',
        'r' => '\r',
        'f' => '\u{c}',
        '"' | '\'' | '\\' => escaped,
        _ => return Err(format!("Unsupported escape '\\{escaped}' in literal")),
    })
}

fn next_term(input: &str) -> Result<(String, &str), String> {
    if let Some(body) = input.strip_prefix('<') {
        let end = body
            .find('>')
            .ok_or_else(|| format!("Unterminated IRI in {input:?}"))?;
        return Ok((body[..end].to_owned(), &body[end + 1..]));
    }

    if let Some(body) = input.strip_prefix('"') {
        let mut literal = String::new();
        let mut chars = body.char_indices();

        while let Some((index, character)) = chars.next() {
            match character {
                '\\' => match chars.next() {
                    Some((_, escaped)) => literal.push(unescape(escaped)?),
                    None => break,
                },
                '"' => return Ok((literal, &body[index + 1..])),
                _ => literal.push(character),
            }
        }

        return Err(format!("Unterminated literal in {input:?}"));
    }

    let end = input
        .find(|character: char| character.is_whitespace())
        .unwrap_or(input.len());
    let token = &input[..end];

    // A bare token may run straight into the terminating '.'
    match token.strip_suffix('.') {
        Some(stripped) if !stripped.is_empty() && end == input.len() => {
            Ok((stripped.to_owned(), &input[end - 1..]))
        }
        _ => Ok((token.to_owned(), &input[end..])),
    }
}
