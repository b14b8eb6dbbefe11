use heapless::Vec;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenizeError {
    TooManyParams { max: usize },
    UnterminatedQuote,
}

/// Splits `line` on `delimiter`, keeping double-quoted runs as one token.
///
/// Runs of delimiters count as one. The command name counts towards
/// `max_params`, which is further capped at `P`.
pub fn tokenize<'a, const P: usize>(
    line: &'a str,
    delimiter: char,
    max_params: usize,
) -> Result<Vec<&'a str, P>, TokenizeError> {
    let limit = max_params.min(P);
    let mut tokens = Vec::new();
    let mut rest = line;

    loop {
        rest = rest.trim_start_matches(delimiter);
        if rest.is_empty() {
            break;
        }

        let (token, tail) = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').ok_or(TokenizeError::UnterminatedQuote)?;
            (&quoted[..end], &quoted[end + 1..])
        } else {
            match rest.find(delimiter) {
                Some(end) => (&rest[..end], &rest[end..]),
                None => (rest, ""),
            }
        };

        if tokens.len() >= limit {
            return Err(TokenizeError::TooManyParams { max: limit });
        }
        let _ = tokens.push(token);
        rest = tail;
    }

    Ok(tokens)
}
