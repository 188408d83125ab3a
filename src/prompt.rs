//! Operator confirmation prompt

use std::io::{self, BufRead, Write};

/// Ask a yes/no question; only `y` or `Y` counts as yes.
///
/// End of input is treated as "no".
pub fn confirm<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    write!(output, "{} (y/N) ", question)?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }
    Ok(answer.trim() == "y" || answer.trim() == "Y")
}

/// [`confirm`] on the process stdin/stdout
pub fn confirm_stdin(question: &str) -> io::Result<bool> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    confirm(question, &mut input, &mut output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case("y\n", true)]
    #[case("Y\n", true)]
    #[case("  y  \n", true)]
    #[case("yes\n", false)]
    #[case("n\n", false)]
    #[case("\n", false)]
    #[case("", false)]
    fn test_confirm_answers(#[case] answer: &str, #[case] expected: bool) {
        let mut input = Cursor::new(answer.as_bytes());
        let mut output = Vec::new();
        assert_eq!(confirm("Proceed?", &mut input, &mut output).unwrap(), expected);
        assert!(String::from_utf8(output).unwrap().starts_with("Proceed? (y/N)"));
    }
}
