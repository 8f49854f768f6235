use chrono::NaiveDate;
use std::io::{self, BufRead, Write};
use tally_engine::dates::DATE_FORMAT;

/// Ask for one end of the date range on stdin; EOF or a blank line keeps `default`.
pub fn ask_date(label: &str, default: NaiveDate) -> String {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    ask_date_with(&mut stdin.lock(), &mut stdout, label, default)
}

fn ask_date_with<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: NaiveDate,
) -> String {
    let _ = write!(output, "{} (YYYY-MM-DD) [{}]: ", label, default.format(DATE_FORMAT));
    let _ = output.flush();

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(_) => line.trim().to_string(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", label, e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shows_default_and_returns_answer() {
        let mut input = io::Cursor::new(b"2024-11-04\n".to_vec());
        let mut output = Vec::new();
        let default = NaiveDate::from_ymd_opt(2024, 12, 2).unwrap();

        let answer = ask_date_with(&mut input, &mut output, "Start date", default);

        assert_eq!(answer, "2024-11-04");
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Start date (YYYY-MM-DD) [2024-12-02]: "
        );
    }

    #[test]
    fn eof_gives_empty_answer() {
        let mut input = io::Cursor::new(Vec::new());
        let mut output = Vec::new();
        let default = NaiveDate::from_ymd_opt(2024, 12, 2).unwrap();
        assert_eq!(ask_date_with(&mut input, &mut output, "End date", default), "");
    }
}
