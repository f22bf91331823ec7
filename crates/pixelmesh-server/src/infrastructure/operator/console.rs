//! Interactive operator on stdin/stdout.
//!
//! The person commissioning the wall watches the LEDs and answers prompts:
//!
//! ```text
//! 3 device(s) registered. Wait for more? [Y/n]
//! Device 0 (24:0a:c4:00:00:01) is lit red. Which cell? (row, col)
//! Is cell (2, 5) lit green? [Y]es / [n]o, ask again / [a]bort
//! ```
//!
//! End of input answers "stop" to every question, so piping a finite script
//! into the server can never hang it.

use std::io::Write;

use async_trait::async_trait;
use pixelmesh_core::{Device, GridPosition};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use crate::application::operator::{CalibrationDecision, Operator};

/// Answers operator questions from a line-oriented reader.
pub struct ConsoleOperator<R> {
    lines: Mutex<Lines<R>>,
}

impl ConsoleOperator<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> ConsoleOperator<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    /// Prints `question` and waits for one line.  `None` at end of input.
    async fn ask(&self, question: &str) -> Option<String> {
        print!("{question} ");
        let _ = std::io::stdout().flush();

        match self.lines.lock().await.next_line().await {
            Ok(line) => line,
            Err(e) => {
                warn!("reading operator input failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Operator for ConsoleOperator<R> {
    async fn continue_discovery(&self, registered: usize) -> bool {
        let question = format!("{registered} device(s) registered. Wait for more? [Y/n]");
        match self.ask(&question).await {
            Some(answer) => parse_yes_no(&answer),
            None => false,
        }
    }

    async fn locate(&self, device: &Device) -> Option<GridPosition> {
        let question = format!(
            "Device {} ({}) is lit red. Which cell? (row, col)",
            device.index, device.mac
        );
        loop {
            let answer = self.ask(&question).await?;
            match parse_position(&answer) {
                Some(position) => return Some(position),
                None => println!("'{}' is not a cell; type it as: row, col", answer.trim()),
            }
        }
    }

    async fn confirm(&self, _device: &Device, position: GridPosition) -> CalibrationDecision {
        let question = format!("Is cell {position} lit green? [Y]es / [n]o, ask again / [a]bort");
        loop {
            let Some(answer) = self.ask(&question).await else {
                return CalibrationDecision::Abort;
            };
            match parse_decision(&answer) {
                Some(decision) => return decision,
                None => println!("please answer y, n or a"),
            }
        }
    }
}

/// Parses `"row, col"` or `"row col"`.
pub fn parse_position(input: &str) -> Option<GridPosition> {
    let mut parts = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty());
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(GridPosition::new(row, col))
}

/// Anything but an explicit no means yes.
pub fn parse_yes_no(input: &str) -> bool {
    !matches!(input.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

pub fn parse_decision(input: &str) -> Option<CalibrationDecision> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Some(CalibrationDecision::Advance),
        "n" | "no" => Some(CalibrationDecision::Retry),
        "a" | "abort" | "q" | "quit" => Some(CalibrationDecision::Abort),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelmesh_core::MacAddress;

    fn device() -> Device {
        Device {
            index: 0,
            mac: MacAddress([1, 2, 3, 4, 5, 6]),
            position: None,
        }
    }

    fn operator(input: &'static str) -> ConsoleOperator<BufReader<&'static [u8]>> {
        ConsoleOperator::from_reader(BufReader::new(input.as_bytes()))
    }

    #[test]
    fn test_parse_position_accepts_comma_and_space_forms() {
        assert_eq!(parse_position("2, 5"), Some(GridPosition::new(2, 5)));
        assert_eq!(parse_position("2 5"), Some(GridPosition::new(2, 5)));
        assert_eq!(parse_position("  0,18 "), Some(GridPosition::new(0, 18)));
    }

    #[test]
    fn test_parse_position_rejects_garbage() {
        assert_eq!(parse_position(""), None);
        assert_eq!(parse_position("3"), None);
        assert_eq!(parse_position("a, b"), None);
        assert_eq!(parse_position("-1, 2"), None);
        assert_eq!(parse_position("1, 2, 3"), None);
    }

    #[test]
    fn test_parse_yes_no_defaults_to_yes() {
        assert!(parse_yes_no(""));
        assert!(parse_yes_no("y"));
        assert!(parse_yes_no("whatever"));
        assert!(!parse_yes_no("n"));
        assert!(!parse_yes_no(" No "));
    }

    #[test]
    fn test_parse_decision_maps_answers() {
        assert_eq!(parse_decision(""), Some(CalibrationDecision::Advance));
        assert_eq!(parse_decision("Y"), Some(CalibrationDecision::Advance));
        assert_eq!(parse_decision("n"), Some(CalibrationDecision::Retry));
        assert_eq!(parse_decision("a"), Some(CalibrationDecision::Abort));
        assert_eq!(parse_decision("maybe"), None);
    }

    #[tokio::test]
    async fn test_locate_reasks_until_a_cell_is_given() {
        // Arrange
        let op = operator("left\n1, 3\n");

        // Act
        let position = op.locate(&device()).await;

        // Assert
        assert_eq!(position, Some(GridPosition::new(1, 3)));
    }

    #[tokio::test]
    async fn test_end_of_input_stops_everything() {
        let op = operator("");
        assert!(!op.continue_discovery(1).await);
        assert_eq!(op.locate(&device()).await, None);
        assert_eq!(
            op.confirm(&device(), GridPosition::new(0, 0)).await,
            CalibrationDecision::Abort
        );
    }

    #[tokio::test]
    async fn test_answers_are_consumed_in_order() {
        let op = operator("y\nn\n0 1\nmaybe\nn\n");

        assert!(op.continue_discovery(1).await);
        assert!(!op.continue_discovery(2).await);
        assert_eq!(op.locate(&device()).await, Some(GridPosition::new(0, 1)));
        assert_eq!(
            op.confirm(&device(), GridPosition::new(0, 1)).await,
            CalibrationDecision::Retry
        );
    }
}
