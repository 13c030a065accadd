use std::collections::VecDeque;

use tracing::{debug, warn};

use super::tokens::{clean_cell, normalize_label, tokenize, Token, TypedValue};

/// Single forward pass over a variant's stat rows.
///
/// Each row is the raw text of its cells. A `-Label` token sets the current
/// label, which stays in force across cells and rows until the next label;
/// every numeric token is emitted against it.
pub struct StatLines<I> {
    rows: I,
    current_label: Option<String>,
    cells: VecDeque<String>,
    pending: VecDeque<Token>,
}

impl<I> StatLines<I>
where
    I: Iterator<Item = Vec<String>>,
{
    pub fn new(rows: I) -> Self {
        StatLines {
            rows,
            current_label: None,
            cells: VecDeque::new(),
            pending: VecDeque::new(),
        }
    }

    fn refill(&mut self) -> bool {
        loop {
            if let Some(cell) = self.cells.pop_front() {
                let cleaned = clean_cell(&cell);
                self.pending.extend(tokenize(&cleaned));
                if !self.pending.is_empty() {
                    return true;
                }
                continue;
            }
            match self.rows.next() {
                Some(row) => {
                    debug!(cells = ?row, "stat row");
                    self.cells.extend(row);
                }
                None => return false,
            }
        }
    }
}

impl<I> Iterator for StatLines<I>
where
    I: Iterator<Item = Vec<String>>,
{
    type Item = (String, TypedValue);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let token = match self.pending.pop_front() {
                Some(t) => t,
                None if self.refill() => continue,
                None => return None,
            };
            match token {
                Token::Name(name) => {
                    let label = normalize_label(&name);
                    debug!(label = %label, "stat label");
                    self.current_label = Some(label);
                }
                Token::Value(value) => match &self.current_label {
                    Some(label) => {
                        debug!(label = %label, value = ?value, "stat value");
                        return Some((label.clone(), value));
                    }
                    None => warn!(value = ?value, "stat value before any label, skipped"),
                },
                Token::Unparsable(text) => {
                    warn!(label = ?self.current_label, text = %text, "unparsable stat value, skipped")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn scan(cells: &[&[&str]]) -> Vec<(String, TypedValue)> {
        StatLines::new(rows(cells).into_iter()).collect()
    }

    #[test]
    fn label_then_float() {
        let out = scan(&[&["-Blunt Damage", "12.5"]]);
        assert_eq!(out, vec![("blunt_damage".to_string(), TypedValue::Float(12.5))]);
    }

    #[test]
    fn label_then_weight() {
        let out = scan(&[&["-Weight", "3 kg"]]);
        assert_eq!(out, vec![("weight".to_string(), TypedValue::Weight(3))]);
    }

    #[test]
    fn label_then_negative_percentage() {
        let out = scan(&[&["-Blood Loss", "-5%"]]);
        assert_eq!(out, vec![("blood_loss".to_string(), TypedValue::Percentage(-0.05))]);
    }

    #[test]
    fn label_carries_across_rows() {
        let out = scan(&[&["-Attack Bonus"], &["+4"]]);
        assert_eq!(out, vec![("attack_bonus".to_string(), TypedValue::Integer(4))]);
    }

    #[test]
    fn latest_label_wins_within_a_cell() {
        let out = scan(&[&["-Cutting Damage 1.2x", "-Blunt Damage 0.4x"]]);
        assert_eq!(
            out,
            vec![
                ("cutting_damage".to_string(), TypedValue::Multiplier(1.2)),
                ("blunt_damage".to_string(), TypedValue::Multiplier(0.4)),
            ]
        );
    }

    #[test]
    fn value_without_label_is_skipped() {
        let out = scan(&[&["42"], &["-Value", "1,500"]]);
        assert_eq!(out, vec![("value".to_string(), TypedValue::Integer(1500))]);
    }

    #[test]
    fn empty_and_textual_cells_are_ignored() {
        let out = scan(&[&[], &["Some text", ""], &["-Sell Value", "300"]]);
        assert_eq!(out, vec![("sell_value".to_string(), TypedValue::Integer(300))]);
    }
}
