use grokscope_core::{Location, QueryType};

use crate::SessionError;

pub fn status_line(count: usize) -> String {
    format!("~~ {count} matches. ~~ [q to quit] ~~ [<return> to select] ~~")
}

/// Text of the results popup. Row 1 is the status line; every result then
/// takes one row (`<index> <path>:<line>`), followed by an indented row with the
/// matched text unless the query was a path query.
pub fn render_results(query_type: QueryType, locations: &[Location]) -> Vec<String> {
    let mut lines = vec![status_line(locations.len())];
    for (idx, location) in locations.iter().enumerate() {
        lines.push(format!("{idx} {}:{}", location.path, location.line_number));
        if query_type != QueryType::Path {
            lines.push(format!("  {}", location.content.trim()));
        }
    }
    lines
}

/// Result index under the cursor at 1-based `row` of a popup rendered by
/// [`render_results`].
///
/// The selected row and the row above it are inspected; the last of them that
/// starts with an index wins, so both rows of a two-row entry select it.
pub fn selection_at(lines: &[String], row: usize) -> Result<usize, SessionError> {
    if row <= 1 || row > lines.len() {
        return Err(SessionError::InvalidSelection(
            "please select a line".to_owned(),
        ));
    }

    let mut selected = None;
    for line in &lines[row - 2..row] {
        if !line.starts_with(|ch: char| ch.is_ascii_digit()) {
            continue;
        }
        let token = line.split_whitespace().next().unwrap_or_default();
        match token.parse::<usize>() {
            Ok(index) => selected = Some(index),
            Err(_) => tracing::debug!(token, "popup row does not start with an index"),
        }
    }

    selected.ok_or_else(|| SessionError::InvalidSelection("unable to handle selection".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locations() -> Vec<Location> {
        vec![
            Location {
                path: "/proj/a.c".to_owned(),
                content: "  int main(void)  ".to_owned(),
                line_number: 3,
            },
            Location {
                path: "/proj/b.c".to_owned(),
                content: "main();".to_owned(),
                line_number: 40,
            },
        ]
    }

    #[test]
    fn renders_status_entries_and_content() {
        let lines = render_results(QueryType::Definition, &locations());
        assert_eq!(
            lines,
            vec![
                "~~ 2 matches. ~~ [q to quit] ~~ [<return> to select] ~~",
                "0 /proj/a.c:3",
                "  int main(void)",
                "1 /proj/b.c:40",
                "  main();",
            ]
        );
    }

    #[test]
    fn path_queries_render_one_row_per_result() {
        let lines = render_results(QueryType::Path, &locations());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "1 /proj/b.c:40");
    }

    #[test]
    fn either_row_of_an_entry_selects_it() {
        let lines = render_results(QueryType::Symbol, &locations());

        assert_eq!(selection_at(&lines, 2).expect("entry row"), 0);
        assert_eq!(selection_at(&lines, 3).expect("content row"), 0);
        assert_eq!(selection_at(&lines, 4).expect("second entry"), 1);
        assert_eq!(selection_at(&lines, 5).expect("second content"), 1);
    }

    #[test]
    fn path_popup_selects_the_current_row() {
        let lines = render_results(QueryType::Path, &locations());
        assert_eq!(selection_at(&lines, 3).expect("second row"), 1);
    }

    #[test]
    fn status_row_and_out_of_range_rows_are_rejected() {
        let lines = render_results(QueryType::Symbol, &locations());

        assert!(matches!(
            selection_at(&lines, 1),
            Err(SessionError::InvalidSelection(_))
        ));
        assert!(selection_at(&lines, 0).is_err());
        assert!(selection_at(&lines, 99).is_err());
    }

    #[test]
    fn rows_without_index_are_rejected() {
        let lines = vec![status_line(1), "  text".to_owned(), "  more".to_owned()];
        assert!(matches!(
            selection_at(&lines, 3),
            Err(SessionError::InvalidSelection(_))
        ));
    }
}
