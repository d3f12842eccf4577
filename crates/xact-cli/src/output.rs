use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Column-aligned text table. Empty cells show as `-`.
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cell<'a>(row: &'a [String], i: usize) -> &'a str {
        match row.get(i).map(String::as_str) {
            Some("") | None => "-",
            Some(cell) => cell,
        }
    }

    fn widths(&self) -> Vec<usize> {
        (0..self.headers.len())
            .map(|i| {
                self.rows
                    .iter()
                    .map(|row| Self::cell(row, i).chars().count())
                    .chain(std::iter::once(self.headers[i].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn line<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
        let padded: Vec<String> = cells
            .zip(widths)
            .map(|(cell, &w)| format!("{cell:w$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let rules: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(Self::line(&widths, self.headers.iter().copied()));
        out.push(Self::line(&widths, rules.iter().map(String::as_str)));
        for row in &self.rows {
            out.push(Self::line(&widths, (0..widths.len()).map(|i| Self::cell(row, i))));
        }
        out.join("\n")
    }

    pub fn print(&self) {
        println!("{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let mut table = Table::new(&["NAME", "KIND"]);
        table.push(vec!["sword".to_string(), "participant".to_string()]);
        table.push(vec!["cup".to_string(), "legacy".to_string()]);
        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "NAME   KIND");
        assert_eq!(lines[1], "-----  -----------");
        assert_eq!(lines[2], "sword  participant");
        assert_eq!(lines[3], "cup    legacy");
    }

    #[test]
    fn missing_and_empty_cells_show_a_dash() {
        let mut table = Table::new(&["NAME", "SENDABLE", "RECEIVABLE"]);
        table.push(vec!["shield".to_string(), String::new()]);
        let rendered = table.render();
        assert_eq!(rendered.lines().nth(2), Some("shield  -         -"));
        assert!(!table.is_empty());
    }
}
