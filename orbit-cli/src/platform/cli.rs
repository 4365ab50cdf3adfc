//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和源码上下文打印。

use orbit_api::Error;

/// 打印错误；`source` 是出错文件的源码时同时显示上下文
pub fn print_error(e: &Error, source: Option<&str>, json: bool) {
    if json {
        println!("{}", e.to_report().to_json());
        return;
    }

    match e.file() {
        Some(file) => eprintln!("❌ {} ({})", e.to_report(), file),
        None => eprintln!("❌ {}", e.to_report()),
    }

    if let (Some(source), Some(line)) = (source, e.line()) {
        print_source_context(source, line as usize, e.column().map(|c| c as usize));
    }
}

/// 打印源代码上下文（显示错误行前后几行）
fn print_source_context(source: &str, error_line: usize, error_col: Option<usize>) {
    for line in render_source_context(source, error_line, error_col) {
        eprintln!("{line}");
    }
}

fn render_source_context(source: &str, error_line: usize, error_col: Option<usize>) -> Vec<String> {
    const CONTEXT_LINES: usize = 2; // 错误行前后显示的上下文行数

    let lines: Vec<&str> = source.lines().collect();
    if error_line == 0 || error_line > lines.len() {
        return Vec::new();
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(lines.len());
    // 行号的最大宽度用于对齐
    let width = end_line.to_string().len();

    let separator = format!("{}|--", "-".repeat(width + 1));
    let mut out = vec![separator.clone()];
    for line_idx in start_line..=end_line {
        out.push(format!("{line_idx:>width$} | {}", lines[line_idx - 1]));
        if line_idx == error_line {
            if let Some(col) = error_col {
                out.push(format!("{} | {}^", " ".repeat(width), " ".repeat(col.saturating_sub(1))));
            }
        }
    }
    out.push(separator);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_context_with_caret() {
        let source = "var a = 1\nvar b = \nvar c = 3";
        assert_eq!(
            render_source_context(source, 2, Some(9)),
            vec![
                "--|--".to_string(),
                "1 | var a = 1".to_string(),
                "2 | var b = ".to_string(),
                "  |         ^".to_string(),
                "3 | var c = 3".to_string(),
                "--|--".to_string(),
            ]
        );
    }

    #[test]
    fn test_line_out_of_range() {
        assert!(render_source_context("one line", 5, None).is_empty());
        assert!(render_source_context("one line", 0, Some(1)).is_empty());
    }

    #[test]
    fn test_without_column_has_no_caret() {
        let rendered = render_source_context("a\nb", 1, None);
        assert_eq!(rendered.len(), 4);
        assert!(!rendered.iter().any(|l| l.contains('^')));
    }
}
