//! Terminal output for answers and REPL feedback.
//!
//! Streamed answers are printed raw as they arrive. Blocking answers are
//! rendered once in the selected [`RenderMode`]: markdown prose through
//! `termimad` and fenced code or JSON through `syntect`.

use std::io::Write;

use console::style;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;
use termimad::MadSkin;
use termimad::crossterm::style::Color;

use parley_types::config::RenderMode;
use parley_types::llm::AnswerUsage;

const THEME: &str = "base16-ocean.dark";

pub struct ChatRenderer {
    skin: MadSkin,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl Default for ChatRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatRenderer {
    pub fn new() -> Self {
        let mut skin = MadSkin::default_dark();
        skin.bold.set_fg(Color::Cyan);
        skin.headers[0].set_fg(Color::Cyan);
        skin.headers[1].set_fg(Color::Cyan);
        skin.inline_code.set_fg(Color::Yellow);

        Self {
            skin,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Render a complete answer in `mode`.
    pub fn render(&self, mode: RenderMode, content: &str) -> String {
        match mode {
            RenderMode::Text => content.to_string(),
            RenderMode::Markdown => self.render_final(content),
            RenderMode::Json => self.highlight_lines(content, "json", ""),
        }
    }

    /// Render a complete markdown answer.
    pub fn render_final(&self, markdown: &str) -> String {
        let mut output = String::new();
        let mut code_lang: Option<String> = None;
        let mut code_buf = String::new();

        for line in markdown.lines() {
            let fence = line.trim_start().starts_with("```");
            match (&code_lang, fence) {
                (None, true) => {
                    code_lang = Some(line.trim_start().trim_start_matches('`').trim().to_string());
                    code_buf.clear();
                }
                (Some(lang), true) => {
                    output.push_str(&self.highlight_code(&code_buf, lang));
                    code_lang = None;
                }
                (Some(_), false) => {
                    code_buf.push_str(line);
                    code_buf.push('\n');
                }
                (None, false) => output.push_str(&self.skin.term_text(line).to_string()),
            }
        }

        if let Some(lang) = &code_lang {
            if !code_buf.is_empty() {
                output.push_str(&self.highlight_code(&code_buf, lang));
            }
        }
        output
    }

    pub fn print_delta(&self, delta: &str) {
        print!("{delta}");
        let _ = std::io::stdout().flush();
    }

    /// Print text returned by a command.
    pub fn print_display(&self, text: &str) {
        if !text.is_empty() {
            println!("{}", style(text).blue());
        }
    }

    pub fn print_notice(&self, text: &str) {
        println!("{}", style(text).blue());
    }

    pub fn print_error(&self, err: &dyn std::fmt::Display) {
        eprintln!("{}", style(err).red());
    }

    /// Token usage of a blocking answer.
    pub fn print_cost(&self, usage: &AnswerUsage) {
        println!("{}", style(cost_line(usage)).dim());
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let header = format!("  {}\n", style(format!("--- {lang} ---")).dim());
        header + &self.highlight_lines(code, lang, "  ")
    }

    fn highlight_lines(&self, code: &str, lang: &str, indent: &str) -> String {
        let syntax = if lang.is_empty() {
            self.syntax_set.find_syntax_plain_text()
        } else {
            self.syntax_set
                .find_syntax_by_token(lang)
                .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
        };
        let Some(theme) = self.theme_set.themes.get(THEME) else {
            return code.to_string();
        };
        let mut highlighter = HighlightLines::new(syntax, theme);

        let mut output = String::new();
        for line in code.lines() {
            let ranges: Vec<(Style, &str)> = highlighter
                .highlight_line(line, &self.syntax_set)
                .unwrap_or_default();
            let escaped = as_24_bit_terminal_escaped(&ranges[..], false);
            output.push_str(&format!("{indent}{escaped}\x1b[0m\n"));
        }
        output
    }
}

pub fn cost_line(usage: &AnswerUsage) -> String {
    format!(
        "Cost : prompt({}) completion({}) total({})",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    )
}
