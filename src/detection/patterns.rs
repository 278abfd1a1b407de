//! Text pattern recognition for menus, verdicts and checklists.
//!
//! Everything here is a pure function over text. A miss is an empty result,
//! never an error.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `[K] label` tokens, optionally bolded. Labels run until the next bracket.
static BRACKET_OPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*{0,2}\[([A-Za-z0-9])\]\*{0,2}[ \t]*([^\[\n]*)").expect("valid regex")
});

/// Quote markers and list bullets that may precede an option.
static LINE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:>[ \t]*)*(?:[-*+][ \t]+)?").expect("valid regex"));

static NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:>[ \t]*)*(\d{1,2})[.)][ \t]+(\S.*?)[ \t]*$").expect("valid regex"));

static EXIT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[ \t]*[*/](exit|quit)[ \t]*$").expect("valid regex"));

static CHECKLIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+\[([ xX])\][ \t]+(.+?)[ \t]*$").expect("valid regex"));

static EXPLICIT_VERDICT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t#>*_-]*(?:overall[ \t]+)?(?:verdict|status|result|decision)[*_ \t]*[:=][ \t*_]*([A-Za-z][A-Za-z _-]*)",
    )
    .expect("valid regex")
});

static SUCCESS_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(pass(?:ed)?|approved|success(?:ful)?|ready)\b").expect("valid regex"));

static CONCERN_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(concerns?|warnings?|needs[ \t]+work|partial)\b").expect("valid regex")
});

static FAILURE_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(fail(?:ed|ure)?|rejected|blocked)\b").expect("valid regex"));

/// Shape of a detected menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuType {
    /// `[A] Advanced Elicitation [P] Party Mode [C] Continue`
    Apc,
    /// `[Y] Yes [V] View [N] No`
    Yvn,
    /// `1. option` lines or `[1]` brackets
    Numbered,
    /// Any other bracketed-letter menu
    Bracketed,
    /// A lone exit marker (`[X] Exit`, `*exit`)
    Exit,
}

impl MenuType {
    /// Higher wins when candidates overlap.
    pub fn specificity(self) -> u8 {
        match self {
            Self::Apc | Self::Yvn => 3,
            Self::Exit => 2,
            Self::Bracketed => 1,
            Self::Numbered => 0,
        }
    }

    /// Whether this is one of the canonical BMAD shapes.
    pub fn is_canonical(self) -> bool {
        matches!(self, Self::Apc | Self::Yvn)
    }
}

impl fmt::Display for MenuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apc => write!(f, "A/P/C"),
            Self::Yvn => write!(f, "Y/V/N"),
            Self::Numbered => write!(f, "numbered"),
            Self::Bracketed => write!(f, "bracketed"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// How the options are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuLayout {
    /// All options on a single line
    Inline,
    /// One option per line
    Vertical,
}

/// A single selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    /// Key the user types (`A`, `1`, `exit`)
    pub key: String,
    /// Descriptive label, possibly empty
    pub label: String,
}

impl MenuOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self { key: key.into(), label: label.into() }
    }

    /// Case-insensitive key comparison.
    pub fn matches_key(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key.trim())
    }

    /// Whether the option continues the workflow.
    pub fn is_continue(&self) -> bool {
        let label = self.label.to_lowercase();
        label.starts_with("continue") || label.starts_with("proceed")
    }

    /// Whether the option leaves the current menu.
    pub fn is_exit(&self) -> bool {
        let label = self.label.to_lowercase();
        self.key.eq_ignore_ascii_case("exit")
            || ["exit", "quit", "cancel"].iter().any(|w| label.starts_with(w))
    }
}

impl fmt::Display for MenuOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "[{}]", self.key)
        } else {
            write!(f, "[{}] {}", self.key, self.label)
        }
    }
}

/// A menu-shaped span found in an output block.
///
/// Immutable once produced; scored, then discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    start: usize,
    end: usize,
    menu_type: MenuType,
    layout: MenuLayout,
    options: Vec<MenuOption>,
    raw: String,
}

impl DetectionCandidate {
    fn new(
        text: &str,
        start: usize,
        end: usize,
        layout: MenuLayout,
        options: Vec<MenuOption>,
        menu_type: MenuType,
    ) -> Self {
        Self { start, end, menu_type, layout, options, raw: text[start..end].to_string() }
    }

    /// Byte offset where the candidate's first line begins.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset just past the candidate's last character.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn menu_type(&self) -> MenuType {
        self.menu_type
    }

    pub fn layout(&self) -> MenuLayout {
        self.layout
    }

    pub fn options(&self) -> &[MenuOption] {
        &self.options
    }

    /// The matched substring.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Look up an option by key.
    pub fn option(&self, key: &str) -> Option<&MenuOption> {
        self.options.iter().find(|o| o.matches_key(key))
    }

    pub fn has_exit(&self) -> bool {
        self.options.iter().any(|o| o.is_exit() || o.matches_key("X"))
    }

    pub fn has_continue(&self) -> bool {
        self.options.iter().any(MenuOption::is_continue)
            || (self.menu_type == MenuType::Apc && self.option("C").is_some())
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// A line of text with its byte offsets.
struct Line<'a> {
    start: usize,
    end: usize,
    content: &'a str,
}

fn lines_with_offsets(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let content = raw.trim_end_matches(['\n', '\r']);
        lines.push(Line { start: offset, end: offset + content.len(), content });
        offset += raw.len();
    }
    lines
}

fn clean_label(label: &str) -> String {
    label
        .trim_start_matches(|c: char| c == '*' || c.is_whitespace())
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '|' | '/' | ',' | ';'))
        .to_string()
}

/// Bracket options on a line and whether the line begins with one.
///
/// Checklist items (`- [x] ...`) never carry options.
fn bracket_options(line: &str) -> (Vec<MenuOption>, bool) {
    if CHECKLIST_ITEM.is_match(line) {
        return (Vec::new(), false);
    }

    let prefix_len = LINE_PREFIX.find(line).map_or(0, |m| m.end());
    let body = &line[prefix_len..];

    let mut starts_with_option = false;
    let options = BRACKET_OPTION
        .captures_iter(body)
        .map(|cap| {
            if cap.get(0).map_or(false, |m| m.start() == 0) {
                starts_with_option = true;
            }
            MenuOption::new(cap[1].to_uppercase(), clean_label(&cap[2]))
        })
        .collect();

    (options, starts_with_option)
}

fn classify(options: &[MenuOption]) -> Option<MenuType> {
    let keys: HashSet<String> = options.iter().map(|o| o.key.to_uppercase()).collect();
    if keys.len() != options.len() || options.is_empty() {
        // Duplicate keys are checklists or prose, not menus
        return None;
    }

    let set = |ks: &[&str]| keys.len() == ks.len() && ks.iter().all(|k| keys.contains(*k));

    if keys.iter().all(|k| k.chars().all(|c| c.is_ascii_digit())) {
        Some(MenuType::Numbered)
    } else if set(&["A", "P", "C"]) {
        Some(MenuType::Apc)
    } else if set(&["Y", "V", "N"]) {
        Some(MenuType::Yvn)
    } else if options.len() == 1 {
        let only = &options[0];
        let exit_key = only.matches_key("X") && (only.label.is_empty() || only.is_exit());
        if exit_key || only.is_exit() {
            Some(MenuType::Exit)
        } else if only.is_continue() {
            Some(MenuType::Bracketed)
        } else {
            None
        }
    } else {
        Some(MenuType::Bracketed)
    }
}

fn bracket_candidates(text: &str, lines: &[Line<'_>]) -> Vec<DetectionCandidate> {
    let mut candidates = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let (options, starts) = bracket_options(lines[i].content);
        let is_menu_line = options.len() >= 2 || (starts && !options.is_empty());
        if !is_menu_line {
            i += 1;
            continue;
        }

        let first = i;
        let mut all_options = options;
        i += 1;
        while i < lines.len() {
            let (options, starts) = bracket_options(lines[i].content);
            if starts && !options.is_empty() {
                all_options.extend(options);
                i += 1;
            } else {
                break;
            }
        }

        let last = i - 1;
        let layout = if first == last { MenuLayout::Inline } else { MenuLayout::Vertical };
        if let Some(menu_type) = classify(&all_options) {
            candidates.push(DetectionCandidate::new(
                text,
                lines[first].start,
                lines[last].end,
                layout,
                all_options,
                menu_type,
            ));
        }
    }

    candidates
}

fn numbered_candidates(text: &str, lines: &[Line<'_>]) -> Vec<DetectionCandidate> {
    let mut candidates = Vec::new();
    let mut run: Vec<(usize, MenuOption)> = Vec::new();

    let mut flush = |run: &mut Vec<(usize, MenuOption)>| {
        if run.len() >= 2 {
            let first = run[0].0;
            let last = run[run.len() - 1].0;
            let options: Vec<MenuOption> = run.drain(..).map(|(_, o)| o).collect();
            if classify(&options) == Some(MenuType::Numbered) {
                candidates.push(DetectionCandidate::new(
                    text,
                    lines[first].start,
                    lines[last].end,
                    MenuLayout::Vertical,
                    options,
                    MenuType::Numbered,
                ));
            }
        }
        run.clear();
    };

    for (idx, line) in lines.iter().enumerate() {
        match NUMBERED_ITEM.captures(line.content) {
            Some(cap) => run.push((idx, MenuOption::new(&cap[1], clean_label(&cap[2])))),
            None => flush(&mut run),
        }
    }
    flush(&mut run);

    candidates
}

fn exit_candidates(text: &str, lines: &[Line<'_>]) -> Vec<DetectionCandidate> {
    lines
        .iter()
        .filter_map(|line| {
            let cap = EXIT_LINE.captures(line.content)?;
            let key = cap[1].to_lowercase();
            Some(DetectionCandidate::new(
                text,
                line.start,
                line.end,
                MenuLayout::Inline,
                vec![MenuOption::new(key, "Exit")],
                MenuType::Exit,
            ))
        })
        .collect()
}

/// Keep the most specific, then longest, of any overlapping candidates.
fn resolve_overlaps(mut candidates: Vec<DetectionCandidate>) -> Vec<DetectionCandidate> {
    candidates.sort_by(|a, b| {
        b.menu_type
            .specificity()
            .cmp(&a.menu_type.specificity())
            .then(b.len().cmp(&a.len()))
            .then(a.start.cmp(&b.start))
    });

    let mut kept: Vec<DetectionCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| !k.overlaps(&candidate)) {
            kept.push(candidate);
        }
    }

    kept.sort_by_key(|c| c.start);
    kept
}

/// Find every menu-shaped span in a text block, in text order.
pub fn detect_menus(text: &str) -> Vec<DetectionCandidate> {
    let lines = lines_with_offsets(text);

    let mut candidates = bracket_candidates(text, &lines);
    candidates.extend(numbered_candidates(text, &lines));
    candidates.extend(exit_candidates(text, &lines));

    resolve_overlaps(candidates)
}

/// Whether the text ends in (or contains) a menu offering to continue.
pub fn is_continue_prompt(text: &str) -> bool {
    detect_menus(text).iter().any(DetectionCandidate::has_continue)
}

/// Validation verdict vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Concerns,
    Fail,
}

impl Verdict {
    /// Classify a single word or phrase.
    pub fn from_word(word: &str) -> Option<Self> {
        let word = word.trim();
        if FAILURE_WORDS.is_match(word) {
            Some(Self::Fail)
        } else if CONCERN_WORDS.is_match(word) {
            Some(Self::Concerns)
        } else if SUCCESS_WORDS.is_match(word) {
            Some(Self::Pass)
        } else {
            None
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Concerns => write!(f, "CONCERNS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Hit counts per verdict vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub success: usize,
    pub concern: usize,
    pub failure: usize,
}

/// A verdict found in free-form validation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictMatch {
    pub verdict: Verdict,
    /// Word that decided the verdict
    pub keyword: String,
    /// Came from a `Verdict:`/`Status:` line rather than word counts
    pub explicit: bool,
    pub counts: VerdictCounts,
}

/// Detect a validation verdict.
///
/// An explicit `Verdict:`/`Status:`/`Result:` line wins. Otherwise any
/// failure word beats any concern word, which beats any success word.
pub fn detect_verdict(text: &str) -> Option<VerdictMatch> {
    let counts = VerdictCounts {
        success: SUCCESS_WORDS.find_iter(text).count(),
        concern: CONCERN_WORDS.find_iter(text).count(),
        failure: FAILURE_WORDS.find_iter(text).count(),
    };

    for cap in EXPLICIT_VERDICT.captures_iter(text) {
        let phrase = cap[1].trim();
        if let Some(verdict) = Verdict::from_word(phrase) {
            return Some(VerdictMatch { verdict, keyword: phrase.to_string(), explicit: true, counts });
        }
    }

    let (verdict, pattern) = if counts.failure > 0 {
        (Verdict::Fail, &*FAILURE_WORDS)
    } else if counts.concern > 0 {
        (Verdict::Concerns, &*CONCERN_WORDS)
    } else if counts.success > 0 {
        (Verdict::Pass, &*SUCCESS_WORDS)
    } else {
        return None;
    };

    let keyword = pattern.find(text).map(|m| m.as_str().to_string()).unwrap_or_default();
    Some(VerdictMatch { verdict, keyword, explicit: false, counts })
}

/// A `- [ ]` / `- [x]` checklist line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub checked: bool,
    pub text: String,
}

/// Checklist progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistSummary {
    pub items: Vec<ChecklistItem>,
}

impl ChecklistSummary {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn done(&self) -> usize {
        self.items.iter().filter(|i| i.checked).count()
    }

    pub fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.done() == self.total()
    }

    /// Unchecked item texts, in order.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter(|i| !i.checked).map(|i| i.text.as_str())
    }
}

/// Collect checklist items.
pub fn detect_checklist(text: &str) -> ChecklistSummary {
    let items = CHECKLIST_ITEM
        .captures_iter(text)
        .map(|cap| ChecklistItem {
            checked: cap[1].eq_ignore_ascii_case("x"),
            text: cap[2].to_string(),
        })
        .collect();
    ChecklistSummary { items }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_apc_menu() {
        let text = "Draft complete.\n\n[A] Advanced Elicitation [P] Party Mode [C] Continue";
        let menus = detect_menus(text);

        assert_eq!(menus.len(), 1);
        let menu = &menus[0];
        assert_eq!(menu.menu_type(), MenuType::Apc);
        assert_eq!(menu.layout(), MenuLayout::Inline);
        assert_eq!(menu.options().len(), 3);
        assert_eq!(menu.option("p").unwrap().label, "Party Mode");
        assert_eq!(menu.raw(), "[A] Advanced Elicitation [P] Party Mode [C] Continue");
        assert!(menu.has_continue());
    }

    #[test]
    fn test_vertical_yvn_menu() {
        let text = "Apply changes?\n[Y] Yes, apply\n[V] View diff\n[N] No\n";
        let menus = detect_menus(text);

        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].menu_type(), MenuType::Yvn);
        assert_eq!(menus[0].layout(), MenuLayout::Vertical);
        assert_eq!(&text[menus[0].start()..menus[0].end()], "[Y] Yes, apply\n[V] View diff\n[N] No");
    }

    #[test]
    fn test_bold_brackets() {
        let menus = detect_menus("**[A]** Advanced | **[P]** Party | **[C]** Continue");
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].menu_type(), MenuType::Apc);
        assert_eq!(menus[0].option("A").unwrap().label, "Advanced");
    }

    #[test]
    fn test_case_insensitive_keys() {
        let menus = detect_menus("[a] advanced [p] party [c] continue");
        assert_eq!(menus[0].menu_type(), MenuType::Apc);
    }

    #[test]
    fn test_numbered_menu() {
        let text = "Choose a workflow:\n1. Create PRD\n2. Create architecture\n3) Exit";
        let menus = detect_menus(text);

        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].menu_type(), MenuType::Numbered);
        assert_eq!(menus[0].options()[2].label, "Exit");
    }

    #[test]
    fn test_single_numbered_line_is_not_a_menu() {
        assert!(detect_menus("1. Only one item").is_empty());
    }

    #[test]
    fn test_exit_markers() {
        let menus = detect_menus("Done for now.\n[X] Exit");
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].menu_type(), MenuType::Exit);

        let menus = detect_menus("Type a command or\n*exit");
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].menu_type(), MenuType::Exit);
        assert!(menus[0].has_exit());
    }

    #[test]
    fn test_checklist_is_not_a_menu() {
        let text = "- [x] write tests\n- [x] update docs\n- [ ] release";
        assert!(detect_menus(text).is_empty());
    }

    #[test]
    fn test_checked_items_with_menu_words_are_not_menus() {
        let text = "## Progress\n- [x] Continue drafting epics section\n";
        assert!(detect_menus(text).is_empty());
        assert!(!is_continue_prompt(text));

        assert!(detect_menus("- [x] Exit criteria reviewed").is_empty());
        assert!(detect_menus("* [X] Quit the legacy flow").is_empty());
    }

    #[test]
    fn test_menu_after_checklist_still_detected() {
        let text = "- [x] Goals\n- [ ] Metrics\n\n[C] Continue";
        let menus = detect_menus(text);

        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].raw(), "[C] Continue");
        assert!(is_continue_prompt(text));
    }

    #[test]
    fn test_multiple_menus_in_order() {
        let text = "[Y] Yes [N] No\n\nsome prose in between\n\n[A] A1 [P] P1 [C] C1";
        let menus = detect_menus(text);

        assert_eq!(menus.len(), 2);
        assert!(menus[0].start() < menus[1].start());
        assert_eq!(menus[0].menu_type(), MenuType::Bracketed);
        assert_eq!(menus[1].menu_type(), MenuType::Apc);
    }

    #[test]
    fn test_overlap_prefers_specific() {
        // Numbered lines that also carry an A/P/C bracket menu
        let text = "1. [A] Advanced [P] Party [C] Continue\n2. Something else";
        let menus = detect_menus(text);

        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].menu_type(), MenuType::Apc);
    }

    #[test]
    fn test_is_continue_prompt() {
        assert!(is_continue_prompt("[C] Continue to next step"));
        assert!(is_continue_prompt("[A] Adv [P] Party [C] Go"));
        assert!(!is_continue_prompt("[Y] Yes [N] No"));
        assert!(!is_continue_prompt("nothing here"));
    }

    #[test]
    fn test_explicit_verdict_wins() {
        let text = "Two minor warnings found.\n\n**Verdict:** PASS";
        let found = detect_verdict(text).unwrap();

        assert_eq!(found.verdict, Verdict::Pass);
        assert!(found.explicit);
        assert_eq!(found.counts.concern, 1);
    }

    #[test]
    fn test_failure_beats_success_without_explicit_line() {
        let found = detect_verdict("Unit tests passed but integration FAILED").unwrap();
        assert_eq!(found.verdict, Verdict::Fail);
        assert!(!found.explicit);
        assert_eq!(found.keyword, "FAILED");
    }

    #[test]
    fn test_concerns_verdict() {
        let found = detect_verdict("Status: NEEDS WORK").unwrap();
        assert_eq!(found.verdict, Verdict::Concerns);
    }

    #[test]
    fn test_no_verdict() {
        assert!(detect_verdict("The document describes the architecture.").is_none());
    }

    #[test]
    fn test_checklist_progress() {
        let summary = detect_checklist("- [x] one\n* [ ] two\n+ [X] three\nnot an item [ ]");

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.done(), 2);
        assert!(!summary.is_complete());
        assert_eq!(summary.pending().collect::<Vec<_>>(), vec!["two"]);
    }
}
