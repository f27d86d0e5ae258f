//! Inline markup for report prose.
//!
//! Narrative paragraphs are written as small markup strings and turned into [`Span`]s:
//!
//! - `**bold**` and `*italic*`
//! - `[color=#RRGGBB]{text}` for coloured text
//! - `[link=#RRGGBB]{text}` for underlined, coloured link text
//! - `\*`, `\[`, `\]`, `\{`, `\}` and `\\` for literal characters
//!
//! Values interpolated into markup (market names, chain names) should go through
//! [`escape_markup`] first.

use std::fmt;

use genpdf::style::{Color, Style, StyledString};

use crate::config::Rgb;

/// A run of text sharing one inline style.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
    italic: bool,
    color: Option<Color>,
    underline: bool,
}

impl Span {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn is_italic(&self) -> bool {
        self.italic
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn is_underlined(&self) -> bool {
        self.underline
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    pub fn colored(mut self, color: impl Into<Color>) -> Self {
        self.color = Some(color.into());
        self
    }

    fn style(&self) -> Style {
        let mut style = Style::new();
        if let Some(color) = self.color {
            style.set_color(color);
        }
        if self.bold {
            style.set_bold();
        }
        if self.italic {
            style.set_italic();
        }
        style
    }

    /// The span as a `genpdf` string. Underlines are carried separately by [`StyledSpan`].
    pub fn to_styled_string(&self) -> StyledString {
        StyledString::new(self.text.clone(), self.style())
    }
}

impl From<&Span> for StyledString {
    fn from(span: &Span) -> Self {
        span.to_styled_string()
    }
}

/// A `genpdf` string plus the underline flag the element layer draws by hand.
#[derive(Clone, Debug)]
pub struct StyledSpan {
    pub string: StyledString,
    pub underline: bool,
}

impl From<&Span> for StyledSpan {
    fn from(span: &Span) -> Self {
        Self {
            string: span.to_styled_string(),
            underline: span.underline,
        }
    }
}

/// Concatenated text of `spans` with all styling dropped.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(Span::text).collect()
}

/// Escapes characters that [`parse_markup`] would otherwise treat as syntax.
pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '*' | '[' | ']' | '{' | '}' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Markup error with the byte offset at which it was detected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    index: usize,
    message: String,
}

impl ParseError {
    fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.index)
    }
}

impl std::error::Error for ParseError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Group {
    Bold,
    Italic,
    Braced,
}

impl Group {
    fn closing(self) -> &'static str {
        match self {
            Group::Bold => "**",
            Group::Italic => "*",
            Group::Braced => "}",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Group::Bold => "bold span",
            Group::Italic => "italic span",
            Group::Braced => "`{...}` group",
        }
    }
}

struct Frame {
    group: Group,
    opened_at: usize,
    previous: Span,
}

/// Parses report markup into spans.
pub fn parse_markup(input: &str) -> Result<Vec<Span>, ParseError> {
    let mut spans = Vec::new();
    let mut current = Span::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut index = 0;

    while index < input.len() {
        let rest = &input[index..];

        if let Some(frame) = stack.last() {
            if rest.starts_with(frame.group.closing())
                // `**` must not be read as two italic markers inside an italic span.
                && !(frame.group == Group::Italic && rest.starts_with("**"))
            {
                let len = frame.group.closing().len();
                flush(&mut current, &mut spans);
                if let Some(frame) = stack.pop() {
                    current = frame.previous;
                }
                index += len;
                continue;
            }
        }

        if let Some(escaped) = rest.strip_prefix('\\') {
            let Some(ch) = escaped.chars().next() else {
                return Err(ParseError::new(index, "dangling escape at end of input"));
            };
            current.text.push(ch);
            index += 1 + ch.len_utf8();
            continue;
        }

        if rest.starts_with("**") || rest.starts_with('*') {
            let group = if rest.starts_with("**") {
                Group::Bold
            } else {
                Group::Italic
            };
            let mut next = styled_like(&current);
            match group {
                Group::Bold => next.bold = true,
                _ => next.italic = true,
            }
            open(&mut stack, &mut spans, &mut current, group, index, next);
            index += group.closing().len();
            continue;
        }

        if rest.starts_with('[') {
            let (directive, after) = parse_directive(input, index)?;
            let mut next = styled_like(&current);
            next.color = Some(directive.color.into());
            next.underline |= directive.underline;
            open(&mut stack, &mut spans, &mut current, Group::Braced, index, next);
            index = after;
            continue;
        }

        if rest.starts_with(['}', ']', '{']) {
            return Err(ParseError::new(
                index,
                format!("unexpected `{}`", &rest[..1]),
            ));
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        current.text.push(ch);
        index += ch.len_utf8();
    }

    if let Some(frame) = stack.last() {
        return Err(ParseError::new(
            frame.opened_at,
            format!("unterminated {}", frame.group.name()),
        ));
    }

    flush(&mut current, &mut spans);
    Ok(spans)
}

/// An empty span carrying `span`'s style.
fn styled_like(span: &Span) -> Span {
    Span {
        text: String::new(),
        ..span.clone()
    }
}

fn open(
    stack: &mut Vec<Frame>,
    spans: &mut Vec<Span>,
    current: &mut Span,
    group: Group,
    opened_at: usize,
    next: Span,
) {
    flush(current, spans);
    let previous = std::mem::replace(current, next);
    stack.push(Frame {
        group,
        opened_at,
        previous,
    });
}

fn flush(current: &mut Span, spans: &mut Vec<Span>) {
    if !current.text.is_empty() {
        let style = styled_like(current);
        spans.push(std::mem::replace(current, style));
    }
}

struct Directive {
    color: Rgb,
    underline: bool,
}

/// Parses `[color=#RRGGBB]{` or `[link=#RRGGBB]{` starting at `index`.
fn parse_directive(input: &str, index: usize) -> Result<(Directive, usize), ParseError> {
    let rest = &input[index..];
    let (underline, value_start) = if rest.starts_with("[color=") {
        (false, index + "[color=".len())
    } else if rest.starts_with("[link=") {
        (true, index + "[link=".len())
    } else {
        return Err(ParseError::new(
            index,
            "unsupported directive; expected `[color=#RRGGBB]{...}` or `[link=#RRGGBB]{...}`",
        ));
    };

    let Some(close) = input[value_start..].find(']') else {
        return Err(ParseError::new(value_start, "expected `]` to close directive"));
    };
    let value = &input[value_start..value_start + close];
    if !value.starts_with('#') {
        return Err(ParseError::new(
            value_start,
            "expected `#` followed by a hexadecimal RGB value",
        ));
    }
    let color = Rgb::from_hex(value).ok_or_else(|| {
        ParseError::new(
            value_start,
            "invalid RGB specification; expected 6 hexadecimal digits",
        )
    })?;

    let brace = value_start + close + 1;
    if !input[brace..].starts_with('{') {
        return Err(ParseError::new(brace, "expected `{` after directive"));
    }

    Ok((Directive { color, underline }, brace + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_span() {
        let spans = parse_markup("Report generated: 2024-06-17 09:00 UTC").unwrap();
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].is_bold());
        assert_eq!(plain_text(&spans), "Report generated: 2024-06-17 09:00 UTC");
    }

    #[test]
    fn tldr_markup() {
        let spans = parse_markup(
            "Morpho processed **$2.8M** in liquidations [color=#27AE60]{with zero realized bad debt}.",
        )
        .unwrap();
        let texts: Vec<_> = spans.iter().map(Span::text).collect();
        assert_eq!(
            texts,
            ["Morpho processed ", "$2.8M", " in liquidations ", "with zero realized bad debt", "."]
        );
        assert!(spans[1].is_bold());
        assert_eq!(spans[3].color(), Some(Color::Rgb(0x27, 0xAE, 0x60)));
        assert!(!spans[4].is_bold());
        assert_eq!(spans[4].color(), None);
    }

    #[test]
    fn nested_styles_inherit() {
        let spans = parse_markup("**bold *both* [color=#C0392B]{red}** after").unwrap();
        assert_eq!(spans.len(), 5);
        assert!(spans[1].is_bold() && spans[1].is_italic());
        assert!(spans[3].is_bold());
        assert_eq!(spans[3].color(), Some(Color::Rgb(0xC0, 0x39, 0x2B)));
        assert!(!spans[4].is_bold());
    }

    #[test]
    fn link_directive_underlines() {
        let spans = parse_markup("[link=#245CA0]{Morpho Risk Dashboard} (data.morpho.org/risk)").unwrap();
        assert!(spans[0].is_underlined());
        assert!(!spans[1].is_underlined());
        let styled = StyledSpan::from(&spans[0]);
        assert!(styled.underline);
        assert_eq!(styled.string.style.color(), Some(Color::Rgb(0x24, 0x5C, 0xA0)));
    }

    #[test]
    fn escaped_values_round_trip() {
        let market = "wstETH/USDC [*legacy*] {v2}";
        let spans = parse_markup(&format!("Market **{}**", escape_markup(market))).unwrap();
        assert_eq!(spans[1].text(), market);
        assert!(spans[1].is_bold());
    }

    #[test]
    fn errors_point_at_the_problem() {
        let err = parse_markup("total **$1.2M").unwrap_err();
        assert!(err.message().contains("unterminated bold"));
        assert_eq!(err.index(), 6);

        let err = parse_markup("[color=#12FG34]{x}").unwrap_err();
        assert!(err.message().contains("invalid RGB"));

        let err = parse_markup("[size=12]{x}").unwrap_err();
        assert!(err.message().contains("unsupported directive"));

        let err = parse_markup("stray }").unwrap_err();
        assert_eq!(err.index(), 6);
    }
}
