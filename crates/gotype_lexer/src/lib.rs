use logos::Logos;

/// Error produced when a quoted literal cannot be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid literal {literal}: {reason}")]
pub struct UnquoteError {
    pub literal: String,
    pub reason: &'static str,
}

impl UnquoteError {
    fn new(literal: &str, reason: &'static str) -> Self {
        Self { literal: literal.to_string(), reason }
    }
}

/// Decode a Go string or rune literal as written in source (quotes included).
///
/// Raw strings drop carriage returns and take no escapes; interpreted strings
/// and runes accept the full Go escape set (`\x`, octal, `\u`, `\U`).
pub fn unquote(literal: &str) -> Result<String, UnquoteError> {
    let bytes = literal.as_bytes();
    if bytes.len() < 2 || bytes[0] != bytes[bytes.len() - 1] {
        return Err(UnquoteError::new(literal, "missing or mismatched quotes"));
    }
    let quote = bytes[0];
    let inner = &literal[1..literal.len() - 1];
    match quote {
        b'`' => {
            if inner.contains('`') {
                return Err(UnquoteError::new(literal, "back-quote inside raw string"));
            }
            Ok(inner.replace('\r', ""))
        }
        b'"' | b'\'' => {
            let decoded = process_escape_sequences(literal, inner, quote)?;
            if quote == b'\'' && decoded.chars().count() != 1 {
                return Err(UnquoteError::new(literal, "rune literal must hold exactly one character"));
            }
            Ok(decoded)
        }
        _ => Err(UnquoteError::new(literal, "not a quoted literal")),
    }
}

/// Process escape sequences in an interpreted string or rune literal
fn process_escape_sequences(literal: &str, inner: &str, quote: u8) -> Result<String, UnquoteError> {
    let mut out: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        match c {
            '\n' => return Err(UnquoteError::new(literal, "newline in literal")),
            '"' if quote == b'"' => return Err(UnquoteError::new(literal, "unescaped quote")),
            '\'' if quote == b'\'' => return Err(UnquoteError::new(literal, "unescaped quote")),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    return Err(UnquoteError::new(literal, "trailing backslash"));
                };
                match escaped {
                    'a' => out.push(0x07),
                    'b' => out.push(0x08),
                    'f' => out.push(0x0c),
                    'n' => out.push(b'\n'),
                    'r' => out.push(b'\r'),
                    't' => out.push(b'\t'),
                    'v' => out.push(0x0b),
                    '\\' => out.push(b'\\'),
                    '"' if quote == b'"' => out.push(b'"'),
                    '\'' if quote == b'\'' => out.push(b'\''),
                    'x' => {
                        let value = take_digits(&mut chars, 2, 16)
                            .ok_or_else(|| UnquoteError::new(literal, "invalid \\x escape"))?;
                        out.push(value as u8);
                    }
                    'u' | 'U' => {
                        let width = if escaped == 'u' { 4 } else { 8 };
                        let value = take_digits(&mut chars, width, 16)
                            .ok_or_else(|| UnquoteError::new(literal, "invalid unicode escape"))?;
                        let ch = char::from_u32(value)
                            .ok_or_else(|| UnquoteError::new(literal, "escape is not a valid code point"))?;
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                    }
                    '0'..='7' => {
                        let first = escaped as u32 - '0' as u32;
                        let rest = take_digits(&mut chars, 2, 8)
                            .ok_or_else(|| UnquoteError::new(literal, "invalid octal escape"))?;
                        let value = first * 64 + rest;
                        if value > 255 {
                            return Err(UnquoteError::new(literal, "octal escape out of range"));
                        }
                        out.push(value as u8);
                    }
                    _ => return Err(UnquoteError::new(literal, "unknown escape sequence")),
                }
            }
            other => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    String::from_utf8(out).map_err(|_| UnquoteError::new(literal, "escapes produce invalid UTF-8"))
}

fn take_digits(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    count: usize,
    radix: u32,
) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        let (_, c) = chars.next()?;
        value = value * radix + c.to_digit(radix)?;
    }
    Some(value)
}

/// Render `value` as an interpreted Go string literal, escaping quotes,
/// backslashes and non-printable characters.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0b}' => out.push_str("\\v"),
            ' ' => out.push(' '),
            c if c.is_control() || c.is_whitespace() || c == '\u{fffd}' => {
                let code = c as u32;
                if code < 0x80 {
                    out.push_str(&format!("\\x{code:02x}"));
                } else if code < 0x10000 {
                    out.push_str(&format!("\\u{code:04x}"));
                } else {
                    out.push_str(&format!("\\U{code:08x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Span in source code (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end.max(self.start))
    }
}

/// A source comment, delimiters included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

/// A token with its span and the comments that directly precede it
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
    pub comments: Vec<Comment>,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Token {
    // === Keywords the declaration parser cares about ===
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("type")]
    Type,
    #[token("func")]
    Func,
    #[token("var")]
    Var,
    #[token("const")]
    Const,
    #[token("struct")]
    Struct,
    #[token("interface")]
    Interface,
    #[token("map")]
    Map,
    #[token("chan")]
    Chan,

    // === Literals (raw source text) ===
    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().to_string())]
    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| lex.slice().to_string())]
    #[regex(r"0[oO][0-7_]+", |lex| lex.slice().to_string())]
    #[regex(r"0[bB][01_]+", |lex| lex.slice().to_string())]
    Int(String),

    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9_]+)?", |lex| lex.slice().to_string())]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9_]+", |lex| lex.slice().to_string())]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?", |lex| lex.slice().to_string())]
    Float(String),

    #[regex(r#""([^"\\\n]|\\[^\n])*""#, |lex| lex.slice().to_string())]
    #[regex(r"`[^`]*`", |lex| lex.slice().to_string())]
    String(String),

    #[regex(r"'([^'\\\n]|\\[^\n][^'\n]*)'", |lex| lex.slice().to_string())]
    Char(String),

    // === Identifiers ===
    #[regex(r"[\p{L}_][\p{L}\p{Nd}_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // === Comments (dropped or attached by the Lexer wrapper) ===
    #[regex(r"//[^\n]*", |lex| lex.slice().to_string())]
    LineComment(String),
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", |lex| lex.slice().to_string())]
    BlockComment(String),

    #[token("\n")]
    Newline,

    // === Operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AndNot,
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token("&^=")]
    OpAssign,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("<-")]
    Arrow,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("=")]
    Eq,
    #[token(":=")]
    Define,
    #[token("!")]
    Not,
    #[token("~")]
    Tilde,
    #[token("...")]
    Ellipsis,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // === Punctuation ===
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,

    // === Special ===
    Eof,
}

impl Token {
    /// Whether a newline directly after this token terminates the statement
    fn ends_statement(&self) -> bool {
        matches!(
            self,
            Token::Ident(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::String(_)
                | Token::Char(_)
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Inc
                | Token::Dec
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Package => write!(f, "package"),
            Token::Import => write!(f, "import"),
            Token::Type => write!(f, "type"),
            Token::Func => write!(f, "func"),
            Token::Var => write!(f, "var"),
            Token::Const => write!(f, "const"),
            Token::Struct => write!(f, "struct"),
            Token::Interface => write!(f, "interface"),
            Token::Map => write!(f, "map"),
            Token::Chan => write!(f, "chan"),
            Token::Int(s) | Token::Float(s) | Token::String(s) | Token::Char(s) | Token::Ident(s) => {
                write!(f, "{}", s)
            }
            Token::LineComment(s) | Token::BlockComment(s) => write!(f, "{}", s),
            Token::Newline => write!(f, "newline"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Caret => write!(f, "^"),
            Token::Shl => write!(f, "<<"),
            Token::Shr => write!(f, ">>"),
            Token::AndNot => write!(f, "&^"),
            Token::OpAssign => write!(f, "op="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Arrow => write!(f, "<-"),
            Token::Inc => write!(f, "++"),
            Token::Dec => write!(f, "--"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::Eq => write!(f, "="),
            Token::Define => write!(f, ":="),
            Token::Not => write!(f, "!"),
            Token::Tilde => write!(f, "~"),
            Token::Ellipsis => write!(f, "..."),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semi => write!(f, ";"),
            Token::Dot => write!(f, "."),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer wrapper that produces SpannedTokens.
///
/// Applies Go's automatic semicolon insertion: a newline (or a block comment
/// spanning lines) after an identifier, literal, closing delimiter, `++` or
/// `--` becomes a `;`. With comments kept, each comment group is attached to
/// the token that follows it; a trailing line comment therefore ends up on the
/// inserted `;`. A blank line detaches pending comments.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, Token>,
    keep_comments: bool,
    pending: Vec<Comment>,
    last: Option<Token>,
    blank_line: bool,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, keep_comments: bool) -> Self {
        Self {
            inner: Token::lexer(source),
            keep_comments,
            pending: Vec::new(),
            last: None,
            blank_line: false,
            finished: false,
        }
    }

    /// Tokenize the entire source into a Vec, discarding comments
    pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, LexError> {
        Self::collect(Lexer::new(source, false))
    }

    /// Tokenize the entire source into a Vec, attaching comments to tokens
    pub fn tokenize_with_comments(source: &str) -> Result<Vec<SpannedToken>, LexError> {
        Self::collect(Lexer::new(source, true))
    }

    fn collect(mut lexer: Lexer<'_>) -> Result<Vec<SpannedToken>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = lexer.next_token()?;
            let is_eof = spanned.token == Token::Eof;
            tokens.push(spanned);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn emit(&mut self, token: Token, span: Span) -> SpannedToken {
        self.blank_line = false;
        self.last = Some(token.clone());
        SpannedToken {
            token,
            span,
            comments: std::mem::take(&mut self.pending),
        }
    }

    /// Produce a `;` if the previous token ends a statement
    fn auto_semicolon(&mut self, span: Span) -> Option<SpannedToken> {
        if self.last.as_ref().is_some_and(Token::ends_statement) {
            Some(self.emit(Token::Semi, span))
        } else {
            None
        }
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, LexError> {
        if self.finished {
            let len = self.inner.source().len();
            return Ok(self.emit(Token::Eof, Span::new(len, len)));
        }

        loop {
            let Some(next) = self.inner.next() else {
                self.finished = true;
                let len = self.inner.source().len();
                let span = Span::new(len, len);
                if let Some(semi) = self.auto_semicolon(span) {
                    return Ok(semi);
                }
                return Ok(self.emit(Token::Eof, span));
            };
            let range = self.inner.span();
            let span = Span::new(range.start, range.end);

            match next {
                Ok(Token::Newline) => {
                    if let Some(semi) = self.auto_semicolon(span) {
                        return Ok(semi);
                    }
                    if self.blank_line {
                        self.pending.clear();
                    }
                    self.blank_line = true;
                }
                Ok(Token::LineComment(text)) => {
                    self.blank_line = false;
                    if self.keep_comments {
                        self.pending.push(Comment { text, span });
                    }
                }
                Ok(Token::BlockComment(text)) => {
                    self.blank_line = false;
                    let multiline = text.contains('\n');
                    let comment = Comment { text, span };
                    if multiline {
                        if let Some(semi) = self.auto_semicolon(span) {
                            if self.keep_comments {
                                self.pending.push(comment);
                            }
                            return Ok(semi);
                        }
                    }
                    if self.keep_comments {
                        self.pending.push(comment);
                    }
                }
                Ok(token) => return Ok(self.emit(token, span)),
                Err(()) => {
                    return Err(LexError {
                        message: format!("unexpected character: '{}'", self.inner.slice()),
                        span,
                    });
                }
            }
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} at {}..{}", span.start, span.end)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}
