use gotype_ast::*;
use gotype_lexer::{Lexer, Span, SpannedToken, Token, unquote};

/// Whether comments are kept and attached to declarations and fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Plain,
    Comments,
}

pub struct Parser<'src> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'src str,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} at {}..{}", span.start, span.end)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }

    /// Render a plain-text diagnostic pointing at the offending source range
    pub fn render(&self, file: &str, source: &str) -> String {
        use ariadne::{Config, Label, Report, ReportKind, Source};

        let file = file.to_string();
        // errors at end of input point at the last character
        let mut start = self.span.start.min(source.len());
        while start > 0 && (start == source.len() || !source.is_char_boundary(start)) {
            start -= 1;
        }
        let first_len = source[start..].chars().next().map_or(0, char::len_utf8);
        let end = self.span.end.min(source.len()).max(start + first_len);
        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, file.clone(), start)
            .with_config(Config::default().with_color(false))
            .with_message(&self.message)
            .with_label(Label::new((file.clone(), start..end)).with_message(&self.message))
            .finish()
            .write((file, Source::from(source)), &mut out);
        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, mode: ParseMode) -> ParseResult<Self> {
        let tokens = match mode {
            ParseMode::Plain => Lexer::tokenize(source),
            ParseMode::Comments => Lexer::tokenize_with_comments(source),
        }
        .map_err(|e| ParseError::new(e.message, e.span))?;
        Ok(Self { tokens, pos: 0, source })
    }

    /// Parse a complete Go source file
    pub fn parse_file(source: &str, mode: ParseMode) -> ParseResult<SourceFile> {
        let mut parser = Parser::new(source, mode)?;
        parser.parse_source_file()
    }

    /// Parse a standalone type expression such as `struct{ID int}` or `[]*Foo`
    pub fn parse_type_definition(source: &str) -> ParseResult<TypeExpr> {
        let mut parser = Parser::new(source, ParseMode::Plain)?;
        let ty = parser.parse_type()?;
        parser.eat(&Token::Semi);
        if !parser.is_at_end() {
            return Err(parser.error(format!("unexpected '{}' after type", parser.peek())));
        }
        Ok(ty)
    }

    // === Token Access ===

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn peek_span(&self) -> Span {
        self.current().span
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn advance(&mut self) -> &SpannedToken {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<SpannedToken> {
        if self.check(&expected) {
            Ok(self.advance().clone())
        } else {
            Err(self.error(format!("expected '{}', found '{}'", expected, self.peek())))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let span = self.peek_span();
                self.advance();
                Ok(Ident::new(name, span))
            }
            _ => Err(self.error(format!("expected identifier, found '{}'", self.peek()))),
        }
    }

    /// `;` may be omitted before a closing `)` or `}`
    fn expect_semi(&mut self) -> ParseResult<()> {
        if self.eat(&Token::Semi) || matches!(self.peek(), Token::RParen | Token::RBrace | Token::Eof) {
            Ok(())
        } else {
            Err(self.error(format!("expected ';', found '{}'", self.peek())))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.peek_span())
    }

    fn text(&self, span: Span) -> &'src str {
        &self.source[span.start..span.end]
    }

    fn doc_comment(&self) -> Option<CommentGroup> {
        CommentGroup::from_comments(self.current().comments.clone())
    }

    /// Comments on the `;` inserted at the end of the line
    fn trailing_comment(&self) -> Option<CommentGroup> {
        if self.check(&Token::Semi) {
            CommentGroup::from_comments(self.current().comments.clone())
        } else {
            None
        }
    }

    /// Consume a bracketed group including nested groups of the same kind
    fn skip_group(&mut self, open: Token, close: Token) -> ParseResult<Span> {
        let start = self.expect(open.clone())?.span;
        let mut depth = 1usize;
        loop {
            if self.is_at_end() {
                return Err(ParseError::new(format!("unclosed '{}'", open), start));
            }
            let (is_open, is_close, span) = {
                let tok = self.advance();
                (tok.token == open, tok.token == close, tok.span)
            };
            if is_open {
                depth += 1;
            } else if is_close {
                depth -= 1;
                if depth == 0 {
                    return Ok(start.to(span));
                }
            }
        }
    }

    // === Declarations ===

    fn parse_source_file(&mut self) -> ParseResult<SourceFile> {
        self.expect(Token::Package)?;
        let package = self.expect_ident()?;
        self.expect_semi()?;

        let mut imports = Vec::new();
        while self.check(&Token::Import) {
            self.parse_import_decl(&mut imports)?;
        }

        let mut decls = Vec::new();
        while !self.is_at_end() {
            if self.eat(&Token::Semi) {
                continue;
            }
            self.parse_decl(&mut decls)?;
        }

        Ok(SourceFile { package, imports, decls })
    }

    fn parse_import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> ParseResult<()> {
        self.expect(Token::Import)?;
        if self.eat(&Token::LParen) {
            while !self.check(&Token::RParen) && !self.is_at_end() {
                if self.eat(&Token::Semi) {
                    continue;
                }
                imports.push(self.parse_import_spec()?);
                self.expect_semi()?;
            }
            self.expect(Token::RParen)?;
        } else {
            imports.push(self.parse_import_spec()?);
        }
        self.expect_semi()
    }

    fn parse_import_spec(&mut self) -> ParseResult<ImportSpec> {
        let start = self.peek_span();
        let name = match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Some(Ident::new(name, start))
            }
            Token::Dot => {
                self.advance();
                Some(Ident::new(".".to_string(), start))
            }
            _ => None,
        };
        let span = self.peek_span();
        let Token::String(raw) = self.peek().clone() else {
            return Err(self.error(format!("expected import path, found '{}'", self.peek())));
        };
        self.advance();
        let path = unquote(&raw).map_err(|e| ParseError::new(e.to_string(), span))?;
        Ok(ImportSpec { name, path, span: start.to(span) })
    }

    fn parse_decl(&mut self, decls: &mut Vec<Decl>) -> ParseResult<()> {
        match self.peek() {
            Token::Type => self.parse_type_decl(decls),
            Token::Func => {
                let func = self.parse_func_decl()?;
                decls.push(Decl::Func(func));
                self.expect_semi()
            }
            Token::Const | Token::Var => self.parse_value_decl(decls),
            Token::Import => Err(self.error("imports must appear before other declarations")),
            _ => Err(self.error(format!(
                "expected declaration (type, func, var, const), found '{}'",
                self.peek()
            ))),
        }
    }

    fn parse_type_decl(&mut self, decls: &mut Vec<Decl>) -> ParseResult<()> {
        let doc = self.doc_comment();
        self.expect(Token::Type)?;
        if self.eat(&Token::LParen) {
            while !self.check(&Token::RParen) && !self.is_at_end() {
                if self.eat(&Token::Semi) {
                    continue;
                }
                let doc = self.doc_comment();
                decls.push(Decl::Type(self.parse_type_spec(doc)?));
            }
            self.expect(Token::RParen)?;
            self.expect_semi()
        } else {
            decls.push(Decl::Type(self.parse_type_spec(doc)?));
            Ok(())
        }
    }

    fn parse_type_spec(&mut self, doc: Option<CommentGroup>) -> ParseResult<TypeSpec> {
        let name = self.expect_ident()?;
        let type_params = if self.check(&Token::LBracket) && self.starts_type_params() {
            self.parse_type_params()?
        } else {
            Vec::new()
        };
        let is_alias = self.eat(&Token::Eq);
        let ty = self.parse_type()?;
        let comment = self.trailing_comment();
        self.expect_semi()?;
        let span = name.span.to(ty.span);
        Ok(TypeSpec { name, type_params, is_alias, ty, doc, comment, span })
    }

    /// `type L[T any] ...` vs `type A [N]int`
    fn starts_type_params(&self) -> bool {
        matches!(self.peek_at(1), Token::Ident(_))
            && !matches!(self.peek_at(2), Token::RBracket | Token::Dot)
    }

    fn parse_type_params(&mut self) -> ParseResult<Vec<Field>> {
        self.expect(Token::LBracket)?;
        let mut params = Vec::new();
        let mut names: Vec<Ident> = Vec::new();
        while !self.check(&Token::RBracket) && !self.is_at_end() {
            names.push(self.expect_ident()?);
            if !matches!(self.peek(), Token::Comma | Token::RBracket) {
                let ty = self.parse_constraint()?;
                let span = names[0].span.to(ty.span);
                params.push(Field {
                    names: std::mem::take(&mut names),
                    ty,
                    tag: None,
                    doc: None,
                    comment: None,
                    span,
                });
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if !names.is_empty() {
            return Err(self.error("type parameter is missing a constraint"));
        }
        self.expect(Token::RBracket)?;
        Ok(params)
    }

    /// Type constraint; unions and `~T` terms are kept as source text
    fn parse_constraint(&mut self) -> ParseResult<TypeExpr> {
        let start = self.peek_span();
        let tilde = self.eat(&Token::Tilde);
        let first = self.parse_type()?;
        if !tilde && !self.check(&Token::Pipe) {
            return Ok(first);
        }
        while self.eat(&Token::Pipe) {
            self.eat(&Token::Tilde);
            self.parse_type()?;
        }
        let span = start.to(self.prev_span());
        Ok(TypeExpr::new(TypeKind::Interface(vec![self.text(span).to_string()]), span))
    }

    fn parse_func_decl(&mut self) -> ParseResult<FuncDecl> {
        let doc = self.doc_comment();
        let start = self.expect(Token::Func)?.span;
        let recv = if self.check(&Token::LParen) {
            Some(self.parse_receiver()?)
        } else {
            None
        };
        let name = self.expect_ident()?;
        if self.check(&Token::LBracket) {
            self.skip_group(Token::LBracket, Token::RBracket)?;
        }
        let mut end = self.parse_signature()?;
        let has_body = self.check(&Token::LBrace);
        if has_body {
            end = self.skip_group(Token::LBrace, Token::RBrace)?;
        }
        Ok(FuncDecl { name, recv, doc, has_body, span: start.to(end) })
    }

    fn parse_receiver(&mut self) -> ParseResult<Receiver> {
        self.expect(Token::LParen)?;
        let named = matches!(
            (self.peek(), self.peek_at(1)),
            (Token::Ident(_), Token::Ident(_) | Token::Star | Token::LParen)
        );
        let name = if named { Some(self.expect_ident()?) } else { None };
        let ty = self.parse_type()?;
        self.eat(&Token::Comma);
        self.expect(Token::RParen)?;
        Ok(Receiver { name, ty })
    }

    /// Parameters and results; returns the span covering both
    fn parse_signature(&mut self) -> ParseResult<Span> {
        let params = self.skip_group(Token::LParen, Token::RParen)?;
        let end = if self.check(&Token::LParen) {
            self.skip_group(Token::LParen, Token::RParen)?
        } else if self.starts_type() {
            self.parse_type()?.span
        } else {
            params
        };
        Ok(params.to(end))
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            Token::Ident(_)
                | Token::Star
                | Token::LBracket
                | Token::Map
                | Token::Chan
                | Token::Func
                | Token::Struct
                | Token::Interface
                | Token::Arrow
        )
    }

    fn parse_value_decl(&mut self, decls: &mut Vec<Decl>) -> ParseResult<()> {
        let doc = self.doc_comment();
        let kind = if self.eat(&Token::Const) {
            ValueKind::Const
        } else {
            self.expect(Token::Var)?;
            ValueKind::Var
        };
        if self.eat(&Token::LParen) {
            while !self.check(&Token::RParen) && !self.is_at_end() {
                if self.eat(&Token::Semi) {
                    continue;
                }
                let doc = self.doc_comment();
                decls.push(Decl::Value(self.parse_value_spec(kind, doc)?));
            }
            self.expect(Token::RParen)?;
            self.expect_semi()
        } else {
            decls.push(Decl::Value(self.parse_value_spec(kind, doc)?));
            Ok(())
        }
    }

    fn parse_value_spec(&mut self, kind: ValueKind, doc: Option<CommentGroup>) -> ParseResult<ValueSpec> {
        let names = self.parse_ident_list()?;
        let ty = if matches!(self.peek(), Token::Eq | Token::Semi | Token::RParen) {
            None
        } else {
            Some(self.parse_type()?)
        };
        let mut values = Vec::new();
        if self.eat(&Token::Eq) {
            loop {
                values.push(self.parse_value_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let span = names[0].span.to(self.prev_span());
        self.expect_semi()?;
        Ok(ValueSpec { kind, names, ty, values, doc, span })
    }

    /// Single-token literals and identifiers are classified; anything else
    /// is kept as source text
    fn parse_value_expr(&mut self) -> ParseResult<ValueExpr> {
        let first = self.pos;
        let start = self.peek_span();
        let mut end = start;
        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.peek() {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace if depth > 0 => depth -= 1,
                Token::RParen | Token::RBracket | Token::RBrace | Token::Comma | Token::Semi => break,
                _ => {}
            }
            end = self.advance().span;
        }
        if self.pos == first {
            return Err(self.error(format!("expected expression, found '{}'", self.peek())));
        }
        if self.pos - first == 1 {
            let token = &self.tokens[first].token;
            if let Some(lit) = basic_lit(token, start) {
                return Ok(ValueExpr::Lit(lit));
            }
            if let Token::Ident(name) = token {
                return Ok(ValueExpr::Ident(name.clone()));
            }
        }
        Ok(ValueExpr::Other(self.text(start.to(end)).to_string()))
    }

    fn parse_ident_list(&mut self) -> ParseResult<Vec<Ident>> {
        let mut names = vec![self.expect_ident()?];
        while self.eat(&Token::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    // === Types ===

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        let start = self.peek_span();
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                let base = if self.eat(&Token::Dot) {
                    let member = self.expect_ident()?;
                    TypeExpr::new(
                        TypeKind::Qualified { package: name, name: member.name },
                        start.to(member.span),
                    )
                } else {
                    TypeExpr::new(TypeKind::Ident(name), start)
                };
                if self.check(&Token::LBracket) && !matches!(self.peek_at(1), Token::RBracket) {
                    return self.parse_type_args(base);
                }
                Ok(base)
            }
            Token::Star => {
                self.advance();
                let inner = self.parse_type()?;
                let span = start.to(inner.span);
                Ok(TypeExpr::new(TypeKind::Pointer(Box::new(inner)), span))
            }
            Token::LBracket => {
                if matches!(self.peek_at(1), Token::RBracket) {
                    self.advance();
                    self.advance();
                    let elem = self.parse_type()?;
                    let span = start.to(elem.span);
                    Ok(TypeExpr::new(TypeKind::Slice(Box::new(elem)), span))
                } else {
                    let group = self.skip_group(Token::LBracket, Token::RBracket)?;
                    let len = self.source[group.start + 1..group.end - 1].trim().to_string();
                    let elem = self.parse_type()?;
                    let span = start.to(elem.span);
                    Ok(TypeExpr::new(TypeKind::Array(len, Box::new(elem)), span))
                }
            }
            Token::Map => {
                self.advance();
                self.expect(Token::LBracket)?;
                let key = self.parse_type()?;
                self.expect(Token::RBracket)?;
                let value = self.parse_type()?;
                let span = start.to(value.span);
                Ok(TypeExpr::new(TypeKind::Map(Box::new(key), Box::new(value)), span))
            }
            Token::Chan => {
                self.advance();
                self.eat(&Token::Arrow);
                let elem = self.parse_type()?;
                let span = start.to(elem.span);
                Ok(TypeExpr::new(TypeKind::Chan(Box::new(elem)), span))
            }
            Token::Arrow => {
                self.advance();
                self.expect(Token::Chan)?;
                let elem = self.parse_type()?;
                let span = start.to(elem.span);
                Ok(TypeExpr::new(TypeKind::Chan(Box::new(elem)), span))
            }
            Token::Struct => self.parse_struct_type(),
            Token::Interface => self.parse_interface_type(),
            Token::Func => {
                self.advance();
                let signature = self.parse_signature()?;
                Ok(TypeExpr::new(
                    TypeKind::Func(self.text(signature).to_string()),
                    start.to(signature),
                ))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_type()?;
                let end = self.expect(Token::RParen)?.span;
                Ok(TypeExpr::new(TypeKind::Paren(Box::new(inner)), start.to(end)))
            }
            Token::Ellipsis => {
                self.advance();
                let elem = self.parse_type()?;
                let span = start.to(elem.span);
                Ok(TypeExpr::new(TypeKind::Ellipsis(Box::new(elem)), span))
            }
            _ => Err(self.error(format!("expected type, found '{}'", self.peek()))),
        }
    }

    fn parse_type_args(&mut self, base: TypeExpr) -> ParseResult<TypeExpr> {
        self.expect(Token::LBracket)?;
        let mut args = Vec::new();
        while !self.check(&Token::RBracket) && !self.is_at_end() {
            args.push(self.parse_type()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let end = self.expect(Token::RBracket)?.span;
        let span = base.span.to(end);
        Ok(TypeExpr::new(TypeKind::Generic(Box::new(base), args), span))
    }

    fn parse_struct_type(&mut self) -> ParseResult<TypeExpr> {
        let start = self.expect(Token::Struct)?.span;
        self.expect(Token::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.eat(&Token::Semi) {
                continue;
            }
            fields.push(self.parse_field()?);
        }
        let end = self.expect(Token::RBrace)?.span;
        Ok(TypeExpr::new(TypeKind::Struct(StructType { fields }), start.to(end)))
    }

    fn parse_field(&mut self) -> ParseResult<Field> {
        let doc = self.doc_comment();
        let start = self.peek_span();
        let names = if self.is_embedded_field() {
            Vec::new()
        } else {
            self.parse_ident_list()?
        };
        let ty = self.parse_type()?;
        let tag = match self.peek().clone() {
            Token::String(raw) => {
                let span = self.peek_span();
                self.advance();
                Some(BasicLit { kind: LitKind::String, raw, span })
            }
            _ => None,
        };
        let end = self.prev_span();
        let comment = self.trailing_comment();
        if !self.eat(&Token::Semi) && !self.check(&Token::RBrace) {
            return Err(self.error(format!("expected ';' or '}}' after field, found '{}'", self.peek())));
        }
        Ok(Field { names, ty, tag, doc, comment, span: start.to(end) })
    }

    fn is_embedded_field(&self) -> bool {
        match self.peek() {
            Token::Star | Token::LParen => true,
            Token::Ident(_) => match self.peek_at(1) {
                Token::Semi | Token::RBrace | Token::String(_) | Token::Dot => true,
                Token::LBracket => self.bracket_ends_field(self.pos + 1),
                _ => false,
            },
            _ => false,
        }
    }

    /// `List[T]` (embedded) ends the field right after `]`; `Items [4]int` does not
    fn bracket_ends_field(&self, open: usize) -> bool {
        let mut depth = 0usize;
        for (i, tok) in self.tokens[open..].iter().enumerate() {
            match &tok.token {
                Token::LBracket => depth += 1,
                Token::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        if i == 1 {
                            return false;
                        }
                        return matches!(
                            self.tokens.get(open + i + 1).map(|t| &t.token),
                            Some(Token::Semi | Token::RBrace | Token::String(_))
                        );
                    }
                }
                Token::Eof => return false,
                _ => {}
            }
        }
        false
    }

    /// Interface elements are kept as source text, one per method or
    /// embedded constraint
    fn parse_interface_type(&mut self) -> ParseResult<TypeExpr> {
        let start = self.expect(Token::Interface)?.span;
        self.expect(Token::LBrace)?;
        let mut elements = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.eat(&Token::Semi) {
                continue;
            }
            let element_start = self.peek_span();
            let mut end = element_start;
            let mut depth = 0usize;
            while !self.is_at_end() {
                match self.peek() {
                    Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                    Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                    Token::RBrace if depth > 0 => depth -= 1,
                    Token::RBrace | Token::Semi if depth == 0 => break,
                    _ => {}
                }
                end = self.advance().span;
            }
            elements.push(self.text(element_start.to(end)).to_string());
        }
        let end = self.expect(Token::RBrace)?.span;
        Ok(TypeExpr::new(TypeKind::Interface(elements), start.to(end)))
    }
}

fn basic_lit(token: &Token, span: Span) -> Option<BasicLit> {
    let (kind, raw) = match token {
        Token::Int(raw) => (LitKind::Int, raw),
        Token::Float(raw) => (LitKind::Float, raw),
        Token::Char(raw) => (LitKind::Char, raw),
        Token::String(raw) => (LitKind::String, raw),
        _ => return None,
    };
    Some(BasicLit { kind, raw: raw.clone(), span })
}
