// Declaration parser for the supported schema-language subset.
// Parses: file ids, using, const, struct (fields, unnamed unions, nested
// declarations), enum, annotation declarations and applications.
// Does NOT parse: interfaces, generics, groups, named unions, struct values.

use std::rc::Rc;

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};

/// Deepest allowed nesting of list values, type parameters and nested
/// declarations.
pub const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    // docs[i] holds the comment block that directly follows tokens[i]
    docs: Vec<Option<String>>,
    pos: usize,
    source_len: usize,
    errors: Vec<ParseError>,
    imports: Vec<String>,
    depth: usize,
}

/// Parse a whole file. Syntax errors do not stop the parse: each one is
/// recorded and the parser skips to the end of the offending declaration.
pub fn parse_file(source: &str) -> (File, Vec<ParseError>) {
    let (raw, lex_errors) = tokenize(source);

    let mut tokens = Vec::with_capacity(raw.len());
    let mut docs: Vec<Option<String>> = Vec::with_capacity(raw.len());
    for token in raw {
        if let TokenKind::Comment(text) = &token.kind {
            // Comments ahead of the first token document nothing.
            if let Some(slot) = docs.last_mut() {
                let line = text.strip_prefix(' ').unwrap_or(text);
                let doc = slot.get_or_insert_with(String::new);
                doc.push_str(line);
                doc.push('\n');
            }
        } else {
            tokens.push(token);
            docs.push(None);
        }
    }

    let mut parser = Parser {
        tokens,
        docs,
        pos: 0,
        source_len: source.len(),
        errors: lex_errors,
        imports: Vec::new(),
        depth: 0,
    };
    let mut file = parser.parse_top_level();
    file.imports = std::mem::take(&mut parser.imports);
    (file, parser.errors)
}

impl Parser {
    fn parse_top_level(&mut self) -> File {
        let mut file = File::default();

        while self.peek().is_some() {
            let before = self.pos;
            let result = if self.at_punct('@') {
                self.parse_file_id(&mut file)
            } else if self.at_punct('$') {
                self.parse_file_annotation(&mut file)
            } else {
                self.parse_decl().map(|decl| file.decls.push(Rc::new(decl)))
            };
            if let Err(error) = result {
                self.errors.push(error);
                self.recover();
                if self.pos == before {
                    self.pos += 1;
                }
            }
        }

        file
    }

    fn parse_file_id(&mut self, file: &mut File) -> Result<(), ParseError> {
        let id = self.parse_id()?;
        self.expect_punct(';')?;
        if file.id.is_some() {
            return Err(ParseError::new(id.span, "File already has an ID."));
        }
        file.id = Some(id);
        Ok(())
    }

    fn parse_file_annotation(&mut self, file: &mut File) -> Result<(), ParseError> {
        let app = self.parse_annotation_app()?;
        self.expect_punct(';')?;
        file.annotations.push(app);
        Ok(())
    }

    fn parse_decl(&mut self) -> Result<Decl, ParseError> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return self.error("declaration"),
        };
        match &token.kind {
            TokenKind::Ident(keyword) => match keyword.as_str() {
                "using" => self.parse_using(),
                "const" => self.parse_const(),
                "struct" => self.parse_struct(),
                "enum" => self.parse_enum(),
                "annotation" => self.parse_annotation_decl(),
                "interface" => Err(ParseError::new(
                    token.span,
                    "Interfaces are not supported by this compiler.",
                )),
                _ => self.error("declaration"),
            },
            _ => self.error("declaration"),
        }
    }

    // using Name = Target;
    fn parse_using(&mut self) -> Result<Decl, ParseError> {
        let start = self.expect_keyword("using")?;
        if self.at_keyword("import") {
            return Err(ParseError::new(
                start,
                "Anonymous using declarations are not supported by this compiler.",
            ));
        }
        let name = self.expect_ident()?;
        self.expect_punct('=')?;
        let target = self.parse_type_expr()?;
        let end = self.expect_punct(';')?;
        Ok(Decl {
            name,
            id: None,
            annotations: Vec::new(),
            doc_comment: self.doc_after_previous(),
            span: start.to(end),
            kind: DeclKind::Using { target },
        })
    }

    // const name [@id] :Type = value [annotations];
    fn parse_const(&mut self) -> Result<Decl, ParseError> {
        let start = self.expect_keyword("const")?;
        let name = self.expect_ident()?;
        let id = self.parse_optional_id()?;
        self.expect_punct(':')?;
        let ty = self.parse_type_expr()?;
        self.expect_punct('=')?;
        let value = self.parse_value()?;
        let annotations = self.parse_annotation_apps()?;
        let end = self.expect_punct(';')?;
        Ok(Decl {
            name,
            id,
            annotations,
            doc_comment: self.doc_after_previous(),
            span: start.to(end),
            kind: DeclKind::Const { ty, value },
        })
    }

    fn parse_struct(&mut self) -> Result<Decl, ParseError> {
        let start = self.expect_keyword("struct")?;
        let name = self.expect_ident()?;
        if self.at_punct('(') {
            return Err(ParseError::new(
                name.span,
                "Generic parameters are not supported by this compiler.",
            ));
        }
        let id = self.parse_optional_id()?;
        let annotations = self.parse_annotation_apps()?;
        self.expect_punct('{')?;
        let doc_comment = self.doc_after_previous();

        let mut members = Vec::new();
        while !self.at_punct('}') {
            if self.peek().is_none() {
                return self.error("'}'");
            }
            let before = self.pos;
            match self.parse_struct_member() {
                Ok(member) => members.push(member),
                Err(error) => {
                    self.errors.push(error);
                    self.recover();
                    if self.pos == before {
                        self.pos += 1;
                    }
                }
            }
        }
        let end = self.expect_punct('}')?;

        Ok(Decl {
            name,
            id,
            annotations,
            doc_comment,
            span: start.to(end),
            kind: DeclKind::Struct { members },
        })
    }

    fn parse_struct_member(&mut self) -> Result<StructMember, ParseError> {
        if self.at_keyword("union") && self.peek_at(1).map_or(false, |t| t.is_punct('{')) {
            return self.parse_union().map(StructMember::Union);
        }
        let is_decl = ["struct", "enum", "const", "using", "annotation", "interface"]
            .iter()
            .any(|kw| self.at_keyword(kw))
            && matches!(self.peek_at(1).map(|t| &t.kind), Some(TokenKind::Ident(_)));
        if is_decl {
            let span = self.current_span();
            return self
                .nested(span, Self::parse_decl)
                .map(|decl| StructMember::Nested(Rc::new(decl)));
        }
        self.parse_field().map(StructMember::Field)
    }

    fn parse_union(&mut self) -> Result<Union, ParseError> {
        let start = self.expect_keyword("union")?;
        self.expect_punct('{')?;
        let mut fields = Vec::new();
        while !self.at_punct('}') {
            if self.peek().is_none() {
                return self.error("'}'");
            }
            let before = self.pos;
            let result = if self.at_keyword("union") {
                Err(ParseError::new(
                    self.current_span(),
                    "Unions cannot contain unnamed unions.",
                ))
            } else {
                self.parse_field()
            };
            match result {
                Ok(field) => fields.push(field),
                Err(error) => {
                    self.errors.push(error);
                    self.recover();
                    if self.pos == before {
                        self.pos += 1;
                    }
                }
            }
        }
        let end = self.expect_punct('}')?;
        Ok(Union {
            fields,
            span: start.to(end),
        })
    }

    // name @N :Type [= default] [annotations];
    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let name = self.expect_ident()?;
        if self.at_punct(':') {
            let kind_token = self.peek_at(1).cloned();
            if let Some(token) = kind_token {
                if token.is_keyword("group") || token.is_keyword("union") {
                    return Err(ParseError::new(
                        name.span.to(token.span),
                        "Groups and named unions are not supported by this compiler.",
                    ));
                }
            }
            return Err(ParseError::new(name.span, "Missing ordinal number."));
        }
        let ordinal = self.parse_ordinal()?;
        self.expect_punct(':')?;
        let ty = self.parse_type_expr()?;
        let default = if self.at_punct('=') {
            self.pos += 1;
            Some(self.parse_value()?)
        } else {
            None
        };
        let annotations = self.parse_annotation_apps()?;
        let end = self.expect_punct(';')?;
        Ok(Field {
            span: name.span.to(end),
            name,
            ordinal,
            ty,
            default,
            annotations,
            doc_comment: self.doc_after_previous(),
        })
    }

    fn parse_enum(&mut self) -> Result<Decl, ParseError> {
        let start = self.expect_keyword("enum")?;
        let name = self.expect_ident()?;
        let id = self.parse_optional_id()?;
        let annotations = self.parse_annotation_apps()?;
        self.expect_punct('{')?;
        let doc_comment = self.doc_after_previous();

        let mut enumerants = Vec::new();
        while !self.at_punct('}') {
            if self.peek().is_none() {
                return self.error("'}'");
            }
            let before = self.pos;
            match self.parse_enumerant() {
                Ok(enumerant) => enumerants.push(enumerant),
                Err(error) => {
                    self.errors.push(error);
                    self.recover();
                    if self.pos == before {
                        self.pos += 1;
                    }
                }
            }
        }
        let end = self.expect_punct('}')?;

        Ok(Decl {
            name,
            id,
            annotations,
            doc_comment,
            span: start.to(end),
            kind: DeclKind::Enum { enumerants },
        })
    }

    fn parse_enumerant(&mut self) -> Result<Enumerant, ParseError> {
        let name = self.expect_ident()?;
        let ordinal = self.parse_ordinal()?;
        let annotations = self.parse_annotation_apps()?;
        self.expect_punct(';')?;
        Ok(Enumerant {
            name,
            ordinal,
            annotations,
            doc_comment: self.doc_after_previous(),
        })
    }

    // annotation name [@id] (targets) :Type [annotations];
    fn parse_annotation_decl(&mut self) -> Result<Decl, ParseError> {
        let start = self.expect_keyword("annotation")?;
        let name = self.expect_ident()?;
        let id = self.parse_optional_id()?;
        self.expect_punct('(')?;
        let mut targets = Vec::new();
        loop {
            if self.at_punct('*') {
                let span = self.expect_punct('*')?;
                targets.push(Name {
                    text: "*".to_string(),
                    span,
                });
            } else {
                targets.push(self.expect_ident()?);
            }
            if self.at_punct(',') {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.expect_punct(')')?;
        self.expect_punct(':')?;
        let ty = self.parse_type_expr()?;
        let annotations = self.parse_annotation_apps()?;
        let end = self.expect_punct(';')?;
        Ok(Decl {
            name,
            id,
            annotations,
            doc_comment: self.doc_after_previous(),
            span: start.to(end),
            kind: DeclKind::Annotation { targets, ty },
        })
    }

    fn parse_annotation_apps(&mut self) -> Result<Vec<AnnotationApp>, ParseError> {
        let mut apps = Vec::new();
        while self.at_punct('$') {
            apps.push(self.parse_annotation_app()?);
        }
        Ok(apps)
    }

    fn parse_annotation_app(&mut self) -> Result<AnnotationApp, ParseError> {
        let start = self.expect_punct('$')?;
        let name = self.parse_name_expr()?;
        let mut end = name.span();
        let value = if self.at_punct('(') {
            self.pos += 1;
            let value = self.parse_value()?;
            end = self.expect_punct(')')?;
            Some(value)
        } else {
            None
        };
        Ok(AnnotationApp {
            name,
            value,
            span: start.to(end),
        })
    }

    // Name, .Name, import "x", followed by any number of .member
    fn parse_name_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.at_punct('.') {
            self.pos += 1;
            Expr::Absolute(self.expect_ident()?)
        } else if self.at_keyword("import") {
            let start = self.expect_keyword("import")?;
            match self.peek().map(|t| t.kind.clone()) {
                Some(TokenKind::String(bytes)) => {
                    let end = self.current_span();
                    let Ok(path) = String::from_utf8(bytes) else {
                        return Err(ParseError::new(end, "Import path is not valid UTF-8."));
                    };
                    self.pos += 1;
                    self.imports.push(path.clone());
                    Expr::Import {
                        path,
                        span: start.to(end),
                    }
                }
                _ => return self.error("import path string"),
            }
        } else {
            Expr::Name(self.expect_ident()?)
        };

        while self.at_punct('.') {
            self.pos += 1;
            let name = self.expect_ident()?;
            expr = Expr::Member {
                base: Box::new(expr),
                name,
            };
        }
        Ok(expr)
    }

    // A name expression optionally applied to parameters, e.g. List(Text)
    fn parse_type_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_name_expr()?;
        if !self.at_punct('(') {
            return Ok(base);
        }
        let open = self.current_span();
        self.pos += 1;
        let mut args = Vec::new();
        loop {
            args.push(self.nested(open, Self::parse_type_expr)?);
            if self.at_punct(',') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let end = self.expect_punct(')')?;
        Ok(Expr::Application {
            span: base.span().to(end),
            base: Box::new(base),
            args,
        })
    }

    fn parse_value(&mut self) -> Result<ValueExpr, ParseError> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return self.error("value"),
        };
        match token.kind {
            TokenKind::Integer(value) => {
                self.pos += 1;
                Ok(ValueExpr::Integer {
                    value: i128::from(value),
                    span: token.span,
                })
            }
            TokenKind::Float(value) => {
                self.pos += 1;
                Ok(ValueExpr::Float {
                    value,
                    span: token.span,
                })
            }
            TokenKind::String(value) => {
                self.pos += 1;
                Ok(ValueExpr::Text {
                    value,
                    span: token.span,
                })
            }
            TokenKind::Punct('-') => {
                self.pos += 1;
                let operand = match self.peek() {
                    Some(operand) => operand.clone(),
                    None => return self.error("number"),
                };
                let span = token.span.to(operand.span);
                let negated = match operand.kind {
                    TokenKind::Integer(value) => ValueExpr::Integer {
                        value: -i128::from(value),
                        span,
                    },
                    TokenKind::Float(value) => ValueExpr::Float { value: -value, span },
                    TokenKind::Ident(ref word) if word == "inf" => ValueExpr::Float {
                        value: f64::NEG_INFINITY,
                        span,
                    },
                    _ => return self.error("number"),
                };
                self.pos += 1;
                Ok(negated)
            }
            TokenKind::Punct('[') => {
                self.pos += 1;
                let mut items = Vec::new();
                while !self.at_punct(']') {
                    items.push(self.nested(token.span, Self::parse_value)?);
                    if self.at_punct(',') {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let end = self.expect_punct(']')?;
                Ok(ValueExpr::List {
                    items,
                    span: token.span.to(end),
                })
            }
            TokenKind::Punct('(') => Err(ParseError::new(
                token.span,
                "Struct values are not supported by this compiler.",
            )),
            TokenKind::Ident(_) | TokenKind::Punct('.') => {
                self.parse_name_expr().map(ValueExpr::Name)
            }
            _ => self.error("value"),
        }
    }

    fn parse_optional_id(&mut self) -> Result<Option<IdLiteral>, ParseError> {
        if self.at_punct('@') {
            self.parse_id().map(Some)
        } else {
            Ok(None)
        }
    }

    fn parse_id(&mut self) -> Result<IdLiteral, ParseError> {
        let start = self.expect_punct('@')?;
        match self.peek().map(|t| (t.kind.clone(), t.span)) {
            Some((TokenKind::Integer(value), span)) => {
                self.pos += 1;
                Ok(IdLiteral {
                    value,
                    span: start.to(span),
                })
            }
            _ => self.error("ID"),
        }
    }

    fn parse_ordinal(&mut self) -> Result<Ordinal, ParseError> {
        let start = self.expect_punct('@')?;
        match self.peek().map(|t| (t.kind.clone(), t.span)) {
            Some((TokenKind::Integer(value), span)) => {
                self.pos += 1;
                let span = start.to(span);
                match u16::try_from(value) {
                    Ok(value) if value < u16::MAX => Ok(Ordinal { value, span }),
                    _ => Err(ParseError::new(span, "Ordinal value is too large.")),
                }
            }
            _ => self.error("ordinal number"),
        }
    }

    // Skip to the end of the current declaration: past the next ';' or the
    // block that closes at this depth. A '}' closing an enclosing block is
    // left for the caller.
    fn recover(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if token.is_punct('{') {
                depth += 1;
            } else if token.is_punct('}') {
                if depth == 0 {
                    return;
                }
                depth -= 1;
                if depth == 0 {
                    self.pos += 1;
                    return;
                }
            } else if token.is_punct(';') && depth == 0 {
                self.pos += 1;
                return;
            }
            self.pos += 1;
        }
    }

    // Run `parse` one nesting level deeper, failing at `span` once the
    // limit is reached.
    fn nested<T>(
        &mut self,
        span: Span,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(span, "Nesting is too deep."));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek().map_or(false, |t| t.is_punct(c))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().map_or(false, |t| t.is_keyword(keyword))
    }

    fn current_span(&self) -> Span {
        match self.peek() {
            Some(token) => token.span,
            None => Span::new(self.source_len, self.source_len),
        }
    }

    fn doc_after_previous(&self) -> Option<String> {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.docs.get(i))
            .cloned()
            .flatten()
    }

    fn expect_punct(&mut self, expected: char) -> Result<Span, ParseError> {
        if self.at_punct(expected) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            self.error(&format!("'{}'", expected))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Span, ParseError> {
        if self.at_keyword(keyword) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            self.error(&format!("'{}'", keyword))
        }
    }

    fn expect_ident(&mut self) -> Result<Name, ParseError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(text),
                span,
            }) => {
                let name = Name {
                    text: text.clone(),
                    span: *span,
                };
                self.pos += 1;
                Ok(name)
            }
            _ => self.error("identifier"),
        }
    }

    fn error<T>(&self, expected: &str) -> Result<T, ParseError> {
        let found = match self.peek() {
            Some(token) => format!("'{}'", token.describe()),
            None => "end of input".to_string(),
        };
        Err(ParseError::new(
            self.current_span(),
            format!("Parse error: expected {}, got {}.", expected, found),
        ))
    }
}
