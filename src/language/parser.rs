use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
    types::*,
};
use std::path::PathBuf;

pub fn parse_file(path: PathBuf, source: &str) -> Result<File, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(path, source, tokens).parse()
}

/// Reads only the package clause, tolerating anything after it.
pub fn parse_package_name(source: &str) -> Option<String> {
    let tokens = lex(source).ok()?;
    let mut kinds = tokens
        .iter()
        .map(|token| &token.kind)
        .skip_while(|kind| **kind == TokenKind::Semi);
    match (kinds.next(), kinds.next()) {
        (Some(TokenKind::Package), Some(TokenKind::Identifier(name))) => Some(name.clone()),
        _ => None,
    }
}

struct Parser<'a> {
    path: PathBuf,
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

enum ParamEntry {
    Bare(Ident),
    Named(Ident, TypeAnnotation),
    Type(TypeAnnotation),
}

impl<'a> Parser<'a> {
    fn new(path: PathBuf, source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            path,
            source,
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<File, SyntaxErrors> {
        while self.matches(TokenKind::Semi) {}
        let package = match self.parse_package_clause() {
            Ok(package) => package,
            Err(err) => return Err(SyntaxErrors::new(vec![err])),
        };

        let mut imports = Vec::new();
        let mut decls = Vec::new();
        while !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                continue;
            }

            if self.check(TokenKind::Import) {
                if !decls.is_empty() {
                    let err = self
                        .error_here("Imports must appear before other declarations")
                        .with_help("move this import to the top of the file");
                    self.report(err);
                }
                match self.parse_import_decl() {
                    Ok(specs) => imports.extend(specs),
                    Err(err) => {
                        self.report(err);
                        self.synchronize_decl();
                    }
                }
                continue;
            }

            match self.parse_decl() {
                Ok(mut parsed) => decls.append(&mut parsed),
                Err(err) => {
                    self.report(err);
                    self.synchronize_decl();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(File {
                path: self.path,
                package,
                imports,
                decls,
            })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_package_clause(&mut self) -> Result<Ident, SyntaxError> {
        if !self.matches(TokenKind::Package) {
            return Err(self
                .error_here("Expected package clause")
                .with_help("every source file starts with `package <name>`"));
        }
        let name = self.expect_identifier("Expected package name")?;
        if name.is_blank() {
            return Err(SyntaxError::new("Invalid package name _", name.span));
        }
        self.expect_semi("package clause")?;
        Ok(name)
    }

    fn parse_import_decl(&mut self) -> Result<Vec<ImportSpec>, SyntaxError> {
        self.expect(TokenKind::Import)?;
        let mut specs = Vec::new();
        if self.matches(TokenKind::LParen) {
            loop {
                if self.matches(TokenKind::Semi) {
                    continue;
                }
                if self.check(TokenKind::RParen) || self.is_eof() {
                    break;
                }
                specs.push(self.parse_import_spec()?);
                self.expect_group_separator()?;
            }
            self.expect(TokenKind::RParen)?;
        } else {
            specs.push(self.parse_import_spec()?);
        }
        self.expect_semi("import declaration")?;
        Ok(specs)
    }

    fn parse_import_spec(&mut self) -> Result<ImportSpec, SyntaxError> {
        let start = self.current_span_start();
        let name = match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            TokenKind::Dot => {
                let span = self.advance().span;
                Some(Ident::new(".", span))
            }
            _ => None,
        };
        let path = match self.peek_kind().clone() {
            TokenKind::String(path) | TokenKind::RawString(path) => {
                self.advance();
                path
            }
            _ => return Err(self.error_here("Expected import path string")),
        };
        let span = Span::new(start, self.last_span_end(start));
        if path.is_empty() || path.chars().any(|ch| ch.is_whitespace() || ch == '\\') {
            return Err(SyntaxError::new(format!("Invalid import path {path:?}"), span));
        }
        Ok(ImportSpec { name, path, span })
    }

    fn parse_decl(&mut self) -> Result<Vec<Decl>, SyntaxError> {
        match self.peek_kind() {
            TokenKind::Type => {
                self.advance();
                let specs = self.parse_group(Self::parse_type_spec)?;
                Ok(specs.into_iter().map(Decl::Type).collect())
            }
            TokenKind::Var => {
                self.advance();
                let specs = self.parse_group(Self::parse_value_spec)?;
                Ok(specs.into_iter().map(Decl::Var).collect())
            }
            TokenKind::Const => {
                self.advance();
                let specs = self.parse_group(Self::parse_value_spec)?;
                Ok(specs.into_iter().map(Decl::Const).collect())
            }
            TokenKind::Func => self.parse_func_decl().map(|func| vec![Decl::Func(func)]),
            _ => {
                let found = self.peek_kind().describe();
                Err(self.error_here(&format!(
                    "Expected declaration, found {found}"
                )))
            }
        }
    }

    /// Parses `spec` or `( spec; spec; ... )` followed by a terminator.
    fn parse_group<T>(
        &mut self,
        mut spec: impl FnMut(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<Vec<T>, SyntaxError> {
        let mut specs = Vec::new();
        if self.matches(TokenKind::LParen) {
            loop {
                if self.matches(TokenKind::Semi) {
                    continue;
                }
                if self.check(TokenKind::RParen) || self.is_eof() {
                    break;
                }
                specs.push(spec(self)?);
                self.expect_group_separator()?;
            }
            self.expect(TokenKind::RParen)?;
        } else {
            specs.push(spec(self)?);
        }
        self.expect_semi("declaration")?;
        Ok(specs)
    }

    fn parse_type_spec(&mut self) -> Result<TypeSpec, SyntaxError> {
        let start = self.current_span_start();
        let name = self.expect_identifier("Expected type name")?;
        let type_params = if self.check(TokenKind::LBracket) && self.bracket_opens_type_params()
        {
            self.parse_type_params()?
        } else {
            Vec::new()
        };
        let alias = self.matches(TokenKind::Eq);
        let ty = self.parse_type_annotation()?;
        Ok(TypeSpec {
            name,
            type_params,
            alias,
            ty,
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn parse_value_spec(&mut self) -> Result<ValueSpec, SyntaxError> {
        let start = self.current_span_start();
        let mut names = vec![self.expect_identifier("Expected identifier")?];
        while self.matches(TokenKind::Comma) {
            names.push(self.expect_identifier("Expected identifier after ','")?);
        }
        let ty = if starts_type(self.peek_kind()) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let has_value = if self.matches(TokenKind::Eq) {
            self.skip_expression_list()?;
            true
        } else {
            false
        };
        Ok(ValueSpec {
            names,
            ty,
            has_value,
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl, SyntaxError> {
        let start = self.expect(TokenKind::Func)?.span.start;
        let recv = if self.check(TokenKind::LParen) {
            Some(self.parse_receiver()?)
        } else {
            None
        };
        let name = self.expect_identifier("Expected function name")?;
        let type_params = if self.check(TokenKind::LBracket) {
            let params = self.parse_type_params()?;
            if recv.is_some() {
                return Err(SyntaxError::new(
                    "Methods cannot have type parameters",
                    name.span,
                ));
            }
            params
        } else {
            Vec::new()
        };
        let signature = self.parse_signature()?;
        let has_body = if self.check(TokenKind::LBrace) {
            self.skip_block()?;
            true
        } else {
            false
        };
        let span = Span::new(start, self.last_span_end(start));
        self.expect_semi("function declaration")?;
        Ok(FuncDecl {
            recv,
            name,
            type_params,
            signature,
            has_body,
            span,
        })
    }

    fn parse_receiver(&mut self) -> Result<Receiver, SyntaxError> {
        let start = self.expect(TokenKind::LParen)?.span.start;
        let name = match (self.peek_kind(), self.peek_kind_n(1)) {
            (TokenKind::Identifier(_), TokenKind::Identifier(_) | TokenKind::Star) => {
                Some(self.expect_identifier("Expected receiver name")?)
            }
            _ => None,
        };
        let pointer = self.matches(TokenKind::Star);
        let base = self.expect_identifier("Expected receiver base type")?;
        if self.check(TokenKind::Dot) {
            return Err(self
                .error_here("Receiver base type must be declared in this package")
                .with_help("methods can only be defined on local types"));
        }
        let mut type_args = Vec::new();
        if self.matches(TokenKind::LBracket) {
            loop {
                type_args.push(self.expect_identifier("Expected receiver type parameter")?);
                if self.matches(TokenKind::Comma) {
                    if self.check(TokenKind::RBracket) {
                        break;
                    }
                    continue;
                }
                break;
            }
            self.expect(TokenKind::RBracket)?;
        }
        self.matches(TokenKind::Comma);
        self.expect(TokenKind::RParen)?;
        Ok(Receiver {
            name,
            pointer,
            base,
            type_args,
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn parse_type_params(&mut self) -> Result<Vec<TypeParamDecl>, SyntaxError> {
        self.expect(TokenKind::LBracket)?;
        let mut params = Vec::new();
        loop {
            let mut names = vec![self.expect_identifier("Expected type parameter name")?];
            while self.matches(TokenKind::Comma) {
                names.push(self.expect_identifier("Expected type parameter name")?);
            }
            let constraint = self.parse_constraint()?;
            params.push(TypeParamDecl { names, constraint });
            if self.matches(TokenKind::Comma) {
                if self.check(TokenKind::RBracket) {
                    break;
                }
                continue;
            }
            break;
        }
        self.expect(TokenKind::RBracket)?;
        Ok(params)
    }

    /// A term list such as `~int | ~string`; a single plain term is returned as is.
    fn parse_constraint(&mut self) -> Result<TypeAnnotation, SyntaxError> {
        let start = self.current_span_start();
        let mut terms = Vec::new();
        loop {
            let tilde = self.matches(TokenKind::Tilde);
            let ty = self.parse_type_annotation()?;
            terms.push(UnionTerm { tilde, ty });
            if !self.matches(TokenKind::Pipe) {
                break;
            }
        }
        if terms.len() == 1 && !terms[0].tilde {
            if let Some(term) = terms.pop() {
                return Ok(term.ty);
            }
        }
        Ok(TypeAnnotation {
            ty: TypeExpr::Union(terms),
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, SyntaxError> {
        let start = self.current_span_start();
        let ty = self.parse_type_expr()?;
        let end = self.last_span_end(start);
        Ok(TypeAnnotation {
            ty,
            span: Span::new(start, end),
        })
    }

    fn parse_type_expr(&mut self) -> Result<TypeExpr, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(_) => self.parse_type_name(),
            TokenKind::Star => {
                self.advance();
                Ok(TypeExpr::Pointer(Box::new(self.parse_type_annotation()?)))
            }
            TokenKind::LBracket => {
                self.advance();
                if self.matches(TokenKind::RBracket) {
                    return Ok(TypeExpr::Slice(Box::new(self.parse_type_annotation()?)));
                }
                let len = if self.check(TokenKind::Ellipsis)
                    && *self.peek_kind_n(1) == TokenKind::RBracket
                {
                    self.advance();
                    "...".to_string()
                } else {
                    self.array_length()?
                };
                self.expect(TokenKind::RBracket)?;
                let elem = self.parse_type_annotation()?;
                Ok(TypeExpr::Array {
                    len,
                    elem: Box::new(elem),
                })
            }
            TokenKind::Map => {
                self.advance();
                self.expect(TokenKind::LBracket)?;
                let key = self.parse_type_annotation()?;
                self.expect(TokenKind::RBracket)?;
                let value = self.parse_type_annotation()?;
                Ok(TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            TokenKind::Chan => {
                self.advance();
                let dir = if self.matches(TokenKind::Arrow) {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.parse_type_annotation()?;
                Ok(TypeExpr::Chan {
                    dir,
                    elem: Box::new(elem),
                })
            }
            TokenKind::Arrow => {
                self.advance();
                self.expect(TokenKind::Chan)?;
                let elem = self.parse_type_annotation()?;
                Ok(TypeExpr::Chan {
                    dir: ChanDir::Recv,
                    elem: Box::new(elem),
                })
            }
            TokenKind::Func => {
                self.advance();
                Ok(TypeExpr::Func(self.parse_signature()?))
            }
            TokenKind::Struct => {
                self.advance();
                self.parse_struct_body()
            }
            TokenKind::Interface => {
                self.advance();
                self.parse_interface_body()
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_type_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(self.error_here(&format!("Expected type, found {}", other.describe()))),
        }
    }

    fn parse_type_name(&mut self) -> Result<TypeExpr, SyntaxError> {
        let first = self.expect_identifier("Expected type name")?;
        let (qualifier, name) = if self.matches(TokenKind::Dot) {
            let name = self.expect_identifier("Expected type name after '.'")?;
            (Some(first), name)
        } else {
            (None, first)
        };
        let mut args = Vec::new();
        if self.matches(TokenKind::LBracket) {
            loop {
                args.push(self.parse_type_annotation()?);
                if self.matches(TokenKind::Comma) {
                    if self.check(TokenKind::RBracket) {
                        break;
                    }
                    continue;
                }
                break;
            }
            self.expect(TokenKind::RBracket)?;
        }
        Ok(TypeExpr::Named {
            qualifier,
            name,
            args,
        })
    }

    /// Source text of an array length expression, up to the closing bracket.
    fn array_length(&mut self) -> Result<String, SyntaxError> {
        let start = self.current_span_start();
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::RBracket if depth == 0 => break,
                TokenKind::LBracket | TokenKind::LParen | TokenKind::LBrace => depth += 1,
                TokenKind::RBracket | TokenKind::RParen | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Eof | TokenKind::Semi => {
                    return Err(self.error_here("Unterminated array length"));
                }
                _ => {}
            }
            self.advance();
        }
        let end = self.last_span_end(start);
        let text = self.source.get(start..end).unwrap_or_default().trim();
        if text.is_empty() {
            return Err(self.error_here("Expected array length"));
        }
        Ok(text.to_string())
    }

    fn parse_signature(&mut self) -> Result<FuncTypeExpr, SyntaxError> {
        let (params, variadic) = self.parse_params(true)?;
        let results = if self.check(TokenKind::LParen) {
            self.parse_params(false)?.0
        } else if starts_type(self.peek_kind()) {
            vec![ParamDecl {
                name: None,
                ty: self.parse_type_annotation()?,
            }]
        } else {
            Vec::new()
        };
        Ok(FuncTypeExpr {
            params,
            results,
            variadic,
        })
    }

    fn parse_params(&mut self, allow_variadic: bool) -> Result<(Vec<ParamDecl>, bool), SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let mut entries = Vec::new();
        let mut variadic_at = None;
        while !self.check(TokenKind::RParen) && !self.is_eof() {
            let entry = match (self.peek_kind().clone(), self.peek_kind_n(1).clone()) {
                (TokenKind::Ellipsis, _) => {
                    variadic_at = Some(entries.len());
                    self.advance();
                    ParamEntry::Type(self.parse_type_annotation()?)
                }
                (TokenKind::Identifier(_), TokenKind::Comma | TokenKind::RParen) => {
                    ParamEntry::Bare(self.expect_identifier("Expected parameter")?)
                }
                (TokenKind::Identifier(_), TokenKind::Dot) => {
                    ParamEntry::Type(self.parse_type_annotation()?)
                }
                (TokenKind::Identifier(_), TokenKind::Ellipsis) => {
                    let name = self.expect_identifier("Expected parameter name")?;
                    variadic_at = Some(entries.len());
                    self.advance();
                    ParamEntry::Named(name, self.parse_type_annotation()?)
                }
                (TokenKind::Identifier(_), TokenKind::LBracket)
                    if !self.bracket_followed_by_type(self.pos + 1) =>
                {
                    ParamEntry::Type(self.parse_type_annotation()?)
                }
                (TokenKind::Identifier(_), next) if starts_type(&next) => {
                    let name = self.expect_identifier("Expected parameter name")?;
                    ParamEntry::Named(name, self.parse_type_annotation()?)
                }
                _ => ParamEntry::Type(self.parse_type_annotation()?),
            };
            entries.push(entry);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let variadic = match variadic_at {
            Some(_) if !allow_variadic => {
                return Err(SyntaxError::new(
                    "Cannot use ... in result list",
                    self.previous_span().unwrap_or_default(),
                ));
            }
            Some(idx) if idx + 1 != entries.len() => {
                return Err(SyntaxError::new(
                    "Can only use ... with final parameter",
                    self.previous_span().unwrap_or_default(),
                ));
            }
            Some(_) => true,
            None => false,
        };
        Ok((self.group_params(entries)?, variadic))
    }

    /// Distributes grouped types (`a, b int`) or treats every entry as a type.
    fn group_params(&self, entries: Vec<ParamEntry>) -> Result<Vec<ParamDecl>, SyntaxError> {
        let named = entries
            .iter()
            .any(|entry| matches!(entry, ParamEntry::Named(..)));
        let mut params = Vec::new();
        if !named {
            for entry in entries {
                let ty = match entry {
                    ParamEntry::Bare(ident) => TypeAnnotation {
                        span: ident.span,
                        ty: TypeExpr::named(ident),
                    },
                    ParamEntry::Type(ty) | ParamEntry::Named(_, ty) => ty,
                };
                params.push(ParamDecl { name: None, ty });
            }
            return Ok(params);
        }

        let mut pending: Vec<Ident> = Vec::new();
        for entry in entries {
            match entry {
                ParamEntry::Bare(ident) => pending.push(ident),
                ParamEntry::Named(name, ty) => {
                    for ident in pending.drain(..) {
                        params.push(ParamDecl {
                            name: Some(ident),
                            ty: ty.clone(),
                        });
                    }
                    params.push(ParamDecl {
                        name: Some(name),
                        ty,
                    });
                }
                ParamEntry::Type(ty) => {
                    return Err(SyntaxError::new("Mixed named and unnamed parameters", ty.span));
                }
            }
        }
        if let Some(ident) = pending.first() {
            return Err(SyntaxError::new("Missing parameter type", ident.span));
        }
        Ok(params)
    }

    fn parse_struct_body(&mut self) -> Result<TypeExpr, SyntaxError> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        loop {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            if self.matches(TokenKind::RBrace) {
                break;
            }
            if self.is_eof() {
                return Err(self.error_here("Unterminated struct type"));
            }
            fields.push(self.parse_field_decl()?);
            if !self.check(TokenKind::RBrace) {
                self.expect_semi("field declaration")?;
            }
        }
        Ok(TypeExpr::Struct(fields))
    }

    fn parse_field_decl(&mut self) -> Result<FieldDecl, SyntaxError> {
        let start = self.current_span_start();
        let mut names = Vec::new();
        let ty = match (self.peek_kind().clone(), self.peek_kind_n(1).clone()) {
            (TokenKind::Star, _) => self.parse_embedded()?,
            (TokenKind::Identifier(_), TokenKind::Dot)
            | (
                TokenKind::Identifier(_),
                TokenKind::Semi | TokenKind::RBrace | TokenKind::String(_) | TokenKind::RawString(_),
            ) => self.parse_embedded()?,
            (TokenKind::Identifier(_), TokenKind::LBracket)
                if !self.bracket_followed_by_type(self.pos + 1) =>
            {
                self.parse_embedded()?
            }
            (TokenKind::Identifier(_), _) => {
                names.push(self.expect_identifier("Expected field name")?);
                while self.matches(TokenKind::Comma) {
                    names.push(self.expect_identifier("Expected field name after ','")?);
                }
                self.parse_type_annotation()?
            }
            (TokenKind::LParen, _) => {
                return Err(self.error_here("Cannot parenthesize embedded type"));
            }
            (other, _) => {
                return Err(self.error_here(&format!(
                    "Expected field name or embedded type, found {}",
                    other.describe()
                )));
            }
        };
        let tag = match self.peek_kind().clone() {
            TokenKind::String(tag) | TokenKind::RawString(tag) => {
                self.advance();
                Some(tag)
            }
            _ => None,
        };
        Ok(FieldDecl {
            names,
            ty,
            tag,
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn parse_embedded(&mut self) -> Result<TypeAnnotation, SyntaxError> {
        let ty = self.parse_type_annotation()?;
        let base = match &ty.ty {
            TypeExpr::Pointer(inner) => &inner.ty,
            other => other,
        };
        if !matches!(base, TypeExpr::Named { .. }) {
            return Err(SyntaxError::new(
                "Embedded field type must be a type name",
                ty.span,
            ));
        }
        Ok(ty)
    }

    fn parse_interface_body(&mut self) -> Result<TypeExpr, SyntaxError> {
        self.expect(TokenKind::LBrace)?;
        let mut elems = Vec::new();
        loop {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            if self.matches(TokenKind::RBrace) {
                break;
            }
            if self.is_eof() {
                return Err(self.error_here("Unterminated interface type"));
            }
            let elem = match (self.peek_kind(), self.peek_kind_n(1)) {
                (TokenKind::Identifier(_), TokenKind::LParen) => {
                    let name = self.expect_identifier("Expected method name")?;
                    let signature = self.parse_signature()?;
                    InterfaceElem::Method { name, signature }
                }
                _ => InterfaceElem::Embedded(self.parse_constraint()?),
            };
            elems.push(elem);
            if !self.check(TokenKind::RBrace) {
                self.expect_semi("interface element")?;
            }
        }
        Ok(TypeExpr::Interface(elems))
    }

    fn skip_block(&mut self) -> Result<(), SyntaxError> {
        let open = self.expect(TokenKind::LBrace)?.span;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek_kind() {
                TokenKind::Eof => {
                    return Err(SyntaxError::new("Unterminated block", open)
                        .with_help("add the missing `}`"));
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }

    /// Skips an initializer list; stops before the token ending the spec.
    fn skip_expression_list(&mut self) -> Result<(), SyntaxError> {
        let start = self.current_span_start();
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Semi | TokenKind::RParen if depth == 0 => break,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
        }
        if self.current_span_start() == start {
            return Err(self.error_here("Expected expression"));
        }
        Ok(())
    }

    /// At `[` after a type name: is this `[T any]` rather than an array length?
    fn bracket_opens_type_params(&self) -> bool {
        matches!(self.peek_kind_n(1), TokenKind::Identifier(_))
            && matches!(
                self.peek_kind_n(2),
                TokenKind::Identifier(_)
                    | TokenKind::Comma
                    | TokenKind::Interface
                    | TokenKind::Tilde
                    | TokenKind::LBracket
                    | TokenKind::Map
                    | TokenKind::Chan
                    | TokenKind::Func
                    | TokenKind::Struct
            )
    }

    /// Whether the bracket pair opening at `open` is followed by a type,
    /// which makes the preceding identifier a name rather than a generic type.
    fn bracket_followed_by_type(&self, open: usize) -> bool {
        let mut depth = 0usize;
        let mut idx = open;
        while let Some(token) = self.tokens.get(idx) {
            match token.kind {
                TokenKind::LBracket | TokenKind::LParen | TokenKind::LBrace => depth += 1,
                TokenKind::RBracket | TokenKind::RParen | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self
                            .tokens
                            .get(idx + 1)
                            .is_some_and(|next| starts_type(&next.kind));
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            idx += 1;
        }
        false
    }

    fn expect_semi(&mut self, context: &str) -> Result<(), SyntaxError> {
        match self.peek_kind() {
            TokenKind::Semi => {
                self.advance();
                Ok(())
            }
            TokenKind::RParen | TokenKind::RBrace | TokenKind::Eof => Ok(()),
            other => {
                let found = other.describe();
                Err(self.error_here(&format!(
                    "Expected newline or `;` after {context}, found {found}"
                )))
            }
        }
    }

    fn expect_group_separator(&mut self) -> Result<(), SyntaxError> {
        if self.matches(TokenKind::Semi) || self.check(TokenKind::RParen) {
            Ok(())
        } else {
            let found = self.peek_kind().describe();
            Err(self.error_here(&format!("Expected `;` or `)`, found {found}")))
        }
    }

    fn expect_identifier(&mut self, msg: &str) -> Result<Ident, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok(Ident { name, span })
            }
            _ => Err(self.error_here(msg)),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, SyntaxError> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            let found = self.peek_kind().describe();
            Err(self.error_here(&format!("Expected {}, found {found}", kind.describe())))
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        *self.peek_kind() == kind
    }

    fn peek_kind(&self) -> &TokenKind {
        self.peek_kind_n(0)
    }

    fn peek_kind_n(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        self.pos = (self.pos + 1).min(self.tokens.len());
        &self.tokens[idx]
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn current_span_start(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.span.end).unwrap_or(0))
    }

    fn last_span_end(&self, fallback: usize) -> usize {
        self.previous_span()
            .map(|span| span.end)
            .unwrap_or(fallback)
            .max(fallback)
    }

    fn previous_span(&self) -> Option<Span> {
        if self.pos == 0 {
            None
        } else {
            self.tokens.get(self.pos - 1).map(|t| t.span)
        }
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        let span = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default();
        SyntaxError::new(message.to_string(), span)
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    /// Skips to the next top-level declaration keyword at the start of a line.
    fn synchronize_decl(&mut self) {
        let mut depth = 0usize;
        while !self.is_eof() {
            let at_line_start = self.pos == 0
                || matches!(
                    self.tokens.get(self.pos - 1).map(|t| &t.kind),
                    Some(TokenKind::Semi)
                );
            match self.peek_kind() {
                TokenKind::Type
                | TokenKind::Func
                | TokenKind::Var
                | TokenKind::Const
                | TokenKind::Import
                    if depth == 0 && at_line_start =>
                {
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
    }
}

fn starts_type(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier(_)
            | TokenKind::Star
            | TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Func
            | TokenKind::Struct
            | TokenKind::Interface
            | TokenKind::Arrow
            | TokenKind::LParen
    )
}
